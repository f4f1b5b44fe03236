//! Renderer configuration.
//!
//! The surrounding application owns configuration loading and hands the core
//! a read-only key/value view ([`ConfigSource`]); [`RendererConfig`] is the
//! typed snapshot the renderer actually consumes, with per-key fallback to
//! defaults so a sparse config file still produces a working map.

use crate::core::geo::{GeoRect, LatLng};
use crate::tiles::identity::{ImageryStyle, Resolution};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read-only key/value lookups. Keys are dotted paths (`map.zoom`).
pub trait ConfigSource {
    fn get_str(&self, key: &str) -> Option<String>;
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_i64(&self, key: &str) -> Option<i64>;
    fn get_bool(&self, key: &str) -> Option<bool>;
}

/// [`ConfigSource`] backed by a JSON document
#[derive(Debug, Clone)]
pub struct JsonConfig {
    root: serde_json::Value,
}

impl JsonConfig {
    pub fn new(root: serde_json::Value) -> Self {
        Self { root }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&text).map_err(|e| {
            crate::MapError::Config(format!("invalid config JSON: {e}"))
        })?))
    }

    fn lookup(&self, key: &str) -> Option<&serde_json::Value> {
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        Some(node)
    }
}

impl ConfigSource for JsonConfig {
    fn get_str(&self, key: &str) -> Option<String> {
        self.lookup(key)?.as_str().map(str::to_owned)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.lookup(key)?.as_f64()
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.lookup(key)?.as_i64()
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.lookup(key)?.as_bool()
    }
}

/// Typed configuration snapshot for one [`MapRenderer`](crate::MapRenderer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Center of the mapped area
    pub center: LatLng,
    /// Imagery zoom level requested from the endpoint
    pub zoom: u8,
    /// Imagery style painted for clients that have not selected their own
    pub style: ImageryStyle,
    /// Request double pixel density tiles
    pub high_res: bool,
    /// Imagery service API key
    pub api_key: String,
    /// Base URL of the imagery endpoint; `None` disables downloads so cache
    /// misses fail immediately
    pub endpoint: Option<String>,
    /// Root directory of the permanent tile cache
    pub cache_dir: PathBuf,
    /// Overlay grid rows (lettered)
    pub grid_rows: u32,
    /// Overlay grid columns (numbered)
    pub grid_columns: u32,
    /// Maximum simultaneous tile fetches
    pub fetch_limit: usize,
    /// Display zoom factor clamp range
    pub min_display_zoom: f64,
    pub max_display_zoom: f64,
    /// Explicit mapped area; when absent the area is one tile centered on
    /// `center`
    pub area: Option<GeoRect>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(-34.9, 138.6),
            zoom: 15,
            style: ImageryStyle::default(),
            high_res: true,
            api_key: String::new(),
            endpoint: Some("https://maps.googleapis.com/maps/api/staticmap?".into()),
            cache_dir: PathBuf::from("maps"),
            grid_rows: 10,
            grid_columns: 10,
            fetch_limit: 3,
            min_display_zoom: 0.2,
            max_display_zoom: 4.0,
            area: None,
        }
    }
}

impl RendererConfig {
    /// Builds a config from a key/value source, falling back to the defaults
    /// for each absent or unparsable key.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let defaults = Self::default();

        let style = source
            .get_str("map.type")
            .and_then(|s| ImageryStyle::parse(&s).ok())
            .unwrap_or(defaults.style);

        let area = match (
            source.get_f64("map.area_north"),
            source.get_f64("map.area_west"),
            source.get_f64("map.area_south"),
            source.get_f64("map.area_east"),
        ) {
            (Some(n), Some(w), Some(s), Some(e)) => GeoRect::new(n, w, s, e)
                .map_err(|err| log::warn!("ignoring invalid map.area_* bounds: {err}"))
                .ok(),
            _ => None,
        };

        Self {
            center: LatLng::new(
                source
                    .get_f64("map.center_latitude")
                    .unwrap_or(defaults.center.lat),
                source
                    .get_f64("map.center_longitude")
                    .unwrap_or(defaults.center.lng),
            ),
            zoom: source
                .get_i64("map.zoom")
                .and_then(|z| u8::try_from(z).ok())
                .unwrap_or(defaults.zoom),
            style,
            high_res: source
                .get_bool("map.high_res")
                .unwrap_or(defaults.high_res),
            api_key: source
                .get_str("map.api_key")
                .unwrap_or(defaults.api_key),
            endpoint: match source.get_str("map.endpoint") {
                Some(url) if url.is_empty() => None,
                Some(url) => Some(url),
                None => defaults.endpoint,
            },
            cache_dir: source
                .get_str("map.cache_dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            grid_rows: source
                .get_i64("map.grid_rows")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.grid_rows),
            grid_columns: source
                .get_i64("map.grid_columns")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.grid_columns),
            fetch_limit: source
                .get_i64("map.fetch_limit")
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.fetch_limit),
            min_display_zoom: source
                .get_f64("map.min_display_zoom")
                .unwrap_or(defaults.min_display_zoom),
            max_display_zoom: source
                .get_f64("map.max_display_zoom")
                .unwrap_or(defaults.max_display_zoom),
            area,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::from_high_res(self.high_res)
    }
}
