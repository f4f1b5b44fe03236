use crate::core::geo::{GeoRect, LatLng};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Geographic half-height of a tile, in degrees, at the reference zoom.
pub const BASE_RADIUS: f64 = 0.01126;
/// Longitude radius multiplier compensating for east-west compression of
/// degrees at mid-latitudes.
pub const LONG_SCALE: f64 = 1.22;
/// Zoom level at which a tile spans exactly `BASE_RADIUS`; lower zooms are
/// treated as this level so tile sizes never run away.
pub const REFERENCE_ZOOM: u8 = 15;
/// Edge length of a tile image in pixels as served by the imagery endpoint.
pub const TILE_PIXEL_SIZE: u32 = 640;
/// Edge length of the whole map in pixels at display zoom factor 1.0.
pub const MAP_PIXEL_SIZE: u32 = TILE_PIXEL_SIZE * 2;

/// Visual theme of the imagery.
///
/// A closed enumeration rather than free-form strings so that a typo can
/// never silently key a separate cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageryStyle {
    Roadmap,
    Satellite,
    Terrain,
    Hybrid,
}

impl ImageryStyle {
    /// Name as used in endpoint URLs and cache filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageryStyle::Roadmap => "roadmap",
            ImageryStyle::Satellite => "satellite",
            ImageryStyle::Terrain => "terrain",
            ImageryStyle::Hybrid => "hybrid",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "roadmap" => Ok(ImageryStyle::Roadmap),
            "satellite" => Ok(ImageryStyle::Satellite),
            "terrain" => Ok(ImageryStyle::Terrain),
            "hybrid" => Ok(ImageryStyle::Hybrid),
            other => Err(MapError::Config(format!("unknown imagery style: {other}"))),
        }
    }
}

impl Default for ImageryStyle {
    fn default() -> Self {
        ImageryStyle::Roadmap
    }
}

impl std::fmt::Display for ImageryStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel-density multiplier requested from the imagery endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Standard,
    High,
}

impl Resolution {
    pub fn from_high_res(high_res: bool) -> Self {
        if high_res {
            Resolution::High
        } else {
            Resolution::Standard
        }
    }

    /// Scale factor sent to the endpoint
    pub fn scale(&self) -> u32 {
        match self {
            Resolution::Standard => 1,
            Resolution::High => 2,
        }
    }

    /// Suffix used in cache filenames
    pub fn suffix(&self) -> &'static str {
        match self {
            Resolution::Standard => "low",
            Resolution::High => "high",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Standard
    }
}

/// Value-type key identifying one tile: center coordinate, zoom, imagery
/// style and resolution.
///
/// The center is captured at six-decimal precision (micro-degrees), enough to
/// disambiguate adjacent tiles without exploding the key space, and is stored
/// as integers so the key is `Eq + Hash` and two identities built from equal
/// fields are always interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    lat_e6: i64,
    lng_e6: i64,
    zoom: u8,
    style: ImageryStyle,
    resolution: Resolution,
}

impl TileId {
    pub fn new(lat: f64, lng: f64, zoom: u8, style: ImageryStyle, resolution: Resolution) -> Self {
        Self {
            lat_e6: (lat * 1e6).round() as i64,
            lng_e6: (lng * 1e6).round() as i64,
            zoom,
            style,
            resolution,
        }
    }

    /// Center latitude
    pub fn lat(&self) -> f64 {
        self.lat_e6 as f64 / 1e6
    }

    /// Center longitude
    pub fn lng(&self) -> f64 {
        self.lng_e6 as f64 / 1e6
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(self.lat(), self.lng())
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn style(&self) -> ImageryStyle {
        self.style
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Same tile, different style. Imagery state is tracked per (tile, style)
    /// so this produces an independent cache key.
    pub fn with_style(&self, style: ImageryStyle) -> Self {
        Self { style, ..*self }
    }

    /// Geographic half-height in degrees of a tile at `zoom`. Zoom levels
    /// below [`REFERENCE_ZOOM`] are treated as the reference level.
    pub fn scaled_radius(zoom: u8) -> f64 {
        let effective = zoom.max(REFERENCE_ZOOM);
        BASE_RADIUS / 2_f64.powi((effective - REFERENCE_ZOOM) as i32)
    }

    /// Geographic span of a tile at `zoom` as (latitude degrees, longitude
    /// degrees).
    pub fn span(zoom: u8) -> (f64, f64) {
        let radius = Self::scaled_radius(zoom);
        (radius * 2.0, radius * LONG_SCALE * 2.0)
    }

    /// The geographic rectangle this tile's imagery covers
    pub fn bounds(&self) -> Result<GeoRect> {
        let radius = Self::scaled_radius(self.zoom);
        GeoRect::new(
            self.lat() + radius,
            self.lng() - radius * LONG_SCALE,
            self.lat() - radius,
            self.lng() + radius * LONG_SCALE,
        )
    }

    /// Deterministic disk-cache filename for this identity
    pub fn cache_file_name(&self) -> String {
        format!(
            "{:.6}_{:.6}_{}_{}_{}.png",
            self.lat(),
            self.lng(),
            self.zoom,
            self.style.as_str(),
            self.resolution.suffix()
        )
    }
}
