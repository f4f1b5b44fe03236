use crate::core::geo::{GeoRect, LatLng};
use crate::tiles::identity::{ImageryStyle, Resolution, TileId, LONG_SCALE};
use crate::Result;

/// One cell of the tile grid: a fixed center and geographic bounds. Style is
/// deliberately absent; the paint path combines a slot with the client's
/// selected style to form the cache key.
#[derive(Debug, Clone)]
pub struct TileSlot {
    pub center: LatLng,
    pub bounds: GeoRect,
    pub row: u32,
    pub col: u32,
}

/// Row-major grid of tiles covering the configured area at one zoom level.
#[derive(Debug, Clone)]
pub struct TileGrid {
    bounds: GeoRect,
    slots: Vec<TileSlot>,
    rows: u32,
    cols: u32,
    zoom: u8,
    resolution: Resolution,
}

impl TileGrid {
    /// Lays out the smallest grid of tiles whose union covers `area`,
    /// centered on the area's center. Tile edges touch without overlapping.
    pub fn cover(area: &GeoRect, zoom: u8, resolution: Resolution) -> Result<Self> {
        let (span_lat, span_lng) = TileId::span(zoom);
        // The epsilon stops a cover of exactly N tiles from rounding to N+1
        let rows = ((area.height() / span_lat - 1e-9).ceil().max(1.0)) as u32;
        let cols = ((area.width() / span_lng - 1e-9).ceil().max(1.0)) as u32;

        let center = area.center();
        let north = center.lat + rows as f64 * span_lat / 2.0;
        let west = center.lng - cols as f64 * span_lng / 2.0;
        let bounds = GeoRect::new(
            north,
            west,
            north - rows as f64 * span_lat,
            west + cols as f64 * span_lng,
        )?;

        let radius = TileId::scaled_radius(zoom);
        let mut slots = Vec::with_capacity((rows * cols) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let lat = north - (row as f64 + 0.5) * span_lat;
                let lng = west + (col as f64 + 0.5) * span_lng;
                slots.push(TileSlot {
                    center: LatLng::new(lat, lng),
                    bounds: GeoRect::new(
                        lat + radius,
                        lng - radius * LONG_SCALE,
                        lat - radius,
                        lng + radius * LONG_SCALE,
                    )?,
                    row,
                    col,
                });
            }
        }

        Ok(Self {
            bounds,
            slots,
            rows,
            cols,
            zoom,
            resolution,
        })
    }

    /// Union of all tile bounds; the map pixel area maps this rectangle
    pub fn bounds(&self) -> &GeoRect {
        &self.bounds
    }

    pub fn slots(&self) -> &[TileSlot] {
        &self.slots
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Cache key for a slot painted in the given style
    pub fn tile_id(&self, slot: &TileSlot, style: ImageryStyle) -> TileId {
        TileId::new(
            slot.center.lat,
            slot.center.lng,
            self.zoom,
            style,
            self.resolution,
        )
    }
}
