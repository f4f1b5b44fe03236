//! Prelude module for common fieldmap types and traits
//!
//! Re-exports the most commonly used types for easy importing with
//! `use fieldmap::prelude::*;`

pub use crate::core::{
    bounds::Rect,
    config::{ConfigSource, JsonConfig, RendererConfig},
    geo::{GeoRect, LatLng, Point},
};

pub use crate::render::{
    client::{ClientId, MarkerKind, OverlayLayer, RenderClient, RenderClientRegistry},
    grid::{TileGrid, TileSlot},
    renderer::MapRenderer,
    surface::{Color, RenderSurface},
};

pub use crate::tiles::{
    endpoint::{DiskCache, ImageryEndpoint},
    fetch::{HttpFetch, TileFetch, TileStream},
    identity::{ImageryStyle, Resolution, TileId},
    loader::{TileEvent, TileLoader},
    scheduler::FetchScheduler,
    store::{TileImage, TileState, TileStore},
};

pub use crate::{MapError, Result};
