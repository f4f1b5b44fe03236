//! # fieldmap
//!
//! Map-imagery core for field-operations consoles: a disk-backed geographic
//! tile cache with an asynchronous, bounded-concurrency fetch pipeline and a
//! compositor that paints the visible portion of each tile onto any number of
//! subscribed display surfaces.
//!
//! The crate deliberately stops at two narrow seams: a [`RenderSurface`] that
//! receives draw calls, and a [`RenderClient`] that receives repaint
//! requests. Everything UI-toolkit-specific lives on the other side of those
//! traits.

pub mod core;
pub mod prelude;
pub mod render;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    bounds::Rect,
    config::{ConfigSource, JsonConfig, RendererConfig},
    geo::{GeoRect, LatLng, Point},
};

pub use crate::render::{
    client::{ClientId, OverlayLayer, RenderClient},
    renderer::{MapRenderer, MarkerKind},
    surface::{Color, RenderSurface},
};

pub use crate::tiles::{
    identity::{ImageryStyle, Resolution, TileId},
    store::{TileImage, TileState, TileStore},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid imagery endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid coordinates: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Error type alias for convenience
pub type Error = MapError;
