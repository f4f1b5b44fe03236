use crate::core::bounds::Rect;
use crate::core::geo::Point;
use crate::render::client::MarkerKind;
use crate::tiles::store::TileImage;

/// An RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// The drawing interface a display surface implements.
///
/// The compositor emits draw calls through this trait during
/// [`paint`](crate::MapRenderer::paint); what a call turns into (Swing-style
/// immediate drawing, a GPU command list, a test recording) is entirely the
/// surface's business. Implementations are only ever called on the thread
/// that invoked `paint`.
pub trait RenderSurface {
    /// Current drawable size in pixels as (width, height)
    fn dimensions(&self) -> (f64, f64);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, color: Color, stroke_width: f32);

    /// Filled ellipse inscribed in `rect`; used for grid label backings
    fn fill_ellipse(&mut self, rect: Rect, color: Color);

    fn draw_line(&mut self, from: Point, to: Point, color: Color, stroke_width: f32);

    /// Text centered on `center`
    fn draw_label(&mut self, text: &str, center: Point, color: Color);

    /// Copies the `src` sub-rectangle of a tile image (in image pixel
    /// coordinates) onto the `dest` rectangle of the surface, scaling as
    /// needed.
    fn blit(&mut self, image: &TileImage, dest: Rect, src: Rect);

    /// A domain marker at a pixel position; glyph choice is up to the surface
    fn draw_marker(&mut self, kind: MarkerKind, at: Point);
}
