//! End-to-end compositor scenarios: placeholder-then-blit, sticky failure,
//! bounded concurrency, cancellation on dispose, and repaint fan-out.

use async_trait::async_trait;
use fieldmap::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::new_rgb8(8, 8);
    let mut buf = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Transport double serving the same PNG payload for every tile
struct PayloadFetch {
    payload: Vec<u8>,
    /// Delay per chunk, so tests can keep downloads in flight
    chunk_delay: Duration,
    chunk_count: usize,
}

impl PayloadFetch {
    fn instant() -> Self {
        Self {
            payload: png_bytes(),
            chunk_delay: Duration::ZERO,
            chunk_count: 4,
        }
    }

    fn slow() -> Self {
        Self {
            payload: png_bytes(),
            chunk_delay: Duration::from_millis(25),
            chunk_count: 64,
        }
    }

    fn brisk() -> Self {
        Self {
            payload: png_bytes(),
            chunk_delay: Duration::from_millis(2),
            chunk_count: 8,
        }
    }
}

struct PayloadStream {
    chunks: std::vec::IntoIter<Vec<u8>>,
    total: u64,
    chunk_delay: Duration,
}

#[async_trait]
impl TileFetch for PayloadFetch {
    async fn open(&self, _url: &reqwest::Url) -> Result<Box<dyn TileStream>> {
        let size = (self.payload.len() / self.chunk_count).max(1);
        let chunks: Vec<Vec<u8>> = self.payload.chunks(size).map(|c| c.to_vec()).collect();
        Ok(Box::new(PayloadStream {
            chunks: chunks.into_iter(),
            total: self.payload.len() as u64,
            chunk_delay: self.chunk_delay,
        }))
    }
}

#[async_trait]
impl TileStream for PayloadStream {
    fn content_length(&self) -> Option<u64> {
        Some(self.total)
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.chunk_delay.is_zero() {
            tokio::time::sleep(self.chunk_delay).await;
        }
        Ok(self.chunks.next())
    }
}

/// Transport double that refuses every download
struct NeverFetch;

#[async_trait]
impl TileFetch for NeverFetch {
    async fn open(&self, _url: &reqwest::Url) -> Result<Box<dyn TileStream>> {
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "offline").into())
    }
}

/// Subscriber double counting repaint requests
struct CountingClient {
    repaints: AtomicUsize,
}

impl CountingClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            repaints: AtomicUsize::new(0),
        })
    }

    fn repaints(&self) -> usize {
        self.repaints.load(Ordering::SeqCst)
    }
}

impl RenderClient for CountingClient {
    fn request_repaint(&self) {
        self.repaints.fetch_add(1, Ordering::SeqCst);
    }
}

/// Surface double recording every draw call
#[derive(Debug, PartialEq)]
enum Op {
    FillRect(Rect, Color),
    StrokeRect(Rect, Color),
    Ellipse(Rect),
    Line(Point, Point),
    Label(String),
    Blit { dest: Rect, src: Rect },
    Marker(MarkerKind, Point),
}

struct RecordingSurface {
    width: f64,
    height: f64,
    ops: Vec<Op>,
}

impl RecordingSurface {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    fn blits(&self) -> Vec<(&Rect, &Rect)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Blit { dest, src } => Some((dest, src)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }
}

impl RenderSurface for RecordingSurface {
    fn dimensions(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(Op::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, _stroke_width: f32) {
        self.ops.push(Op::StrokeRect(rect, color));
    }

    fn fill_ellipse(&mut self, rect: Rect, _color: Color) {
        self.ops.push(Op::Ellipse(rect));
    }

    fn draw_line(&mut self, from: Point, to: Point, _color: Color, _stroke_width: f32) {
        self.ops.push(Op::Line(from, to));
    }

    fn draw_label(&mut self, text: &str, _center: Point, _color: Color) {
        self.ops.push(Op::Label(text.to_string()));
    }

    fn blit(&mut self, _image: &TileImage, dest: Rect, src: Rect) {
        self.ops.push(Op::Blit { dest, src });
    }

    fn draw_marker(&mut self, kind: MarkerKind, at: Point) {
        self.ops.push(Op::Marker(kind, at));
    }
}

struct Harness {
    renderer: MapRenderer,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(fetcher: Arc<dyn TileFetch>, mutate: impl FnOnce(&mut RendererConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RendererConfig {
            cache_dir: dir.path().join("maps"),
            api_key: "test-key".into(),
            endpoint: Some("https://maps.example.com/staticmap?".into()),
            ..RendererConfig::default()
        };
        mutate(&mut config);
        let renderer = MapRenderer::new(config).unwrap().with_fetcher(fetcher);
        Self {
            renderer,
            _dir: dir,
        }
    }

    fn first_tile(&self) -> TileId {
        let grid = self.renderer.grid();
        grid.tile_id(&grid.slots()[0], self.renderer.config().style)
    }

    /// Pumps loader events until `cond` holds
    async fn wait_until(&self, cond: impl Fn(&MapRenderer) -> bool) {
        for _ in 0..200 {
            self.renderer.pump_events();
            if cond(&self.renderer) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }
}

#[tokio::test]
async fn subscribing_repaints_immediately() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |_| {});
    let client = CountingClient::new();

    harness.renderer.subscribe(client.clone());
    assert_eq!(client.repaints(), 1);
}

#[tokio::test]
async fn painting_unknown_client_is_an_error() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |_| {});
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);
    harness.renderer.unsubscribe(id);

    let mut surface = RecordingSurface::new(800.0, 600.0);
    assert!(matches!(
        harness.renderer.paint(id, &mut surface),
        Err(MapError::Render(_))
    ));
}

#[tokio::test]
async fn placeholder_first_then_blit_after_completion() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |_| {});
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client.clone());
    let tile = harness.first_tile();

    // First paint: nothing resident yet, so the single visible tile draws a
    // placeholder and a loader is admitted
    let mut surface = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id, &mut surface).unwrap();
    assert_eq!(surface.count(|op| matches!(op, Op::StrokeRect(..))), 1);
    assert!(surface.blits().is_empty());
    assert!(harness.renderer.store().state(&tile).is_loading());
    assert_eq!(harness.renderer.scheduler().running(), 1);

    let repaints_before = client.repaints();
    harness
        .wait_until(|r| r.store().state(&tile).is_loaded())
        .await;
    // Completion released the slot and fanned out a repaint
    assert_eq!(harness.renderer.scheduler().running(), 0);
    assert!(client.repaints() > repaints_before);

    // Second paint blits exactly one tile: the viewport sits fully inside
    // the single tile of the default area
    let mut surface = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id, &mut surface).unwrap();
    let blits = surface.blits();
    assert_eq!(blits.len(), 1);

    // Map area is 1280x1280 centered on the 800x600 surface; the drawn part
    // is the whole surface, and the source sub-rectangle is proportional
    let (dest, src) = blits[0];
    assert_eq!(*dest, Rect::new(0.0, 0.0, 800.0, 600.0));
    assert!((src.x - 240.0 / 1280.0 * 8.0).abs() < 1e-9);
    assert!((src.y - 340.0 / 1280.0 * 8.0).abs() < 1e-9);
    assert!((src.w - 800.0 / 1280.0 * 8.0).abs() < 1e-9);
    assert!((src.h - 600.0 / 1280.0 * 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn second_renderer_loads_from_disk_cache() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let make_config = |config: &mut RendererConfig| {
        config.cache_dir = dir.path().join("maps");
    };

    let first = Harness::new(Arc::new(PayloadFetch::instant()), make_config);
    let client = CountingClient::new();
    let id = first.renderer.subscribe(client);
    let tile = first.first_tile();
    first
        .renderer
        .paint(id, &mut RecordingSurface::new(800.0, 600.0))
        .unwrap();
    first
        .wait_until(|r| r.store().state(&tile).is_loaded())
        .await;

    // A fresh renderer over the same cache directory, with a transport that
    // cannot serve anything, still loads the tile from disk
    let second = Harness::new(Arc::new(NeverFetch), make_config);
    let client = CountingClient::new();
    let id = second.renderer.subscribe(client);
    second
        .renderer
        .paint(id, &mut RecordingSurface::new(800.0, 600.0))
        .unwrap();
    second
        .wait_until(|r| r.store().state(&tile).is_loaded())
        .await;
}

#[tokio::test]
async fn failed_tile_is_sticky_and_never_retried() {
    init_logging();
    // No endpoint configured: a cache miss goes straight to Failed
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |config| {
        config.endpoint = None;
    });
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);
    let tile = harness.first_tile();

    harness
        .renderer
        .paint(id, &mut RecordingSurface::new(800.0, 600.0))
        .unwrap();
    harness
        .wait_until(|r| r.store().state(&tile).is_failed())
        .await;
    assert_eq!(harness.renderer.scheduler().running(), 0);

    // Repeated paints with the tile visible never re-enter Loading
    for _ in 0..3 {
        let mut surface = RecordingSurface::new(800.0, 600.0);
        harness.renderer.paint(id, &mut surface).unwrap();
        assert!(harness.renderer.store().state(&tile).is_failed());
        assert_eq!(harness.renderer.scheduler().running(), 0);
        // The placeholder stays; no progress fill is drawn for a failed tile
        assert_eq!(surface.count(|op| matches!(op, Op::StrokeRect(..))), 1);
    }
}

#[tokio::test]
async fn fetch_limit_bounds_simultaneous_loaders() {
    init_logging();
    let area = GeoRect::new(-34.87, 138.52, -34.93, 138.68).unwrap();
    let harness = Harness::new(Arc::new(PayloadFetch::brisk()), move |config| {
        config.area = Some(area);
    });
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);

    // Zoom out so the whole multi-tile map is on screen
    harness.renderer.set_zoom(id, 0.2, false);
    let mut surface = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id, &mut surface).unwrap();

    let visible = harness.renderer.grid().slots().len();
    assert!(visible > 3);
    // Only three loaders were admitted; the other tiles stay absent and are
    // retried on a later paint
    assert_eq!(harness.renderer.scheduler().running(), 3);
    let store = harness.renderer.store();
    let loading = harness
        .renderer
        .grid()
        .slots()
        .iter()
        .filter(|slot| {
            store
                .state(&harness.renderer.grid().tile_id(slot, ImageryStyle::Roadmap))
                .is_loading()
        })
        .count();
    assert_eq!(loading, 3);

    // As slots free up, later paints pick up the remaining tiles
    harness
        .wait_until(|r| {
            let grid = r.grid();
            let store = r.store();
            let mut surface = RecordingSurface::new(800.0, 600.0);
            r.paint(id, &mut surface).unwrap();
            grid.slots()
                .iter()
                .all(|slot| store.state(&grid.tile_id(slot, ImageryStyle::Roadmap)).is_loaded())
        })
        .await;
    assert_eq!(harness.renderer.scheduler().running(), 0);
}

#[tokio::test]
async fn dispose_cancels_in_flight_downloads() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::slow()), |_| {});
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);
    let tile = harness.first_tile();

    harness
        .renderer
        .paint(id, &mut RecordingSurface::new(800.0, 600.0))
        .unwrap();
    assert!(harness.renderer.store().state(&tile).is_loading());

    harness.renderer.dispose();
    assert!(harness.renderer.clients().is_empty());

    // The loader reaches a terminal state at its next chunk boundary and the
    // tile is left absent, not failed
    harness
        .wait_until(|r| r.scheduler().running() == 0)
        .await;
    assert!(harness.renderer.store().state(&tile).is_absent());
}

#[tokio::test]
async fn loading_tile_draws_progress_fill() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::slow()), |_| {});
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);
    let tile = harness.first_tile();

    harness
        .renderer
        .paint(id, &mut RecordingSurface::new(800.0, 600.0))
        .unwrap();

    // Wait for at least one progress event to land in the store
    harness
        .wait_until(|r| {
            matches!(
                r.store().state(&tile),
                TileState::Loading {
                    progress: Some(_)
                }
            )
        })
        .await;

    let mut surface = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id, &mut surface).unwrap();
    // Placeholder fill plus the progress bar fill
    assert!(surface.count(|op| matches!(op, Op::FillRect(..))) >= 2);
}

#[tokio::test]
async fn display_flags_gate_layers_per_client() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |_| {});
    let with_markers = CountingClient::new();
    let without_markers = CountingClient::new();
    let id_a = harness.renderer.subscribe(with_markers);
    let id_b = harness.renderer.subscribe(without_markers);

    let center = harness.renderer.config().center;
    harness
        .renderer
        .set_markers(MarkerKind::Node, vec![center]);
    harness
        .renderer
        .set_display_flag(id_b, OverlayLayer::Nodes, false);
    harness
        .renderer
        .set_display_flag(id_b, OverlayLayer::Grid, false);

    let mut surface_a = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id_a, &mut surface_a).unwrap();
    assert_eq!(
        surface_a.count(|op| matches!(op, Op::Marker(MarkerKind::Node, _))),
        1
    );
    assert!(surface_a.count(|op| matches!(op, Op::Label(_))) > 0);

    let mut surface_b = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id_b, &mut surface_b).unwrap();
    assert_eq!(surface_b.count(|op| matches!(op, Op::Marker(..))), 0);
    assert_eq!(surface_b.count(|op| matches!(op, Op::Label(_))), 0);
}

#[tokio::test]
async fn grid_overlay_labels_rows_and_columns() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |_| {});
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);
    // Keep imagery out of the way; the grid is independent of tile state
    harness
        .renderer
        .set_display_flag(id, OverlayLayer::Imagery, false);

    let mut surface = RecordingSurface::new(2000.0, 2000.0);
    harness.renderer.paint(id, &mut surface).unwrap();

    let labels: Vec<&String> = surface
        .ops
        .iter()
        .filter_map(|op| match op {
            Op::Label(text) => Some(text),
            _ => None,
        })
        .collect();
    // Whole map visible: ten lettered rows and ten numbered columns
    assert_eq!(labels.len(), 20);
    assert!(labels.contains(&&"A".to_string()));
    assert!(labels.contains(&&"J".to_string()));
    assert!(labels.contains(&&"1".to_string()));
    assert!(labels.contains(&&"10".to_string()));
    // Interior separators only: nine lines each way
    assert_eq!(surface.count(|op| matches!(op, Op::Line(..))), 18);
}

#[tokio::test]
async fn markers_outside_the_area_are_skipped() {
    init_logging();
    let harness = Harness::new(Arc::new(PayloadFetch::instant()), |_| {});
    let client = CountingClient::new();
    let id = harness.renderer.subscribe(client);

    harness.renderer.set_markers(
        MarkerKind::Incident,
        vec![LatLng::new(48.85, 2.35), harness.renderer.config().center],
    );

    let mut surface = RecordingSurface::new(800.0, 600.0);
    harness.renderer.paint(id, &mut surface).unwrap();
    assert_eq!(surface.count(|op| matches!(op, Op::Marker(..))), 1);
}
