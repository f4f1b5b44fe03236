use crate::core::bounds::Rect;
use crate::core::config::RendererConfig;
use crate::core::geo::{GeoRect, LatLng, Point};
use crate::render::client::{
    ClientId, ClientSettings, ClientView, OverlayLayer, RenderClient, RenderClientRegistry,
};
use crate::render::grid::TileGrid;
use crate::render::surface::RenderSurface;
use crate::tiles::endpoint::{DiskCache, ImageryEndpoint};
use crate::tiles::fetch::{HttpFetch, TileFetch};
use crate::tiles::identity::{ImageryStyle, TileId, LONG_SCALE, MAP_PIXEL_SIZE};
use crate::tiles::loader::{TileEvent, TileLoader};
use crate::tiles::scheduler::FetchScheduler;
use crate::tiles::store::{TileState, TileStore};
use crate::{MapError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub use crate::render::client::MarkerKind;

/// Pixel diameter of grid label backings
const GRID_LABEL_SIZE: f64 = 18.0;

/// Composites the tile grid, overlay grid and domain markers for any number
/// of subscribed display surfaces.
///
/// One renderer owns its tile store, fetch scheduler and disk cache; nothing
/// is shared process-wide. Loader tasks run on the tokio runtime the renderer
/// was created under and report back over an event channel that
/// [`pump_events`](Self::pump_events) drains — call it from the UI thread,
/// which is the only place shared render state is mutated.
pub struct MapRenderer {
    config: RendererConfig,
    grid: TileGrid,
    store: TileStore,
    scheduler: FetchScheduler,
    cache: DiskCache,
    endpoint: Option<ImageryEndpoint>,
    fetcher: Arc<dyn TileFetch>,
    events_tx: Sender<TileEvent>,
    events_rx: Receiver<TileEvent>,
    abort: Arc<AtomicBool>,
    registry: RenderClientRegistry,
    markers: Mutex<HashMap<MarkerKind, Vec<LatLng>>>,
    runtime: tokio::runtime::Handle,
}

impl MapRenderer {
    /// Builds a renderer from a configuration snapshot. Must be called from
    /// within a tokio runtime; loader tasks are spawned onto it.
    pub fn new(config: RendererConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            MapError::Config("MapRenderer must be created inside a tokio runtime".into())
        })?;

        let area = match config.area {
            Some(area) => area,
            None => {
                let radius = TileId::scaled_radius(config.zoom);
                GeoRect::new(
                    config.center.lat + radius,
                    config.center.lng - radius * LONG_SCALE,
                    config.center.lat - radius,
                    config.center.lng + radius * LONG_SCALE,
                )?
            }
        };
        let grid = TileGrid::cover(&area, config.zoom, config.resolution())?;
        log::info!(
            "map renderer covers {}x{} tiles at zoom {}",
            grid.rows(),
            grid.cols(),
            config.zoom
        );

        let endpoint = config
            .endpoint
            .clone()
            .map(|base| ImageryEndpoint::new(base, config.api_key.clone()));
        let (events_tx, events_rx) = unbounded();

        Ok(Self {
            grid,
            store: TileStore::new(),
            scheduler: FetchScheduler::new(config.fetch_limit),
            cache: DiskCache::new(config.cache_dir.clone()),
            endpoint,
            fetcher: Arc::new(HttpFetch),
            events_tx,
            events_rx,
            abort: Arc::new(AtomicBool::new(false)),
            registry: RenderClientRegistry::new(),
            markers: Mutex::new(HashMap::new()),
            runtime,
            config,
        })
    }

    /// Swaps the transport the loaders download through
    pub fn with_fetcher(mut self, fetcher: Arc<dyn TileFetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Handle onto the shared tile state table
    pub fn store(&self) -> TileStore {
        self.store.clone()
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    pub fn clients(&self) -> &RenderClientRegistry {
        &self.registry
    }

    /// Subscribes a display surface; it immediately receives one repaint
    /// request so its first frame is not blank.
    pub fn subscribe(&self, client: Arc<dyn RenderClient>) -> ClientId {
        self.registry
            .subscribe(ClientSettings::new(client, self.config.style))
    }

    pub fn unsubscribe(&self, client: ClientId) {
        self.registry.unsubscribe(client);
    }

    /// Toggles one display layer for one client
    pub fn set_display_flag(&self, client: ClientId, layer: OverlayLayer, value: bool) {
        self.apply_and_repaint(client, |s| {
            s.set_flag(layer, value);
            true
        });
    }

    /// Switches the imagery style painted for one client
    pub fn set_style(&self, client: ClientId, style: ImageryStyle) {
        self.apply_and_repaint(client, |s| {
            if s.style == style {
                false
            } else {
                s.style = style;
                true
            }
        });
    }

    /// Sets the normalized pan position (0..1 per axis) for one client
    pub fn set_pan(&self, client: ClientId, x: f64, y: f64, interpolated: bool) {
        let (rows, cols) = (self.config.grid_rows, self.config.grid_columns);
        self.apply_and_repaint(client, |s| {
            if s.set_pan(x, y, interpolated) {
                s.regenerate_geometry(MAP_PIXEL_SIZE, rows, cols);
                true
            } else {
                false
            }
        });
    }

    /// Pans by a pixel delta, e.g. from a mouse drag
    pub fn drag_pan(&self, client: ClientId, dx: f64, dy: f64, interpolated: bool) {
        let (rows, cols) = (self.config.grid_rows, self.config.grid_columns);
        self.apply_and_repaint(client, |s| {
            if s.map_size <= 0.0 {
                return false;
            }
            let x = s.x_pos - dx / s.map_size;
            let y = s.y_pos - dy / s.map_size;
            if s.set_pan(x, y, interpolated) {
                s.regenerate_geometry(MAP_PIXEL_SIZE, rows, cols);
                true
            } else {
                false
            }
        });
    }

    /// Sets the display zoom factor for one client, clamped to the
    /// configured range
    pub fn set_zoom(&self, client: ClientId, zoom: f64, interpolated: bool) {
        let (rows, cols) = (self.config.grid_rows, self.config.grid_columns);
        let (min, max) = (self.config.min_display_zoom, self.config.max_display_zoom);
        self.apply_and_repaint(client, |s| {
            if s.set_zoom(zoom, interpolated, min, max) {
                s.regenerate_geometry(MAP_PIXEL_SIZE, rows, cols);
                true
            } else {
                false
            }
        });
    }

    /// Zooms by a delta relative to the current target
    pub fn drag_zoom(&self, client: ClientId, delta: f64, interpolated: bool) {
        let (rows, cols) = (self.config.grid_rows, self.config.grid_columns);
        let (min, max) = (self.config.min_display_zoom, self.config.max_display_zoom);
        self.apply_and_repaint(client, |s| {
            let target = s.zoom_target - delta;
            if s.set_zoom(target, interpolated, min, max) {
                s.regenerate_geometry(MAP_PIXEL_SIZE, rows, cols);
                true
            } else {
                false
            }
        });
    }

    /// Advances pan/zoom animations; call at the UI frame rate with the
    /// elapsed seconds since the previous call.
    pub fn tick(&self, dt: f64) {
        let (rows, cols) = (self.config.grid_rows, self.config.grid_columns);
        let mut moved = Vec::new();
        self.registry.for_each(|_, s| {
            if s.advance_animation(dt) {
                s.regenerate_geometry(MAP_PIXEL_SIZE, rows, cols);
                moved.push(s.handle.clone());
            }
        });
        for handle in moved {
            handle.request_repaint();
        }
    }

    /// Replaces the marker positions of one kind. The renderer never mutates
    /// the domain model; collaborators push plain coordinates in.
    pub fn set_markers(&self, kind: MarkerKind, points: Vec<LatLng>) {
        if let Ok(mut markers) = self.markers.lock() {
            markers.insert(kind, points);
        }
        self.registry.broadcast_repaint();
    }

    /// Applies loader events to the tile table and fans repaints out to
    /// subscribers. UI thread only: this is the single place loader results
    /// touch shared render state.
    pub fn pump_events(&self) {
        let mut repaint = false;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                TileEvent::Progress { id, fraction } => {
                    self.store.set_progress(&id, fraction);
                    repaint = true;
                }
                TileEvent::Completed { id, image } => {
                    log::debug!("tile {} loaded", id.cache_file_name());
                    self.store.complete(&id, image);
                    self.scheduler.release();
                    repaint = true;
                }
                TileEvent::Failed { id, error } => {
                    log::warn!("tile {} failed: {error}", id.cache_file_name());
                    self.store.fail(&id);
                    self.scheduler.release();
                    repaint = true;
                }
                TileEvent::Cancelled { id } => {
                    self.store.reset(&id);
                    self.scheduler.release();
                }
            }
        }
        if repaint {
            self.registry.broadcast_repaint();
        }
    }

    /// Paints one client's viewport onto its surface.
    ///
    /// Tiles resident for the client's style are blitted proportionally;
    /// absent tiles get a placeholder and (subject to the fetch limit) a
    /// loader; loading tiles get a progress fill; failed tiles stay a bare
    /// placeholder. The overlay grid and markers follow, gated by the
    /// client's layer flags.
    pub fn paint(&self, client: ClientId, surface: &mut dyn RenderSurface) -> Result<()> {
        let (width, height) = surface.dimensions();
        let (rows, cols) = (self.config.grid_rows, self.config.grid_columns);
        let view = self
            .registry
            .with(client, |s| {
                s.client_area = Rect::new(0.0, 0.0, width, height);
                s.regenerate_geometry(MAP_PIXEL_SIZE, rows, cols);
                s.view()
            })
            .ok_or_else(|| {
                MapError::Render("client is not subscribed to this renderer".into())
            })?;

        if view.shown_area.is_empty() {
            return Ok(());
        }

        if view.draw_imagery {
            self.paint_tiles(&view, surface);
        }
        if view.draw_grid {
            self.paint_grid(&view, surface);
        }
        self.paint_markers(&view, surface);
        Ok(())
    }

    /// Raises the abort flag and drops all subscribers. In-flight loaders
    /// observe the flag at their next chunk boundary and terminate without
    /// storing anything.
    pub fn dispose(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.registry.clear();
    }

    fn apply_and_repaint(&self, client: ClientId, f: impl FnOnce(&mut ClientSettings) -> bool) {
        let handle = self
            .registry
            .with(client, |s| if f(s) { Some(s.handle.clone()) } else { None })
            .flatten();
        if let Some(handle) = handle {
            handle.request_repaint();
        }
    }

    fn paint_tiles(&self, view: &ClientView, surface: &mut dyn RenderSurface) {
        let map_bounds = self.grid.bounds();
        for slot in self.grid.slots() {
            let nw = map_bounds.to_pixel(&view.map_area, slot.bounds.north(), slot.bounds.west());
            let se = map_bounds.to_pixel(&view.map_area, slot.bounds.south(), slot.bounds.east());
            let tile_area = Rect::new(nw.x, nw.y, se.x - nw.x, se.y - nw.y);
            if !tile_area.intersects(&view.shown_area) {
                continue;
            }

            let id = self.grid.tile_id(slot, view.style);
            match self.store.state(&id) {
                TileState::Loaded(image) => {
                    let drawn = match tile_area.intersection(&view.shown_area) {
                        Some(drawn) if !drawn.is_empty() => drawn,
                        _ => continue,
                    };
                    let src = Rect::new(
                        (drawn.x - tile_area.x) / tile_area.w * image.width() as f64,
                        (drawn.y - tile_area.y) / tile_area.h * image.height() as f64,
                        drawn.w / tile_area.w * image.width() as f64,
                        drawn.h / tile_area.h * image.height() as f64,
                    );
                    surface.blit(&image, drawn, src);
                }
                TileState::Loading { progress } => {
                    self.paint_placeholder(view, surface, tile_area);
                    if let Some(fraction) = progress {
                        surface.fill_rect(
                            Rect::new(
                                tile_area.x,
                                tile_area.y,
                                tile_area.w * fraction,
                                tile_area.h,
                            ),
                            view.progress_fill_color,
                        );
                    }
                }
                TileState::Failed => {
                    // Sticky: placeholder forever, no retry
                    self.paint_placeholder(view, surface, tile_area);
                }
                TileState::Absent => {
                    self.paint_placeholder(view, surface, tile_area);
                    self.request_tile(id);
                }
            }
        }
    }

    fn paint_placeholder(&self, view: &ClientView, surface: &mut dyn RenderSurface, area: Rect) {
        surface.stroke_rect(area, view.placeholder_border_color, 3.0);
        surface.fill_rect(area, view.placeholder_fill_color);
    }

    /// Starts a loader for a tile if it is absent and a fetch slot is free.
    /// Refusals are not remembered; the tile is asked for again on the next
    /// paint that needs it.
    fn request_tile(&self, id: TileId) {
        if !self.scheduler.try_admit() {
            return;
        }
        if !self.store.try_begin_load(&id) {
            self.scheduler.release();
            return;
        }

        let url = self.endpoint.as_ref().and_then(|ep| match ep.url(&id) {
            Ok(url) => Some(url),
            Err(e) => {
                log::error!("{e}");
                None
            }
        });
        let loader = TileLoader::new(
            id,
            url,
            self.cache.clone(),
            self.fetcher.clone(),
            self.events_tx.clone(),
            self.abort.clone(),
        );
        self.runtime.spawn(loader.run());
    }

    fn paint_grid(&self, view: &ClientView, surface: &mut dyn RenderSurface) {
        let rows = self.config.grid_rows;
        let cols = self.config.grid_columns;
        let map = view.map_area;
        let shown = view.shown_area;

        // Lettered rows
        for i in 0..rows {
            let line_y = map.y + view.grid_step_y * (i + 1) as f64;
            if line_y < shown.y {
                continue;
            }
            if line_y > shown.bottom() {
                break;
            }
            let label = char::from(b'A' + (i % 26) as u8).to_string();
            let label_x = if shown.x > GRID_LABEL_SIZE {
                shown.x - GRID_LABEL_SIZE
            } else {
                0.0
            };
            let label_y = line_y - view.grid_step_y / 2.0;

            surface.fill_ellipse(
                Rect::new(
                    label_x,
                    label_y - GRID_LABEL_SIZE / 2.0,
                    GRID_LABEL_SIZE,
                    GRID_LABEL_SIZE,
                ),
                view.grid_shading_color,
            );
            if i + 1 < rows {
                surface.draw_line(
                    Point::new(map.x, line_y),
                    Point::new(map.right(), line_y),
                    view.grid_line_color,
                    1.0,
                );
            }
            surface.draw_label(
                &label,
                Point::new(label_x + GRID_LABEL_SIZE / 2.0, label_y),
                view.grid_text_color,
            );
        }

        // Numbered columns
        for i in 0..cols {
            let line_x = map.x + view.grid_step_x * (i + 1) as f64;
            if line_x < shown.x {
                continue;
            }
            if line_x > shown.right() {
                break;
            }
            let label = (i + 1).to_string();
            let label_x = line_x - view.grid_step_x / 2.0;
            let label_y = if shown.y > GRID_LABEL_SIZE {
                shown.y - GRID_LABEL_SIZE
            } else {
                0.0
            };

            surface.fill_ellipse(
                Rect::new(
                    label_x - GRID_LABEL_SIZE / 2.0,
                    label_y,
                    GRID_LABEL_SIZE,
                    GRID_LABEL_SIZE,
                ),
                view.grid_shading_color,
            );
            if i + 1 < cols {
                surface.draw_line(
                    Point::new(line_x, map.y),
                    Point::new(line_x, map.bottom()),
                    view.grid_line_color,
                    1.0,
                );
            }
            surface.draw_label(
                &label,
                Point::new(label_x, label_y + GRID_LABEL_SIZE / 2.0),
                view.grid_text_color,
            );
        }
    }

    fn paint_markers(&self, view: &ClientView, surface: &mut dyn RenderSurface) {
        let markers = match self.markers.lock() {
            Ok(markers) => markers,
            Err(_) => return,
        };
        for (kind, points) in markers.iter() {
            if !view.flag(kind.layer()) {
                continue;
            }
            for point in points {
                if !self.grid.bounds().contains_point(point) {
                    continue;
                }
                let at = self
                    .grid
                    .bounds()
                    .to_pixel(&view.map_area, point.lat, point.lng);
                if view.shown_area.contains_point(&at) {
                    surface.draw_marker(*kind, at);
                }
            }
        }
    }
}

impl Drop for MapRenderer {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}
