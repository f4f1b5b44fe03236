use crate::core::bounds::Rect;
use crate::core::math;
use crate::render::surface::Color;
use crate::tiles::identity::ImageryStyle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Interpolation speed of animated pan/zoom, in interpolation fraction per
/// second
pub(crate) const PAN_ZOOM_SPEED: f64 = 2.0;

/// A UI surface subscribed to a renderer.
///
/// The only obligation is scheduling a repaint; the renderer calls this from
/// the thread that drains loader events (and from whichever thread mutates
/// pan/zoom), so implementations should do no more than set a dirty flag or
/// post to their event loop.
pub trait RenderClient: Send + Sync {
    fn request_repaint(&self);
}

/// Handle identifying one subscribed client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

/// Independently toggleable display layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayLayer {
    Imagery,
    Grid,
    Nodes,
    Incidents,
    AssignedDevices,
    UnassignedDevices,
}

/// Kinds of domain markers a collaborator can push onto the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Node,
    Incident,
    AssignedDevice,
    UnassignedDevice,
}

impl MarkerKind {
    /// The display layer whose flag governs this marker kind
    pub fn layer(&self) -> OverlayLayer {
        match self {
            MarkerKind::Node => OverlayLayer::Nodes,
            MarkerKind::Incident => OverlayLayer::Incidents,
            MarkerKind::AssignedDevice => OverlayLayer::AssignedDevices,
            MarkerKind::UnassignedDevice => OverlayLayer::UnassignedDevices,
        }
    }
}

/// Per-client view state: pan/zoom (with interpolation targets), selected
/// style, layer flags, cosmetics and the geometry derived from them.
pub(crate) struct ClientSettings {
    pub handle: Arc<dyn RenderClient>,
    pub style: ImageryStyle,

    // Pan position normalized to 0..1 in each axis, 0.5 = centered
    pub x_pos: f64,
    pub x_start: f64,
    pub x_target: f64,
    pub y_pos: f64,
    pub y_start: f64,
    pub y_target: f64,
    pub pos_interp: f64,

    // Display zoom factor over the base map pixel size
    pub zoom: f64,
    pub zoom_start: f64,
    pub zoom_target: f64,
    pub zoom_interp: f64,

    // Derived geometry, regenerated on resize/pan/zoom
    pub map_size: f64,
    pub client_area: Rect,
    pub map_area: Rect,
    pub shown_area: Rect,
    pub grid_step_x: f64,
    pub grid_step_y: f64,

    pub draw_imagery: bool,
    pub draw_grid: bool,
    pub draw_nodes: bool,
    pub draw_incidents: bool,
    pub draw_assigned_devices: bool,
    pub draw_unassigned_devices: bool,

    pub grid_line_color: Color,
    pub grid_text_color: Color,
    pub grid_shading_color: Color,
    pub placeholder_border_color: Color,
    pub placeholder_fill_color: Color,
    pub progress_fill_color: Color,
}

impl ClientSettings {
    pub fn new(handle: Arc<dyn RenderClient>, style: ImageryStyle) -> Self {
        Self {
            handle,
            style,
            x_pos: 0.5,
            x_start: 0.5,
            x_target: 0.5,
            y_pos: 0.5,
            y_start: 0.5,
            y_target: 0.5,
            pos_interp: 1.0,
            zoom: 1.0,
            zoom_start: 1.0,
            zoom_target: 1.0,
            zoom_interp: 1.0,
            map_size: 0.0,
            client_area: Rect::default(),
            map_area: Rect::default(),
            shown_area: Rect::default(),
            grid_step_x: 0.0,
            grid_step_y: 0.0,
            draw_imagery: true,
            draw_grid: true,
            draw_nodes: true,
            draw_incidents: true,
            draw_assigned_devices: true,
            draw_unassigned_devices: true,
            grid_line_color: Color::rgba(0, 0, 0, 70),
            grid_text_color: Color::rgba(255, 255, 255, 200),
            grid_shading_color: Color::rgba(0, 0, 0, 150),
            placeholder_border_color: Color::rgba(255, 102, 0, 155),
            placeholder_fill_color: Color::rgba(0, 0, 0, 15),
            progress_fill_color: Color::rgba(255, 255, 255, 50),
        }
    }

    pub fn flag(&self, layer: OverlayLayer) -> bool {
        match layer {
            OverlayLayer::Imagery => self.draw_imagery,
            OverlayLayer::Grid => self.draw_grid,
            OverlayLayer::Nodes => self.draw_nodes,
            OverlayLayer::Incidents => self.draw_incidents,
            OverlayLayer::AssignedDevices => self.draw_assigned_devices,
            OverlayLayer::UnassignedDevices => self.draw_unassigned_devices,
        }
    }

    pub fn set_flag(&mut self, layer: OverlayLayer, value: bool) {
        match layer {
            OverlayLayer::Imagery => self.draw_imagery = value,
            OverlayLayer::Grid => self.draw_grid = value,
            OverlayLayer::Nodes => self.draw_nodes = value,
            OverlayLayer::Incidents => self.draw_incidents = value,
            OverlayLayer::AssignedDevices => self.draw_assigned_devices = value,
            OverlayLayer::UnassignedDevices => self.draw_unassigned_devices = value,
        }
    }

    /// Sets the pan position (clamped to 0..1). Returns true when the change
    /// is immediate and the caller should regenerate geometry and repaint;
    /// interpolated changes are applied by `advance_animation`.
    pub fn set_pan(&mut self, x: f64, y: f64, interpolated: bool) -> bool {
        let x = x.clamp(0.0, 1.0);
        let y = y.clamp(0.0, 1.0);
        if math::approx_eq(self.x_pos, x) && math::approx_eq(self.y_pos, y) {
            return false;
        }

        if interpolated {
            self.x_start = self.x_pos;
            self.x_target = x;
            self.y_start = self.y_pos;
            self.y_target = y;
            self.pos_interp = 0.0;
            false
        } else {
            self.x_pos = x;
            self.x_start = x;
            self.x_target = x;
            self.y_pos = y;
            self.y_start = y;
            self.y_target = y;
            self.pos_interp = 1.0;
            true
        }
    }

    /// Sets the zoom factor, clamped to the configured display range. Same
    /// return convention as `set_pan`.
    pub fn set_zoom(&mut self, target: f64, interpolated: bool, min: f64, max: f64) -> bool {
        let target = target.clamp(min, max);
        if math::approx_eq(self.zoom, target) {
            return false;
        }

        if interpolated {
            self.zoom_start = self.zoom;
            self.zoom_target = target;
            self.zoom_interp = 0.0;
            false
        } else {
            self.zoom = target;
            self.zoom_start = target;
            self.zoom_target = target;
            self.zoom_interp = 1.0;
            true
        }
    }

    /// Advances pan/zoom interpolation. Returns true when anything moved.
    pub fn advance_animation(&mut self, dt: f64) -> bool {
        let mut moved = false;

        if !math::approx_eq(self.zoom_interp, 1.0) {
            self.zoom_interp = (self.zoom_interp + dt * PAN_ZOOM_SPEED).min(1.0);
            self.zoom = math::coserp(self.zoom_start, self.zoom_target, self.zoom_interp);
            moved = true;
        }

        if !math::approx_eq(self.pos_interp, 1.0) {
            self.pos_interp = (self.pos_interp + dt * PAN_ZOOM_SPEED).min(1.0);
            self.x_pos = math::coserp(self.x_start, self.x_target, self.pos_interp);
            self.y_pos = math::coserp(self.y_start, self.y_target, self.pos_interp);
            moved = true;
        }

        moved
    }

    /// Recomputes the pixel geometry: the square map area positioned so the
    /// pan point sits at the center of the client area, and the part of it
    /// actually on screen.
    pub fn regenerate_geometry(&mut self, map_pixel_size: u32, grid_rows: u32, grid_cols: u32) {
        self.map_size = map_pixel_size as f64 * self.zoom;
        self.map_area = Rect::new(
            self.client_area.w / 2.0 - self.map_size * self.x_pos,
            self.client_area.h / 2.0 - self.map_size * self.y_pos,
            self.map_size,
            self.map_size,
        );
        self.shown_area = self
            .client_area
            .intersection(&self.map_area)
            .unwrap_or_default();
        self.grid_step_x = self.map_size / grid_cols.max(1) as f64;
        self.grid_step_y = self.map_size / grid_rows.max(1) as f64;
    }

    /// Immutable copy of everything `paint` needs, so painting runs without
    /// the registry lock held.
    pub fn view(&self) -> ClientView {
        ClientView {
            style: self.style,
            map_area: self.map_area,
            shown_area: self.shown_area,
            grid_step_x: self.grid_step_x,
            grid_step_y: self.grid_step_y,
            draw_imagery: self.draw_imagery,
            draw_grid: self.draw_grid,
            draw_nodes: self.draw_nodes,
            draw_incidents: self.draw_incidents,
            draw_assigned_devices: self.draw_assigned_devices,
            draw_unassigned_devices: self.draw_unassigned_devices,
            grid_line_color: self.grid_line_color,
            grid_text_color: self.grid_text_color,
            grid_shading_color: self.grid_shading_color,
            placeholder_border_color: self.placeholder_border_color,
            placeholder_fill_color: self.placeholder_fill_color,
            progress_fill_color: self.progress_fill_color,
        }
    }
}

/// Snapshot of one client's paint inputs
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClientView {
    pub style: ImageryStyle,
    pub map_area: Rect,
    pub shown_area: Rect,
    pub grid_step_x: f64,
    pub grid_step_y: f64,
    pub draw_imagery: bool,
    pub draw_grid: bool,
    pub draw_nodes: bool,
    pub draw_incidents: bool,
    pub draw_assigned_devices: bool,
    pub draw_unassigned_devices: bool,
    pub grid_line_color: Color,
    pub grid_text_color: Color,
    pub grid_shading_color: Color,
    pub placeholder_border_color: Color,
    pub placeholder_fill_color: Color,
    pub progress_fill_color: Color,
}

impl ClientView {
    pub fn flag(&self, layer: OverlayLayer) -> bool {
        match layer {
            OverlayLayer::Imagery => self.draw_imagery,
            OverlayLayer::Grid => self.draw_grid,
            OverlayLayer::Nodes => self.draw_nodes,
            OverlayLayer::Incidents => self.draw_incidents,
            OverlayLayer::AssignedDevices => self.draw_assigned_devices,
            OverlayLayer::UnassignedDevices => self.draw_unassigned_devices,
        }
    }
}

/// Tracks which UI surfaces are subscribed and their per-surface settings.
///
/// A client absent from the registry receives no callbacks. Subscribing
/// triggers one immediate repaint so the first frame is not blank.
#[derive(Default)]
pub struct RenderClientRegistry {
    clients: Mutex<HashMap<ClientId, ClientSettings>>,
    next_id: AtomicU64,
}

impl RenderClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&self, settings: ClientSettings) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = settings.handle.clone();
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(id, settings);
        }
        handle.request_repaint();
        id
    }

    pub fn unsubscribe(&self, id: ClientId) -> bool {
        self.clients
            .lock()
            .map(|mut clients| clients.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// Drops every subscriber
    pub fn clear(&self) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Asks every subscribed client to repaint. Handles are collected first
    /// so the callbacks run without the registry lock held.
    pub fn broadcast_repaint(&self) {
        let handles: Vec<_> = match self.clients.lock() {
            Ok(clients) => clients.values().map(|s| s.handle.clone()).collect(),
            Err(_) => return,
        };
        for handle in handles {
            handle.request_repaint();
        }
    }

    /// Runs `f` against one client's settings under the registry lock
    pub(crate) fn with<R>(
        &self,
        id: ClientId,
        f: impl FnOnce(&mut ClientSettings) -> R,
    ) -> Option<R> {
        let mut clients = self.clients.lock().ok()?;
        clients.get_mut(&id).map(f)
    }

    /// Runs `f` against every client's settings under the registry lock.
    /// `f` must not call back into the registry.
    pub(crate) fn for_each(&self, mut f: impl FnMut(ClientId, &mut ClientSettings)) {
        if let Ok(mut clients) = self.clients.lock() {
            for (id, settings) in clients.iter_mut() {
                f(*id, settings);
            }
        }
    }
}
