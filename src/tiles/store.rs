use crate::tiles::identity::TileId;
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Decoded tile imagery plus its pixel dimensions
pub struct TileImage {
    image: image::DynamicImage,
    width: u32,
    height: u32,
}

impl TileImage {
    /// Decodes an image payload as downloaded from the endpoint or read back
    /// from the disk cache.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_image(image::load_from_memory(bytes)?))
    }

    pub fn from_image(image: image::DynamicImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            image,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn image(&self) -> &image::DynamicImage {
        &self.image
    }
}

impl std::fmt::Debug for TileImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Imagery state of one (tile, style) cache entry.
///
/// `Failed` is sticky: once set it suppresses further fetch attempts for the
/// rest of the process lifetime.
#[derive(Debug, Clone, Default)]
pub enum TileState {
    #[default]
    Absent,
    Loading {
        /// Last published download fraction in `0..=1`; `None` until the
        /// first progress event, or throughout when the payload size is
        /// unknown
        progress: Option<f64>,
    },
    Loaded(Arc<TileImage>),
    Failed,
}

impl TileState {
    pub fn is_absent(&self) -> bool {
        matches!(self, TileState::Absent)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, TileState::Loading { .. })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, TileState::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TileState::Failed)
    }
}

/// Lock-protected table of per-(tile, style) imagery states.
///
/// Owned by one renderer; cloning the handle shares the same table, which is
/// how loader tasks deliver results back. Entries are never evicted while the
/// renderer lives.
#[derive(Debug, Clone, Default)]
pub struct TileStore {
    states: Arc<Mutex<HashMap<TileId, TileState>>>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a tile; tiles never touched are `Absent`
    pub fn state(&self, id: &TileId) -> TileState {
        self.states
            .lock()
            .ok()
            .and_then(|map| map.get(id).cloned())
            .unwrap_or_default()
    }

    /// Attempts the `Absent -> Loading` transition. Refuses when the tile is
    /// already loading (one in-flight loader per key), loaded, or has the
    /// sticky failure flag set.
    pub fn try_begin_load(&self, id: &TileId) -> bool {
        match self.states.lock() {
            Ok(mut map) => {
                let state = map.entry(*id).or_default();
                if state.is_absent() {
                    *state = TileState::Loading { progress: None };
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    /// Records a download fraction for a loading tile; ignored in any other
    /// state.
    pub fn set_progress(&self, id: &TileId, fraction: f64) {
        if let Ok(mut map) = self.states.lock() {
            if let Some(state) = map.get_mut(id) {
                if state.is_loading() {
                    *state = TileState::Loading {
                        progress: Some(fraction.clamp(0.0, 1.0)),
                    };
                }
            }
        }
    }

    /// `Loading -> Loaded`
    pub fn complete(&self, id: &TileId, image: Arc<TileImage>) {
        if let Ok(mut map) = self.states.lock() {
            map.insert(*id, TileState::Loaded(image));
        }
    }

    /// `Loading -> Failed`; the flag is sticky
    pub fn fail(&self, id: &TileId) {
        if let Ok(mut map) = self.states.lock() {
            map.insert(*id, TileState::Failed);
        }
    }

    /// Cancellation path: a loading tile goes back to `Absent` so a later
    /// paint may request it again. Loaded and failed entries are untouched.
    pub fn reset(&self, id: &TileId) {
        if let Ok(mut map) = self.states.lock() {
            if let Some(state) = map.get_mut(id) {
                if state.is_loading() {
                    *state = TileState::Absent;
                }
            }
        }
    }

    /// Number of tiles with any recorded state
    pub fn len(&self) -> usize {
        self.states.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
