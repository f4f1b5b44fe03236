use crate::tiles::identity::{TileId, TILE_PIXEL_SIZE};
use crate::{MapError, Result};
use std::path::{Path, PathBuf};

/// Parameterized URL template for the remote imagery service.
///
/// The template is substituted and validated per tile before any I/O
/// happens; a malformed result is [`MapError::InvalidEndpoint`] and the
/// requesting loader fails without touching the network.
#[derive(Debug, Clone)]
pub struct ImageryEndpoint {
    base: String,
    api_key: String,
}

impl ImageryEndpoint {
    pub fn new(base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            api_key: api_key.into(),
        }
    }

    /// Builds and validates the download URL for one tile
    pub fn url(&self, id: &TileId) -> Result<reqwest::Url> {
        let raw = format!(
            "{}center={:.6},{:.6}&zoom={}&scale={}&size={}x{}&key={}&maptype={}&format=png",
            self.base,
            id.lat(),
            id.lng(),
            id.zoom(),
            id.resolution().scale(),
            TILE_PIXEL_SIZE,
            TILE_PIXEL_SIZE,
            self.api_key,
            id.style()
        );
        reqwest::Url::parse(&raw).map_err(|e| MapError::InvalidEndpoint(format!("{raw}: {e}")))
    }
}

/// Permanent disk cache of downloaded tiles, one file per identity.
///
/// The directory is created on demand. Keys are unique per (tile, style,
/// resolution), so concurrent writers never target the same file in normal
/// operation; a race on an identical key is last-write-wins.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &TileId) -> PathBuf {
        self.root.join(id.cache_file_name())
    }

    /// Reads a cached tile payload. A missing or unreadable file is `None`;
    /// unreadable files are logged since they mean a damaged cache entry.
    pub fn read(&self, id: &TileId) -> Option<Vec<u8>> {
        let path = self.path_for(id);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Writes a tile payload through to disk. Callers treat failure as
    /// non-fatal; the in-memory image remains usable for the session.
    pub fn write(&self, id: &TileId, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.path_for(id), bytes)?;
        Ok(())
    }
}
