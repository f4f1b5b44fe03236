use crate::tiles::endpoint::DiskCache;
use crate::tiles::fetch::TileFetch;
use crate::tiles::identity::TileId;
use crate::tiles::store::TileImage;
use crate::{MapError, Result};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Events published by a tile loader.
///
/// Within one loader, `Progress` fractions are monotonically non-decreasing
/// and are followed by exactly one terminal event (`Completed`, `Failed` or
/// `Cancelled`). Consumers must tolerate any subset of the progress events,
/// including none.
#[derive(Debug)]
pub enum TileEvent {
    Progress {
        id: TileId,
        fraction: f64,
    },
    Completed {
        id: TileId,
        image: Arc<TileImage>,
    },
    Failed {
        id: TileId,
        error: MapError,
    },
    /// Normal outcome of teardown, not an error; nothing was stored
    Cancelled {
        id: TileId,
    },
}

impl TileEvent {
    pub fn id(&self) -> &TileId {
        match self {
            TileEvent::Progress { id, .. }
            | TileEvent::Completed { id, .. }
            | TileEvent::Failed { id, .. }
            | TileEvent::Cancelled { id } => id,
        }
    }
}

/// One unit of fetch work for a single (tile, style) key.
///
/// Tries the disk cache first, then streams from the remote endpoint with
/// cooperative cancellation at every chunk boundary, decodes, and writes the
/// payload back through to disk (best effort). Runs off the paint thread;
/// results travel back over the event channel and are applied to shared
/// render state only when the renderer drains them.
pub struct TileLoader {
    id: TileId,
    /// Validated download URL; `None` when no usable endpoint is configured,
    /// which turns a cache miss straight into a failure
    url: Option<reqwest::Url>,
    cache: DiskCache,
    fetcher: Arc<dyn TileFetch>,
    events: Sender<TileEvent>,
    abort: Arc<AtomicBool>,
}

impl TileLoader {
    pub fn new(
        id: TileId,
        url: Option<reqwest::Url>,
        cache: DiskCache,
        fetcher: Arc<dyn TileFetch>,
        events: Sender<TileEvent>,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            url,
            cache,
            fetcher,
            events,
            abort,
        }
    }

    /// Runs the loader to its terminal event
    pub async fn run(self) {
        let outcome = self.execute().await;
        // The receiver disappearing just means the renderer is gone
        let _ = self.events.send(outcome);
    }

    async fn execute(&self) -> TileEvent {
        // Local cache first; a hit never touches the network
        if let Some(bytes) = self.cache.read(&self.id) {
            match TileImage::decode(&bytes) {
                Ok(image) => {
                    log::debug!("tile {} served from disk", self.id.cache_file_name());
                    return TileEvent::Completed {
                        id: self.id,
                        image: Arc::new(image),
                    };
                }
                Err(e) => {
                    log::warn!(
                        "cached tile {} does not decode: {e}",
                        self.id.cache_file_name()
                    );
                }
            }
        }

        let url = match &self.url {
            Some(url) => url,
            None => {
                return TileEvent::Failed {
                    id: self.id,
                    error: MapError::InvalidEndpoint(
                        "no usable imagery endpoint configured".into(),
                    ),
                }
            }
        };

        let bytes = match self.download(url).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return TileEvent::Cancelled { id: self.id },
            Err(error) => {
                return TileEvent::Failed {
                    id: self.id,
                    error,
                }
            }
        };

        let image = match TileImage::decode(&bytes) {
            Ok(image) => image,
            Err(e) => {
                return TileEvent::Failed {
                    id: self.id,
                    error: e.into(),
                }
            }
        };

        // Write-through is best effort; the decoded image carries the session
        if let Err(e) = self.cache.write(&self.id, &bytes) {
            log::warn!(
                "failed to write tile {} to disk cache: {e}",
                self.id.cache_file_name()
            );
        }

        TileEvent::Completed {
            id: self.id,
            image: Arc::new(image),
        }
    }

    /// Streams the payload, publishing progress at >10-percentage-point
    /// deltas when the size is known. `Ok(None)` means the abort flag was
    /// observed at a chunk boundary.
    async fn download(&self, url: &reqwest::Url) -> Result<Option<Vec<u8>>> {
        log::info!("downloading tile imagery from {url}");
        let mut stream = self.fetcher.open(url).await?;
        let total = stream.content_length().filter(|t| *t > 0);
        let mut buf: Vec<u8> = Vec::with_capacity(total.unwrap_or(1 << 20) as usize);
        let mut last_published = 0.0_f64;

        loop {
            if self.abort.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match stream.next_chunk().await? {
                Some(chunk) => {
                    buf.extend_from_slice(&chunk);
                    if let Some(total) = total {
                        let fraction = buf.len() as f64 / total as f64;
                        if fraction - last_published > 0.10 {
                            last_published = fraction;
                            let _ = self.events.send(TileEvent::Progress {
                                id: self.id,
                                fraction,
                            });
                        }
                    }
                }
                None => break,
            }
        }

        if self.abort.load(Ordering::Relaxed) {
            return Ok(None);
        }
        log::debug!(
            "tile {} download complete ({} bytes)",
            self.id.cache_file_name(),
            buf.len()
        );
        Ok(Some(buf))
    }
}
