//! Transport seam between the tile loader and the network.
//!
//! The loader consumes downloads as chunked byte streams through these
//! object-safe traits so that cancellation and progress can be handled at
//! chunk boundaries, and so scenario tests can script the transport.

use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;

/// Shared async HTTP client. Building the client once avoids TLS and
/// connection pool setup per tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("fieldmap/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("failed to build reqwest async client")
});

/// One in-flight download, consumed chunk by chunk
#[async_trait]
pub trait TileStream: Send {
    /// Payload size from the response headers, when the server sent one
    fn content_length(&self) -> Option<u64>;

    /// Next chunk of the payload; `None` at end of stream
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Opens streaming downloads for tile URLs
#[async_trait]
pub trait TileFetch: Send + Sync {
    async fn open(&self, url: &reqwest::Url) -> Result<Box<dyn TileStream>>;
}

/// Production transport over the shared reqwest client
#[derive(Debug, Default)]
pub struct HttpFetch;

struct HttpStream {
    response: reqwest::Response,
    content_length: Option<u64>,
}

#[async_trait]
impl TileFetch for HttpFetch {
    async fn open(&self, url: &reqwest::Url) -> Result<Box<dyn TileStream>> {
        let response = HTTP_CLIENT
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let content_length = response.content_length();
        Ok(Box::new(HttpStream {
            response,
            content_length,
        }))
    }
}

#[async_trait]
impl TileStream for HttpStream {
    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.response.chunk().await?.map(|bytes| bytes.to_vec()))
    }
}
