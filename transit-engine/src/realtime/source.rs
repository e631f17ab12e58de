//! Where realtime feed bytes come from.
//!
//! Fetching (and any retry policy) belongs to the caller. The engine only
//! asks a `FeedSource` for the latest bytes on each poll.

use std::future::Future;
use std::path::PathBuf;

use super::error::RealtimeError;

/// A provider of encoded GTFS-Realtime snapshots.
pub trait FeedSource: Send + Sync + 'static {
    /// Fetch the current feed bytes.
    fn fetch(&self) -> impl Future<Output = Result<Vec<u8>, RealtimeError>> + Send;
}

/// Reads the feed from a file that another process keeps up to date.
#[derive(Debug, Clone)]
pub struct FileFeedSource {
    path: PathBuf,
}

impl FileFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FeedSource for FileFeedSource {
    async fn fetch(&self) -> Result<Vec<u8>, RealtimeError> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}
