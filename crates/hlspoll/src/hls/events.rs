use std::sync::Arc;
use std::time::Duration;

/// Progress notifications emitted by the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// A variant was chosen from a master playlist
    VariantSelected { url: String, height: Option<u64> },
    /// A batch of new segments reached the sink
    BatchWritten {
        media_sequence: u64,
        segments: usize,
        bytes: u64,
    },
    /// A manifest had neither segments nor variants
    ManifestUnresolved {
        attempt: u32,
        max_retries: u32,
        retry_in: Option<Duration>,
    },
    /// The loop exited cleanly
    Stopped,
}

pub type EventCallback = Arc<dyn Fn(DownloadEvent) + Send + Sync + 'static>;
