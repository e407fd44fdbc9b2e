pub mod batch;
pub mod cache;
pub mod config;
pub mod decryption;
pub mod events;
pub mod fetcher;
pub mod hls_downloader;
pub mod playlist;
pub mod selector;
pub mod sink;

#[cfg(test)]
mod test_support;

pub use batch::{BatchDownloader, BatchOutcome};
pub use cache::{BoundedCache, CACHE_CAPACITY, SegmentCache};
pub use config::{HlsConfig, HlsConfigBuilder, Sorting};
pub use decryption::{CachedKey, CipherMethod, KeyCache, decrypt, make_iv};
pub use events::{DownloadEvent, EventCallback};
pub use fetcher::{ByteFetcher, HttpFetcher};
pub use hls_downloader::{HlsDownloader, PollState, RunState, RunSummary, StopHandle};
pub use playlist::{
    KeyRef, M3u8Parser, ManifestParser, ManifestView, MediaManifest, Segment, Variant,
};
pub use selector::select_variant;
pub use sink::{FileSink, SegmentSink, StdoutSink};
