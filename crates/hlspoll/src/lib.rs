pub mod downloader;
pub mod error;
pub mod hls;
pub mod proxy;

pub use downloader::{DownloaderConfig, create_client};
pub use error::HlsError;
pub use hls::{
    DownloadEvent, FileSink, HlsConfig, HlsDownloader, RunSummary, SegmentSink, Sorting,
    StdoutSink, StopHandle,
};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
