use clap::Parser;
use hlspoll::output::OutputFormat;
use hlspoll_engine::{ProxyType, Sorting};
use std::path::PathBuf;

/// Continuously download an HLS live stream, following playlist refreshes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Master or media playlist URL
    pub url: String,

    /// Output file, required for file output; segments are appended to it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output destination
    #[arg(long, value_enum, default_value_t = OutputFormat::File)]
    pub output_format: OutputFormat,

    /// Extra request header ("Name: value"), may be repeated; overrides defaults
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Minimum variant height in pixels
    #[arg(long, default_value_t = hlspoll_engine::hls::config::DEFAULT_MIN_RES)]
    pub min_res: u64,

    /// Maximum variant height in pixels
    #[arg(long, default_value_t = hlspoll_engine::hls::config::DEFAULT_MAX_RES)]
    pub max_res: u64,

    /// Pick the tallest (best) or shortest (worst) variant in range
    #[arg(long, value_enum, default_value_t = Sorting::Best)]
    pub sorting: Sorting,

    /// Consecutive empty manifests tolerated before stopping
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Delay between empty-manifest retries, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_delay: u64,

    /// Proxy server URL
    #[arg(long)]
    pub proxy: Option<String>,

    /// Proxy type
    #[arg(long, value_enum, default_value_t = ProxyType::Http)]
    pub proxy_type: ProxyType,

    /// Proxy username
    #[arg(long, requires = "proxy")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, requires = "proxy")]
    pub proxy_pass: Option<String>,

    /// Ignore system proxy settings
    #[arg(long)]
    pub no_system_proxy: bool,

    /// Connection timeout in seconds (0 disables)
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,

    /// Overall request timeout in seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Decrypt on the poll task instead of the blocking thread pool
    #[arg(long)]
    pub no_offload: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}
