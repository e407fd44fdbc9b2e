use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::HlsError;
use crate::proxy::ProxyConfig;

/// HTTP client options shared by manifest, segment and key requests.
///
/// Request headers are not part of this struct: they belong to the
/// [`HlsConfig`](crate::hls::HlsConfig) and are sent explicitly on every fetch.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single request. Zero disables it.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection). Zero disables it.
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept around. Zero keeps reqwest's default.
    pub pool_idle_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(30),
            follow_redirects: true,
            proxy: None,
            use_system_proxy: true,
        }
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, HlsError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(10)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.pool_idle_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.pool_idle_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        client_builder = client_builder.proxy(proxy_config.to_proxy()?);
        info!(
            proxy_url = %proxy_config.normalized_url(),
            "Using explicitly configured proxy"
        );
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder.build().map_err(HlsError::from)
}
