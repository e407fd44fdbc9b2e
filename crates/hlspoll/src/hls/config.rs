use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::HlsError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:99.0) Gecko/20100101 Firefox/99.0";

pub const DEFAULT_MIN_RES: u64 = 0;
pub const DEFAULT_MAX_RES: u64 = 5000;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Direction used to order the variants that fit the resolution window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Sorting {
    /// Tallest variant first
    #[default]
    Best,
    /// Shortest variant first
    Worst,
}

impl std::fmt::Display for Sorting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sorting::Best => write!(f, "best"),
            Sorting::Worst => write!(f, "worst"),
        }
    }
}

/// Immutable settings of one downloader instance.
#[derive(Debug, Clone)]
pub struct HlsConfig {
    /// Root manifest URL
    pub url: Url,
    /// Headers sent with every manifest, segment and key request
    pub headers: HeaderMap,
    /// Inclusive lower bound on variant height, in pixels
    pub min_res: u64,
    /// Inclusive upper bound on variant height, in pixels
    pub max_res: u64,
    pub sorting: Sorting,
    /// How many consecutive unresolved manifests are tolerated before stopping
    pub retries: u32,
    /// Sleep between unresolved-manifest retries
    pub retry_delay: Duration,
    /// Run AES work on the blocking thread pool instead of the poll task
    pub offload_decryption: bool,
}

impl HlsConfig {
    pub fn builder(url: impl Into<String>) -> HlsConfigBuilder {
        HlsConfigBuilder::new(url)
    }

    pub fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers
    }
}

#[derive(Debug, Clone)]
pub struct HlsConfigBuilder {
    url: String,
    headers: Option<HeaderMap>,
    min_res: u64,
    max_res: u64,
    sorting: Sorting,
    retries: u32,
    retry_delay: Duration,
    offload_decryption: bool,
}

impl HlsConfigBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: None,
            min_res: DEFAULT_MIN_RES,
            max_res: DEFAULT_MAX_RES,
            sorting: Sorting::default(),
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            offload_decryption: true,
        }
    }

    /// Replace the default headers entirely.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn min_res(mut self, min_res: u64) -> Self {
        self.min_res = min_res;
        self
    }

    pub fn max_res(mut self, max_res: u64) -> Self {
        self.max_res = max_res;
        self
    }

    pub fn sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = sorting;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn offload_decryption(mut self, enabled: bool) -> Self {
        self.offload_decryption = enabled;
        self
    }

    pub fn build(self) -> Result<HlsConfig, HlsError> {
        let url =
            Url::parse(&self.url).map_err(|e| HlsError::invalid_url(&self.url, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HlsError::invalid_url(
                &self.url,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }
        if self.min_res > self.max_res {
            return Err(HlsError::configuration(format!(
                "min_res ({}) is greater than max_res ({})",
                self.min_res, self.max_res
            )));
        }

        Ok(HlsConfig {
            url,
            headers: self.headers.unwrap_or_else(HlsConfig::default_headers),
            min_res: self.min_res,
            max_res: self.max_res,
            sorting: self.sorting,
            retries: self.retries,
            retry_delay: self.retry_delay,
            offload_decryption: self.offload_decryption,
        })
    }
}
