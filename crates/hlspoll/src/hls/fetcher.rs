// Raw fetch primitive used for manifests, segments and keys alike.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::trace;
use url::Url;

use crate::HlsError;
use crate::downloader::{DownloaderConfig, create_client};

#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Fetches the full body at `url`.
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Bytes, HlsError>;
}

/// [`ByteFetcher`] over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_config(config: &DownloaderConfig) -> Result<Self, HlsError> {
        Ok(Self::new(create_client(config)?))
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Bytes, HlsError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HlsError::http_status(response.status(), url.as_str()));
        }

        let http_version = response.version();
        let body = response.bytes().await?;
        trace!(
            url = %url,
            http_version = ?http_version,
            bytes = body.len(),
            "Fetched resource"
        );
        Ok(body)
    }
}
