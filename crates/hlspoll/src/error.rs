use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum HlsError {
    #[error("no variant with height in [{min_res}, {max_res}] among {candidates} candidates")]
    ResolutionExhausted {
        min_res: u64,
        max_res: u64,
        candidates: usize,
    },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request for {url} failed with HTTP {status}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error("unsupported cipher `{method}`")]
    UnsupportedCipher { method: String },

    #[error("decryption error: {reason}")]
    Decryption { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl HlsError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn decryption(reason: impl Into<String>) -> Self {
        Self::Decryption {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// A manifest, segment or key fetch failed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::HttpStatus { .. } | Self::InvalidUrl { .. }
        )
    }

    pub fn is_decryption(&self) -> bool {
        matches!(
            self,
            Self::Decryption { .. } | Self::UnsupportedCipher { .. }
        )
    }
}
