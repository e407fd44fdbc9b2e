use reqwest::Proxy;

use crate::HlsError;

/// Protocol spoken by the proxy server itself. Every request, whatever its
/// own scheme, is routed through the configured proxy.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
}

impl ProxyType {
    fn scheme(self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl std::fmt::Display for ProxyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy address, with or without a scheme (e.g. "127.0.0.1:1080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>, proxy_type: ProxyType) -> Self {
        Self {
            url: url.into(),
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// The proxy URL, prefixed with the proxy type's scheme when it has none.
    pub fn normalized_url(&self) -> String {
        if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("{}://{}", self.proxy_type.scheme(), self.url)
        }
    }

    pub fn to_proxy(&self) -> Result<Proxy, HlsError> {
        let url = self.normalized_url();
        let proxy = Proxy::all(&url).map_err(|e| {
            HlsError::configuration(format!("invalid {} proxy `{url}`: {e}", self.proxy_type))
        })?;

        Ok(match &self.auth {
            Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
            None => proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_gets_the_type_scheme() {
        let socks = ProxyConfig::new("127.0.0.1:1080", ProxyType::Socks5);
        assert_eq!(socks.normalized_url(), "socks5://127.0.0.1:1080");

        let http = ProxyConfig::new("proxy.test:8080", ProxyType::Http);
        assert_eq!(http.normalized_url(), "http://proxy.test:8080");

        let explicit = ProxyConfig::new("socks5h://proxy.test:1080", ProxyType::Socks5);
        assert_eq!(explicit.normalized_url(), "socks5h://proxy.test:1080");
    }

    #[test]
    fn builds_authenticated_proxy() {
        let config =
            ProxyConfig::new("127.0.0.1:1080", ProxyType::Socks5).with_auth("user", "pass");
        assert!(config.to_proxy().is_ok());
    }

    #[test]
    fn rejects_malformed_address() {
        let err = ProxyConfig::new("http://[::1", ProxyType::Http)
            .to_proxy()
            .unwrap_err();
        assert!(matches!(err, HlsError::Configuration { .. }));
    }
}
