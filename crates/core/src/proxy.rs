//! Proxy Configuration Types
//!
//! Data types for outbound proxy configuration. The report client toggles
//! between proxied and direct delivery; the HTTP client factory lives in the
//! application crate.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, CoreResult};

/// Proxy protocol type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks5,
}

impl ProxyProtocol {
    /// Return the URL scheme string for this protocol.
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks5 => "socks5",
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            "socks5" => Some(ProxyProtocol::Socks5),
            _ => None,
        }
    }
}

/// Proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub protocol: ProxyProtocol,
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// Parse a proxy URL as stored in the `reportProxy` config key. The port
    /// falls back to the scheme's default; a path is ignored. Credentials are
    /// rejected since they cannot be carried over to the client.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let parsed = Url::parse(raw.trim())
            .map_err(|e| CoreError::parse(format!("invalid proxy URL '{}': {}", raw, e)))?;
        let protocol = ProxyProtocol::from_scheme(parsed.scheme()).ok_or_else(|| {
            CoreError::parse(format!("unsupported proxy scheme: {}", parsed.scheme()))
        })?;
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(CoreError::parse(format!(
                "proxy URL must not carry credentials: {}",
                parsed.host_str().unwrap_or(raw)
            )));
        }
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CoreError::parse(format!("proxy URL has no host: {}", raw)))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| CoreError::parse(format!("proxy URL has no port: {}", raw)))?;

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
        })
    }

    /// Build the proxy URL string.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url() {
        let cfg = ProxyConfig {
            protocol: ProxyProtocol::Http,
            host: "127.0.0.1".to_string(),
            port: 8080,
        };
        assert_eq!(cfg.url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_parse_proxy() {
        let cfg = ProxyConfig::parse("socks5://proxy.example.com:1080").unwrap();
        assert_eq!(cfg.protocol, ProxyProtocol::Socks5);
        assert_eq!(cfg.host, "proxy.example.com");
        assert_eq!(cfg.port, 1080);
        assert_eq!(cfg.url(), "socks5://proxy.example.com:1080");
    }

    #[test]
    fn test_parse_proxy_defaults_and_paths() {
        let cfg = ProxyConfig::parse("http://proxy.local").unwrap();
        assert_eq!(cfg.port, 80);
        let cfg = ProxyConfig::parse("https://proxy.local").unwrap();
        assert_eq!(cfg.port, 443);

        let cfg = ProxyConfig::parse("http://proxy.local:8080/pac").unwrap();
        assert_eq!(cfg.host, "proxy.local");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_parse_proxy_rejects_credentials() {
        let err = ProxyConfig::parse("http://user:pw@proxy.local:8080").unwrap_err();
        assert!(!err.to_string().contains("pw"));
        assert!(ProxyConfig::parse("http://user@proxy.local:8080").is_err());
    }

    #[test]
    fn test_parse_proxy_rejects_garbage() {
        assert!(ProxyConfig::parse("proxy.example.com:1080").is_err());
        assert!(ProxyConfig::parse("ftp://proxy:21").is_err());
        assert!(ProxyConfig::parse("socks5://proxy").is_err());
        assert!(ProxyConfig::parse("http://proxy:notaport").is_err());
    }

    #[test]
    fn test_proxy_protocol_scheme() {
        assert_eq!(ProxyProtocol::Http.scheme(), "http");
        assert_eq!(ProxyProtocol::Https.scheme(), "https");
        assert_eq!(ProxyProtocol::Socks5.scheme(), "socks5");
    }
}
