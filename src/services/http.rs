//! HTTP Client Factory
//!
//! Builds reqwest clients with an explicit proxy choice and request timeout.

use std::time::Duration;

use feflow_core::ProxyConfig;

use crate::utils::error::{AppError, AppResult};

/// Build a `reqwest::Client` with the resolved proxy configuration.
///
/// - `Some(proxy)` -> route every request through the proxy
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
pub fn build_http_client(
    proxy: Option<&ProxyConfig>,
    timeout: Duration,
) -> AppResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    match proxy {
        Some(cfg) => {
            let url = cfg.url();
            let p = reqwest::Proxy::all(&url)
                .map_err(|e| AppError::config(format!("invalid proxy URL {}: {}", url, e)))?;
            builder = builder.proxy(p);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feflow_core::ProxyProtocol;

    #[test]
    fn test_build_http_client_no_proxy() {
        assert!(build_http_client(None, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let cfg = ProxyConfig {
            protocol: ProxyProtocol::Http,
            host: "127.0.0.1".to_string(),
            port: 8080,
        };
        assert!(build_http_client(Some(&cfg), Duration::from_millis(600)).is_ok());
    }
}
