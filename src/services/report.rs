//! Usage Reporting
//!
//! Fire-and-forget POST of a small invocation record. Delivery never blocks
//! the command: the dispatcher spawns it and only waits a short grace period
//! at exit. Timeouts and refused connections are retried up to three times,
//! flipping between proxied and direct delivery on every retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feflow_core::{ParsedArgs, ProxyConfig};
use serde::Serialize;
use serde_json::Value;

use crate::services::http::build_http_client;

/// Per-request timeout for report delivery.
pub const REPORT_TIMEOUT: Duration = Duration::from_millis(600);

/// Retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Why a single delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    ConnectionRefused,
    Other(String),
}

impl TransportError {
    /// Only network-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::ConnectionRefused)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "ETIMEDOUT"),
            TransportError::ConnectionRefused => write!(f, "ECONNREFUSED"),
            TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// One POST of a JSON body, optionally through a proxy.
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: &Value,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Value, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

#[async_trait]
impl ReportTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: &Value,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Value, TransportError> {
        let client = build_http_client(proxy, REPORT_TIMEOUT)
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let response = client.post(url).json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_connect() {
                TransportError::ConnectionRefused
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Other(format!("HTTP {}", status)));
        }

        // An empty or non-JSON body still counts as delivered.
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| Value::Object(Default::default())))
    }
}

/// Delivers one report, retrying with the proxy toggled.
pub struct ReportClient {
    url: String,
    proxy: Option<ProxyConfig>,
    transport: Arc<dyn ReportTransport>,
    need_proxy: bool,
    retry_count: u32,
}

impl ReportClient {
    /// Starts in proxied mode, as the first attempt goes through the proxy
    /// when one is configured.
    pub fn new(
        url: impl Into<String>,
        proxy: Option<ProxyConfig>,
        transport: Arc<dyn ReportTransport>,
    ) -> Self {
        Self {
            url: url.into(),
            proxy,
            transport,
            need_proxy: true,
            retry_count: 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn need_proxy(&self) -> bool {
        self.need_proxy
    }

    fn active_proxy(&self) -> Option<&ProxyConfig> {
        if self.need_proxy {
            self.proxy.as_ref()
        } else {
            None
        }
    }

    /// Deliver `body`. `cb` runs once with the response on success and never
    /// on failure.
    pub async fn do_report<F>(&mut self, body: &Value, cb: F)
    where
        F: FnOnce(Value) + Send,
    {
        loop {
            tracing::debug!(
                "[report] start ({})",
                if self.active_proxy().is_some() { "with proxy" } else { "without proxy" }
            );
            match self.transport.post(&self.url, body, self.active_proxy()).await {
                Ok(response) => {
                    tracing::debug!("[report] success");
                    cb(response);
                    return;
                }
                Err(e) => {
                    tracing::debug!("[report] fail: {}", e);
                    if !e.is_retryable() || self.retry_count >= MAX_RETRIES {
                        return;
                    }
                    self.retry_count += 1;
                    self.need_proxy = !self.need_proxy;
                    tracing::debug!("[report] timeout, retry {}", self.retry_count);
                }
            }
        }
    }
}

/// Body sent for every invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub command: String,
    pub args: Value,
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub session_id: String,
}

impl ReportPayload {
    pub fn new(command: &str, args: &ParsedArgs, version: &str) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_json(),
            version: version.to_string(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Spawns report delivery in the background.
#[derive(Clone)]
pub struct Reporter {
    url: String,
    proxy: Option<ProxyConfig>,
    transport: Arc<dyn ReportTransport>,
}

impl Reporter {
    pub fn new(
        url: impl Into<String>,
        proxy: Option<ProxyConfig>,
        transport: Arc<dyn ReportTransport>,
    ) -> Self {
        Self {
            url: url.into(),
            proxy,
            transport,
        }
    }

    /// Start delivery; the caller may await the handle with a deadline.
    pub fn spawn(&self, payload: ReportPayload) -> tokio::task::JoinHandle<()> {
        let mut client = ReportClient::new(self.url.clone(), self.proxy.clone(), self.transport.clone());
        tokio::spawn(async move {
            let body = match serde_json::to_value(&payload) {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("[report] Failed to encode payload: {}", e);
                    return;
                }
            };
            client
                .do_report(&body, |_| tracing::debug!("[report] delivered"))
                .await;
        })
    }
}
