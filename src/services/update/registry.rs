//! Remote Version Lookup
//!
//! Fetches the `latest` dist-tag of a package from an npm-compatible registry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::services::http::build_http_client;
use crate::services::update::package_manager::PackageManager;
use crate::utils::error::{AppError, AppResult};

/// Registry used when the package manager reports none.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org/";

/// Request timeout for version lookups.
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of "latest published version" answers.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest_version(&self, package: &str) -> AppResult<String>;
}

#[derive(Debug, Deserialize)]
struct LatestManifest {
    version: String,
}

/// npm-compatible registry client.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl NpmRegistry {
    pub fn new(base_url: impl Into<String>) -> AppResult<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| AppError::config(format!("invalid registry URL {}: {}", base_url, e)))?;
        Ok(Self {
            base_url,
            client: build_http_client(None, VERSION_CHECK_TIMEOUT)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{registry}/{escaped-name}/latest`. Scoped names keep their leading
    /// `@` and escape the slash.
    pub fn latest_url(&self, package: &str) -> String {
        let encoded = urlencoding::encode(package);
        let escaped = match encoded.strip_prefix("%40") {
            Some(rest) => format!("@{}", rest),
            None => encoded.into_owned(),
        };
        format!("{}/{}/latest", self.base_url.trim_end_matches('/'), escaped)
    }
}

#[async_trait]
impl VersionSource for NpmRegistry {
    async fn latest_version(&self, package: &str) -> AppResult<String> {
        let url = self.latest_url(package);
        tracing::debug!("[registry] GET {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::not_found(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let manifest: LatestManifest = response.json().await?;
        Ok(manifest.version)
    }
}

/// Registry resolved from the package manager's own configuration on the
/// first lookup, so throttled runs never spawn it.
pub struct PackageManagerRegistry {
    package_manager: Arc<dyn PackageManager>,
    registry: OnceCell<NpmRegistry>,
}

impl PackageManagerRegistry {
    pub fn new(package_manager: Arc<dyn PackageManager>) -> Self {
        Self {
            package_manager,
            registry: OnceCell::new(),
        }
    }
}

#[async_trait]
impl VersionSource for PackageManagerRegistry {
    async fn latest_version(&self, package: &str) -> AppResult<String> {
        let registry = self
            .registry
            .get_or_try_init(|| async {
                let url = self.package_manager.registry_url().await;
                tracing::debug!("[registry] Using {}", url);
                NpmRegistry::new(url)
            })
            .await?;
        registry.latest_version(package).await
    }
}
