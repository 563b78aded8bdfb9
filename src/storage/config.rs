//! YAML Configuration Management
//!
//! Reads and writes `~/.fef/.feflowrc.yml`. The whole document is rewritten on
//! save; keys this tool does not know about are carried through untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Package managers the tool knows how to drive.
pub const SUPPORTED_PACKAGE_MANAGERS: &[&str] = &["tnpm", "cnpm", "npm", "pnpm", "yarn"];

/// Contents of `.feflowrc.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeflowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_bool", skip_serializing_if = "Option::is_none")]
    pub disable_check: Option<bool>,
    /// Stored as the string `"true"` / `"false"`.
    #[serde(default, deserialize_with = "deserialize_bool_string", skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<String>,
    /// Epoch milliseconds of the last completed version check.
    #[serde(default, deserialize_with = "deserialize_millis", skip_serializing_if = "Option::is_none")]
    pub last_update_check: Option<i64>,
    /// Telemetry endpoint; reporting is off when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    /// `scheme://host:port` proxy used for telemetry delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_proxy: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FeflowConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(pm) = &self.package_manager {
            if !SUPPORTED_PACKAGE_MANAGERS.contains(&pm.as_str()) {
                return Err(format!(
                    "packageManager must be one of {}, got '{}'",
                    SUPPORTED_PACKAGE_MANAGERS.join(", "),
                    pm
                ));
            }
        }
        Ok(())
    }
}

/// Accept `true`, `"true"`, `"1"` and friends.
fn deserialize_loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::Bool(b)) => Some(b),
        Some(serde_yaml::Value::String(s)) => Some(matches!(s.trim(), "true" | "1" | "yes")),
        Some(serde_yaml::Value::Number(n)) => Some(n.as_i64().is_some_and(|n| n != 0)),
        _ => None,
    })
}

/// Normalize a YAML bool or string into the stored string form.
fn deserialize_bool_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        Some(serde_yaml::Value::String(s)) => Some(s),
        _ => None,
    })
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_yaml::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Configuration service for `.feflowrc.yml`
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: FeflowConfig,
}

impl ConfigService {
    /// Open the config at `path`. A missing, unreadable or invalid file is
    /// treated as empty; the next `save` replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let config_path = path.into();
        let config = if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        "[config] Ignoring {}: {}",
                        config_path.display(),
                        e
                    );
                    FeflowConfig::default()
                }
            }
        } else {
            FeflowConfig::default()
        };

        Self {
            config_path,
            config,
        }
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<FeflowConfig> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(FeflowConfig::default());
        }
        let config: FeflowConfig = serde_yaml::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file
    fn save_to_file(path: &Path, config: &FeflowConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_config(&self) -> &FeflowConfig {
        &self.config
    }

    pub fn package_manager(&self) -> Option<&str> {
        self.config.package_manager.as_deref()
    }

    pub fn set_package_manager(&mut self, pm: impl Into<String>) -> AppResult<()> {
        let pm = pm.into();
        if !SUPPORTED_PACKAGE_MANAGERS.contains(&pm.as_str()) {
            return Err(AppError::validation(format!("unsupported package manager: {}", pm)));
        }
        self.config.package_manager = Some(pm);
        Ok(())
    }

    pub fn disable_check(&self) -> bool {
        self.config.disable_check.unwrap_or(false)
    }

    /// `autoUpdate` is only honoured when it is literally `"true"`.
    pub fn auto_update(&self) -> bool {
        self.config.auto_update.as_deref() == Some("true")
    }

    pub fn last_update_check(&self) -> Option<i64> {
        self.config.last_update_check
    }

    pub fn set_last_update_check(&mut self, millis: i64) {
        self.config.last_update_check = Some(millis);
    }

    pub fn report_url(&self) -> Option<&str> {
        self.config.report_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn report_proxy(&self) -> Option<&str> {
        self.config.report_proxy.as_deref().filter(|p| !p.is_empty())
    }
}
