use crate::error::{AppError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration for crate-lens.
///
/// Loaded from a JSON file; every field is optional and falls back to its
/// default.
///
/// # Examples
///
/// ```
/// use crate_lens::config::LensConfig;
///
/// let json = r#"{
///     "cache": { "ttl_secs": 60 },
///     "advisories": { "enabled": false }
/// }"#;
///
/// let config: LensConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.cache.ttl_secs, 60);
/// assert!(!config.advisories.enabled);
/// assert_eq!(config.registry.concurrency, 10);
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LensConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub advisories: AdvisoryConfig,
}

impl LensConfig {
    /// Reads configuration from `path`, or returns defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| AppError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Registry version cache settings.
///
/// # Defaults
///
/// - `ttl_secs`: `300` (5 minutes)
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
        }
    }
}

/// Registry client settings.
///
/// # Defaults
///
/// - `concurrency`: `10` concurrent index requests per pass
/// - `timeout_secs`: `30`
/// - `user_agent`: `crate-lens/<version>`
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl RegistrySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Advisory enrichment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cargo_path")]
    pub cargo_path: String,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cargo_path: default_cargo_path(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_ttl() -> u64 {
    300
}

const fn default_concurrency() -> usize {
    10
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("crate-lens/{}", env!("CARGO_PKG_VERSION"))
}

fn default_cargo_path() -> String {
    "cargo".to_string()
}
