//! Long-lived state shared by every validation pass.

use crate::config::LensConfig;
use crate::error::{AppError, Result};
use lens_cargo::{CargoAudit, CargoConfigLoader, CargoLockParser, SparseIndexClient};
use lens_core::{
    AdvisoryTool, KeyedCache, LockfileCache, LockfileProvider, ProbeCache, RegistryConfig,
    RegistryConfigLoader, VersionCache, VersionSource,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Caches and collaborators owned by one running application.
///
/// Every cache is an explicit field so that callers can clear them on user
/// action or after an environment change, and tests can inspect them.
pub struct Session {
    pub config: LensConfig,
    pub versions: VersionCache,
    /// Registry configuration per manifest directory.
    pub registry_configs: KeyedCache<PathBuf, RegistryConfig>,
    pub lockfiles: LockfileCache,
    pub advisory_probe: ProbeCache,
    pub source: Arc<dyn VersionSource>,
    pub config_loader: Arc<dyn RegistryConfigLoader>,
    pub lockfile_provider: Arc<dyn LockfileProvider>,
    pub advisory_tool: Arc<dyn AdvisoryTool>,
}

impl Session {
    /// Session wired to crates.io, `.cargo/config.toml`, `Cargo.lock` and `cargo audit`.
    pub fn cargo(config: LensConfig) -> Result<Self> {
        let client = SparseIndexClient::new(&config.registry.user_agent, config.registry.timeout())
            .map_err(|e| AppError::HttpClient(e.to_string()))?;
        let audit = CargoAudit::new(config.advisories.cargo_path.clone());

        Ok(Self::with_collaborators(
            config,
            Arc::new(client),
            Arc::new(CargoConfigLoader::new()),
            Arc::new(CargoLockParser),
            Arc::new(audit),
        ))
    }

    pub fn with_collaborators(
        config: LensConfig,
        source: Arc<dyn VersionSource>,
        config_loader: Arc<dyn RegistryConfigLoader>,
        lockfile_provider: Arc<dyn LockfileProvider>,
        advisory_tool: Arc<dyn AdvisoryTool>,
    ) -> Self {
        Self {
            versions: VersionCache::new(config.cache.ttl()),
            registry_configs: KeyedCache::new(),
            lockfiles: LockfileCache::new(),
            advisory_probe: ProbeCache::new(),
            config,
            source,
            config_loader,
            lockfile_provider,
            advisory_tool,
        }
    }

    pub fn clear_versions(&self) {
        self.versions.invalidate();
    }

    /// Forgets registry configuration, e.g. after a `.cargo/config.toml` change.
    pub fn clear_registry_configs(&self) {
        self.registry_configs.invalidate();
        tracing::debug!("registry config cache cleared");
    }

    /// Forces the next advisory check to probe for the tool again.
    pub fn reset_advisory_probe(&self) {
        self.advisory_probe.invalidate();
        tracing::debug!("advisory tool probe reset");
    }

    pub fn clear_lockfiles(&self) {
        self.lockfiles.clear();
    }
}
