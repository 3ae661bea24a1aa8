//! Alternate registry discovery from Cargo configuration files.
//!
//! Mirrors Cargo's hierarchical config lookup: `.cargo/config.toml` (or the
//! legacy extensionless `.cargo/config`) in the scope directory and each of
//! its ancestors, then `$CARGO_HOME/config.toml`. A nearer file wins when two
//! files define the same registry.

use crate::error::CargoError;
use async_trait::async_trait;
use lens_core::{RegistryConfig, RegistryConfigLoader};
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item};

const CONFIG_FILES: [&str; 2] = ["config.toml", "config"];

/// [`RegistryConfigLoader`] reading `[registries.<name>]` tables.
#[derive(Debug, Clone, Default)]
pub struct CargoConfigLoader {
    cargo_home: Option<PathBuf>,
}

impl CargoConfigLoader {
    /// Uses `$CARGO_HOME`, falling back to `~/.cargo`.
    pub fn new() -> Self {
        let cargo_home = std::env::var_os("CARGO_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".cargo")));
        Self { cargo_home }
    }

    pub fn with_cargo_home(cargo_home: Option<PathBuf>) -> Self {
        Self { cargo_home }
    }

    /// Config files that apply to `scope`, nearest first.
    pub fn config_files(&self, scope: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = scope
            .ancestors()
            .filter_map(|dir| {
                let cargo_dir = dir.join(".cargo");
                CONFIG_FILES
                    .iter()
                    .map(|name| cargo_dir.join(name))
                    .find(|candidate| candidate.is_file())
            })
            .collect();

        if let Some(home) = &self.cargo_home
            && let Some(home_config) = CONFIG_FILES
                .iter()
                .map(|name| home.join(name))
                .find(|candidate| candidate.is_file())
            && !files.contains(&home_config)
        {
            files.push(home_config);
        }

        files
    }
}

#[async_trait]
impl RegistryConfigLoader for CargoConfigLoader {
    async fn load(&self, scope: &Path) -> lens_core::Result<RegistryConfig> {
        let mut config = RegistryConfig::new();

        for path in self.config_files(scope) {
            let content = tokio::fs::read_to_string(&path).await?;
            merge_registries(&mut config, &content, &path)?;
            tracing::debug!("read registry config from {}", path.display());
        }

        tracing::debug!(
            "{} alternate registries configured for {}",
            config.len(),
            scope.display()
        );
        Ok(config)
    }
}

/// Adds the registries defined in one config file, keeping earlier definitions.
fn merge_registries(
    config: &mut RegistryConfig,
    content: &str,
    path: &Path,
) -> Result<(), CargoError> {
    let doc: DocumentMut = content
        .parse()
        .map_err(|source| CargoError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;

    let Some(registries) = doc.get("registries").and_then(Item::as_table_like) else {
        return Ok(());
    };

    for (name, entry) in registries.iter() {
        if let Some(index) = entry
            .as_table_like()
            .and_then(|table| table.get("index"))
            .and_then(Item::as_str)
        {
            config.insert_if_absent(name, index);
        }
    }

    Ok(())
}
