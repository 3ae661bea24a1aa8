use crate::dependency::RegistryId;
use crate::error::{ResolutionError, Result};
use crate::version::ResolvedVersion;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Index location of the implicit crates.io registry.
pub const CRATES_IO_INDEX: &str = "sparse+https://index.crates.io/";

/// Git location crates.io used before the sparse protocol. Lockfiles still
/// record it as the source of crates.io packages.
pub const CRATES_IO_GIT_INDEX: &str = "registry+https://github.com/rust-lang/crates.io-index";

/// Protocol a registry index is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexProtocol {
    Sparse,
    Git,
}

/// A registry id resolved to its index location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryIndex {
    pub registry: RegistryId,
    /// Base URL without protocol prefix, always ending in `/`.
    pub url: String,
    pub protocol: IndexProtocol,
}

impl RegistryIndex {
    pub fn parse(registry: RegistryId, location: &str) -> Self {
        let location = location.trim();
        let (protocol, url) = match location.strip_prefix("sparse+") {
            Some(rest) => (IndexProtocol::Sparse, rest),
            None => (
                IndexProtocol::Git,
                location.strip_prefix("registry+").unwrap_or(location),
            ),
        };

        let url = if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{url}/")
        };

        Self {
            registry,
            url,
            protocol,
        }
    }

    pub fn crates_io() -> Self {
        Self::parse(RegistryId::CratesIo, CRATES_IO_INDEX)
    }

    /// Key used to compare this index against lockfile `source` strings.
    pub fn canonical(&self) -> String {
        canonical_index_url(&self.url)
    }
}

/// Normalises an index location so equivalent spellings compare equal.
///
/// Protocol prefixes, trailing slashes, and a `.git` suffix are dropped, and
/// the legacy crates.io git index maps onto the sparse index.
///
/// # Examples
///
/// ```
/// use lens_core::registry::canonical_index_url;
///
/// assert_eq!(
///     canonical_index_url("registry+https://github.com/rust-lang/crates.io-index"),
///     canonical_index_url("sparse+https://index.crates.io/"),
/// );
/// ```
pub fn canonical_index_url(location: &str) -> String {
    let location = location.trim();
    let location = location
        .strip_prefix("sparse+")
        .or_else(|| location.strip_prefix("registry+"))
        .unwrap_or(location);
    let location = location.trim_end_matches('/');
    let location = location.strip_suffix(".git").unwrap_or(location);

    if location == "https://github.com/rust-lang/crates.io-index" {
        return "https://index.crates.io".to_string();
    }
    location.to_string()
}

/// Registry name → index location mapping for one project scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    registries: HashMap<String, String>,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registry unless a higher-priority source already defined it.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, index: impl Into<String>) {
        self.registries.entry(name.into()).or_insert_with(|| index.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.registries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    /// Resolves a registry id to its index.
    pub fn index_for(&self, registry: &RegistryId) -> std::result::Result<RegistryIndex, ResolutionError> {
        match registry {
            RegistryId::CratesIo => Ok(RegistryIndex::crates_io()),
            RegistryId::Named(name) => self
                .get(name)
                .map(|location| RegistryIndex::parse(registry.clone(), location))
                .ok_or_else(|| ResolutionError::RegistryNotConfigured {
                    registry: name.clone(),
                }),
        }
    }
}

/// A version as published in a registry index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub version: ResolvedVersion,
    pub yanked: bool,
}

impl PublishedVersion {
    pub fn new(version: ResolvedVersion) -> Self {
        Self {
            version,
            yanked: false,
        }
    }
}

/// Highest non-yanked version, prereleases included.
pub fn find_latest(versions: &[PublishedVersion]) -> Option<&ResolvedVersion> {
    versions
        .iter()
        .filter(|v| !v.yanked)
        .map(|v| &v.version)
        .max()
}

/// Highest non-yanked release version.
pub fn find_latest_stable(versions: &[PublishedVersion]) -> Option<&ResolvedVersion> {
    versions
        .iter()
        .filter(|v| !v.yanked && !v.version.is_prerelease())
        .map(|v| &v.version)
        .max()
}

/// Source of published versions for a crate.
///
/// Implementations perform the network operation; caching and request
/// dedupe live in [`crate::cache::VersionCache`].
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Fetches every published version of `crate_name` from `index`.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::Transport`] when the index is unreachable
    /// - [`ResolutionError::NotFound`] when the crate does not exist
    /// - [`ResolutionError::UnsupportedIndex`] for index protocols the source cannot speak
    async fn fetch_versions(
        &self,
        crate_name: &str,
        index: &RegistryIndex,
    ) -> std::result::Result<Vec<PublishedVersion>, ResolutionError>;
}

/// Resolves per-project registry configuration.
#[async_trait]
pub trait RegistryConfigLoader: Send + Sync {
    /// Loads the registry mapping that applies to `scope` (a directory).
    async fn load(&self, scope: &Path) -> Result<RegistryConfig>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(s: &str, yanked: bool) -> PublishedVersion {
        PublishedVersion {
            version: s.parse().unwrap(),
            yanked,
        }
    }

    #[test]
    fn test_index_parse_sparse() {
        let index = RegistryIndex::parse(
            RegistryId::Named("internal".into()),
            "sparse+https://registry.example.com/index",
        );
        assert_eq!(index.protocol, IndexProtocol::Sparse);
        assert_eq!(index.url, "https://registry.example.com/index/");
    }

    #[test]
    fn test_index_parse_git() {
        let index = RegistryIndex::parse(
            RegistryId::Named("internal".into()),
            "https://git.example.com/index.git",
        );
        assert_eq!(index.protocol, IndexProtocol::Git);
        assert_eq!(index.canonical(), "https://git.example.com/index");
    }

    #[test]
    fn test_crates_io_spellings_are_equivalent() {
        assert_eq!(
            RegistryIndex::crates_io().canonical(),
            canonical_index_url(CRATES_IO_GIT_INDEX)
        );
    }

    #[test]
    fn test_config_resolution() {
        let mut config = RegistryConfig::new();
        config.insert_if_absent("internal", "sparse+https://near.example.com/");
        config.insert_if_absent("internal", "sparse+https://far.example.com/");
        assert_eq!(config.len(), 1);

        let index = config
            .index_for(&RegistryId::Named("internal".into()))
            .unwrap();
        assert_eq!(index.url, "https://near.example.com/");

        let missing = config.index_for(&RegistryId::Named("other".into()));
        assert!(matches!(
            missing,
            Err(ResolutionError::RegistryNotConfigured { .. })
        ));

        assert_eq!(
            config.index_for(&RegistryId::CratesIo).unwrap(),
            RegistryIndex::crates_io()
        );
    }

    #[test]
    fn test_find_latest_skips_yanked() {
        let versions = vec![
            published("1.0.0", false),
            published("1.2.0", false),
            published("1.3.0", true),
            published("2.0.0-beta.1", false),
        ];
        assert_eq!(find_latest(&versions).unwrap().to_string(), "2.0.0-beta.1");
        assert_eq!(find_latest_stable(&versions).unwrap().to_string(), "1.2.0");
    }

    #[test]
    fn test_find_latest_stable_without_releases() {
        let versions = vec![published("0.1.0-alpha", false), published("0.1.0", true)];
        assert!(find_latest_stable(&versions).is_none());
        assert_eq!(find_latest(&versions).unwrap().to_string(), "0.1.0-alpha");
    }
}
