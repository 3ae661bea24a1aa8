//! Lockfile abstractions.
//!
//! A lockfile pins the exact versions a build resolved. It is an optional
//! input: every failure to find or read one degrades to "no lockfile".

use crate::error::LockfileError;
use crate::registry::canonical_index_url;
use crate::requirement::VersionRequirement;
use crate::version::ResolvedVersion;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// One resolved package instance from a lockfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedVersion {
    pub name: String,
    pub version: ResolvedVersion,
    /// Raw `source` string; `None` for workspace members and path packages.
    pub source: Option<String>,
}

impl LockedVersion {
    /// Canonical index of a `registry+`/`sparse+` source, if any.
    pub fn registry_index(&self) -> Option<String> {
        let source = self.source.as_deref()?;
        (source.starts_with("registry+") || source.starts_with("sparse+"))
            .then(|| canonical_index_url(source))
    }
}

/// Every locked package instance, grouped by name.
///
/// A name can appear several times when the graph resolves more than one
/// semver-incompatible version of a crate.
///
/// # Examples
///
/// ```
/// use lens_core::lockfile::{LockedPackages, LockedVersion};
///
/// let mut packages = LockedPackages::new();
/// packages.insert(LockedVersion {
///     name: "syn".into(),
///     version: "1.0.109".parse().unwrap(),
///     source: Some("registry+https://github.com/rust-lang/crates.io-index".into()),
/// });
/// packages.insert(LockedVersion {
///     name: "syn".into(),
///     version: "2.0.48".parse().unwrap(),
///     source: Some("registry+https://github.com/rust-lang/crates.io-index".into()),
/// });
///
/// assert_eq!(packages.get("syn").len(), 2);
/// assert_eq!(packages.len(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct LockedPackages {
    packages: HashMap<String, Vec<LockedVersion>>,
}

impl LockedPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: LockedVersion) {
        self.packages
            .entry(package.name.clone())
            .or_default()
            .push(package);
    }

    /// All locked instances of `name`, in no particular order.
    pub fn get(&self, name: &str) -> &[LockedVersion] {
        self.packages.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Picks the locked version that belongs to a registry dependency.
    ///
    /// Only entries whose source normalises to `index` are candidates. Among
    /// them the highest version satisfying `requirement` wins, falling back to
    /// the highest candidate.
    pub fn select(
        &self,
        name: &str,
        index: &str,
        requirement: Option<&VersionRequirement>,
    ) -> Option<&ResolvedVersion> {
        let index = canonical_index_url(index);
        let candidates: Vec<&ResolvedVersion> = self
            .get(name)
            .iter()
            .filter(|locked| locked.registry_index().as_deref() == Some(index.as_str()))
            .map(|locked| &locked.version)
            .collect();

        requirement
            .and_then(|req| candidates.iter().copied().filter(|v| req.test(v)).max())
            .or_else(|| candidates.iter().copied().max())
    }

    /// Total number of locked package instances.
    pub fn len(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockedVersion> {
        self.packages.values().flatten()
    }
}

/// Walks up from the manifest's directory looking for `file_name`.
///
/// A relative `manifest_path` is resolved against the current directory
/// first. Returns the nearest match, or `None` after reaching the filesystem
/// root.
pub fn find_lockfile(manifest_path: &Path, file_name: &str) -> Option<PathBuf> {
    let manifest_path =
        std::path::absolute(manifest_path).unwrap_or_else(|_| manifest_path.to_path_buf());
    let start = manifest_path.parent()?;
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Ecosystem-specific lockfile format.
#[async_trait]
pub trait LockfileProvider: Send + Sync {
    /// File name searched for, e.g. `Cargo.lock`.
    fn lockfile_name(&self) -> &'static str;

    fn locate_lockfile(&self, manifest_path: &Path) -> Option<PathBuf> {
        find_lockfile(manifest_path, self.lockfile_name())
    }

    async fn parse_lockfile(&self, lockfile_path: &Path) -> Result<LockedPackages, LockfileError>;
}

struct CachedLockfile {
    packages: Arc<LockedPackages>,
    modified_at: SystemTime,
}

/// Parsed lockfiles keyed by path, re-parsed when the file's mtime advances.
#[derive(Default)]
pub struct LockfileCache {
    entries: DashMap<PathBuf, CachedLockfile>,
}

impl LockfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_parse(
        &self,
        provider: &dyn LockfileProvider,
        lockfile_path: &Path,
    ) -> Result<Arc<LockedPackages>, LockfileError> {
        let read_error = |source| LockfileError::Read {
            path: lockfile_path.display().to_string(),
            source,
        };

        let modified_at = tokio::fs::metadata(lockfile_path)
            .await
            .and_then(|metadata| metadata.modified())
            .map_err(read_error)?;

        if let Some(cached) = self.entries.get(lockfile_path)
            && modified_at <= cached.modified_at
        {
            tracing::debug!("lockfile cache hit: {}", lockfile_path.display());
            return Ok(Arc::clone(&cached.packages));
        }

        tracing::debug!("lockfile cache miss: {}", lockfile_path.display());
        let packages = Arc::new(provider.parse_lockfile(lockfile_path).await?);
        self.entries.insert(
            lockfile_path.to_path_buf(),
            CachedLockfile {
                packages: Arc::clone(&packages),
                modified_at,
            },
        );
        Ok(packages)
    }

    pub fn invalidate(&self, lockfile_path: &Path) {
        self.entries.remove(lockfile_path);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
