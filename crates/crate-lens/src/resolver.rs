//! Pass stages: registry configuration, lockfile, and per-dependency resolution.
//!
//! Every stage checks its token on entry and returns [`Cancelled`] without
//! touching any cache when the pass has already been superseded.

use crate::error::Cancelled;
use crate::session::Session;
use lens_core::cache::FetchResult;
use lens_core::{
    CancellationToken, Dependency, DependencyValidationResult, ErrorDetail, LockedPackages,
    RegistryConfig, RegistryId, VersionKey, find_latest, find_latest_stable,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn check(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    Ok(())
}

/// Absolute directory of the manifest, used as the registry-config cache key.
fn scope_of(manifest_path: &Path) -> PathBuf {
    let manifest_path =
        std::path::absolute(manifest_path).unwrap_or_else(|_| manifest_path.to_path_buf());
    manifest_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Loads the registry configuration that applies to a manifest, cached per directory.
///
/// A configuration that cannot be read is logged and replaced by an empty
/// one for this pass only; alternate registries then resolve as
/// `registry-not-configured`.
pub async fn load_registry_config(
    session: &Session,
    manifest_path: &Path,
    token: &CancellationToken,
) -> Result<Arc<RegistryConfig>, Cancelled> {
    check(token)?;

    let scope = scope_of(manifest_path);
    if let Some(config) = session.registry_configs.get(&scope) {
        return Ok(config);
    }

    let loaded = tokio::select! {
        () = token.cancelled() => return Err(Cancelled),
        loaded = session.config_loader.load(&scope) => loaded,
    };

    match loaded {
        Ok(config) => Ok(session.registry_configs.set(scope, config)),
        Err(e) => {
            tracing::warn!("failed to load registry config for {}: {}", scope.display(), e);
            Ok(Arc::new(RegistryConfig::new()))
        }
    }
}

/// Finds and parses the nearest lockfile. Any failure is treated as no lockfile.
pub async fn load_lockfile(
    session: &Session,
    manifest_path: &Path,
    token: &CancellationToken,
) -> Result<Option<Arc<LockedPackages>>, Cancelled> {
    check(token)?;

    let Some(lockfile_path) = session.lockfile_provider.locate_lockfile(manifest_path) else {
        tracing::debug!("no lockfile found for {}", manifest_path.display());
        return Ok(None);
    };

    let parsed = tokio::select! {
        () = token.cancelled() => return Err(Cancelled),
        parsed = session
            .lockfiles
            .get_or_parse(session.lockfile_provider.as_ref(), &lockfile_path) => parsed,
    };

    match parsed {
        Ok(packages) => {
            tracing::debug!(
                "loaded lockfile {}: {} packages",
                lockfile_path.display(),
                packages.len()
            );
            Ok(Some(packages))
        }
        Err(e) => {
            tracing::warn!("ignoring lockfile: {}", e);
            Ok(None)
        }
    }
}

/// Resolves the published versions of one crate, sharing in-flight requests.
pub async fn resolve_versions(
    session: &Session,
    crate_name: &str,
    registry: &RegistryId,
    registry_config: &RegistryConfig,
    token: &CancellationToken,
) -> Result<FetchResult, Cancelled> {
    check(token)?;

    let index = match registry_config.index_for(registry) {
        Ok(index) => index,
        Err(e) => return Ok(Err(e)),
    };

    let source = Arc::clone(&session.source);
    let name = crate_name.to_string();
    session
        .versions
        .get_or_fetch(
            VersionKey::new(crate_name, registry.clone()),
            token,
            move || async move { source.fetch_versions(&name, &index).await },
        )
        .await
        .ok_or(Cancelled)
}

/// Classifies one dependency.
///
/// Returns `Ok(None)` for path, git and workspace dependencies, which are
/// never checked against a registry.
pub async fn validate_dependency(
    session: &Session,
    dependency: Dependency,
    registry_config: &RegistryConfig,
    lockfile: Option<&LockedPackages>,
    token: &CancellationToken,
) -> Result<Option<DependencyValidationResult>, Cancelled> {
    check(token)?;

    let Some(registry) = dependency.registry().cloned() else {
        return Ok(None);
    };

    let locked = lockfile.and_then(|packages| {
        let index = registry_config.index_for(&registry).ok()?;
        packages
            .select(
                dependency.crate_name(),
                &index.canonical(),
                dependency.requirement.parsed(),
            )
            .cloned()
    });

    if let Some(error) = dependency.requirement.error() {
        return Ok(Some(DependencyValidationResult::failed(
            dependency, error, locked,
        )));
    }
    let Some(requirement) = dependency.requirement.parsed().cloned() else {
        return Ok(None);
    };

    let resolved = resolve_versions(
        session,
        dependency.crate_name(),
        &registry,
        registry_config,
        token,
    )
    .await?;

    let result = match resolved {
        Ok(versions) => DependencyValidationResult::evaluate(
            dependency,
            &requirement,
            find_latest_stable(&versions).cloned(),
            find_latest(&versions).cloned(),
            locked,
        ),
        Err(e) => {
            tracing::debug!("resolution failed for {}: {}", dependency.name, e);
            DependencyValidationResult::failed(dependency, ErrorDetail::from(&e), locked)
        }
    };

    Ok(Some(result))
}
