//! Core engine for crate-lens.
//!
//! Ecosystem-neutral building blocks of a dependency staleness check:
//!
//! - **Versions**: [`ResolvedVersion`] and [`VersionRequirement`] with
//!   membership testing and floor extraction
//! - **Classification**: [`compare_version_diff`] and [`compute_status`]
//! - **Data model**: [`Dependency`], [`DependencyValidationResult`], [`AdvisoryMap`]
//! - **Caches**: registry versions with TTL and in-flight dedupe, lockfiles
//!   keyed by mtime, tool probes
//! - **Collaborator traits**: [`VersionSource`], [`RegistryConfigLoader`],
//!   [`LockfileProvider`], [`AdvisoryTool`]
//!
//! # Examples
//!
//! ```
//! use lens_core::{Status, VersionRequirement, compute_status};
//!
//! let requirement = VersionRequirement::parse("1.0.0").unwrap();
//! let stable = "1.2.0".parse().unwrap();
//! let latest = "2.0.0-beta".parse().unwrap();
//!
//! let status = compute_status(&requirement, Some(&stable), Some(&latest));
//! assert_eq!(status, Status::MinorBehind);
//! ```

pub mod advisory;
pub mod cache;
pub mod dependency;
pub mod error;
pub mod lockfile;
pub mod registry;
pub mod requirement;
pub mod status;
pub mod version;

pub use advisory::{Advisory, AdvisoryCheck, AdvisoryMap, AdvisorySeverity, AdvisoryTool};
pub use cache::{KeyedCache, ProbeCache, VersionCache, VersionKey};
pub use dependency::{
    Dependency, DependencySection, DependencySource, DependencyValidationResult, GitReference,
    RegistryId, RequirementSpec,
};
pub use error::{
    AdvisoryError, ErrorDetail, ErrorKind, LensError, LockfileError, ResolutionError, Result,
};
pub use lockfile::{LockedPackages, LockedVersion, LockfileCache, LockfileProvider};
pub use registry::{
    IndexProtocol, PublishedVersion, RegistryConfig, RegistryConfigLoader, RegistryIndex, VersionSource,
    find_latest, find_latest_stable,
};
pub use requirement::{Bound, VersionRequirement};
pub use status::{Status, compare_version_diff, compute_status};
pub use version::ResolvedVersion;

pub use tokio_util::sync::CancellationToken;
