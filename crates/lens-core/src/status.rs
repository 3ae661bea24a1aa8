//! Staleness classification.

use crate::requirement::VersionRequirement;
use crate::version::ResolvedVersion;
use serde::Serialize;
use std::fmt;

/// How far a declared requirement trails the published versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Latest,
    PatchBehind,
    MinorBehind,
    MajorBehind,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::PatchBehind => "patch-behind",
            Self::MinorBehind => "minor-behind",
            Self::MajorBehind => "major-behind",
            Self::Error => "error",
        }
    }

    /// Whether a newer version should be suggested.
    pub fn is_outdated(self) -> bool {
        matches!(
            self,
            Self::PatchBehind | Self::MinorBehind | Self::MajorBehind
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies the gap between `current` and `target`.
///
/// Never reports negative staleness: a `current` at or above `target` is
/// [`Status::Latest`]. A prerelease trailing its own release is patch-level.
///
/// # Examples
///
/// ```
/// use lens_core::{Status, compare_version_diff};
///
/// let current = "1.0.0-alpha".parse().unwrap();
/// let target = "1.0.0".parse().unwrap();
/// assert_eq!(compare_version_diff(&current, &target), Status::PatchBehind);
/// ```
pub fn compare_version_diff(current: &ResolvedVersion, target: &ResolvedVersion) -> Status {
    if current >= target {
        return Status::Latest;
    }

    if current.major() != target.major() {
        Status::MajorBehind
    } else if current.minor() != target.minor() {
        Status::MinorBehind
    } else {
        Status::PatchBehind
    }
}

/// Computes the verdict for a requirement against the registry's view.
///
/// The stable release is the comparison target whenever one exists; `latest`
/// is only used for crates that have never published a stable version.
pub fn compute_status(
    requirement: &VersionRequirement,
    latest_stable: Option<&ResolvedVersion>,
    latest: Option<&ResolvedVersion>,
) -> Status {
    let Some(target) = latest_stable.or(latest) else {
        return Status::Error;
    };

    match requirement.min_satisfying() {
        Some(current) => compare_version_diff(&current, target),
        None => Status::Error,
    }
}
