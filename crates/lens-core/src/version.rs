//! Concrete semantic versions.
//!
//! [`ResolvedVersion`] wraps [`semver::Version`] with semver precedence
//! ordering: build metadata never participates in comparison, and a
//! prerelease sorts below the release it precedes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A single valid semantic version (`major.minor.patch[-pre][+build]`).
///
/// # Examples
///
/// ```
/// use lens_core::ResolvedVersion;
///
/// let beta: ResolvedVersion = "2.0.0-beta.1".parse().unwrap();
/// let release: ResolvedVersion = "2.0.0".parse().unwrap();
/// let tagged: ResolvedVersion = "2.0.0+build.7".parse().unwrap();
///
/// assert!(beta < release);
/// assert_eq!(release, tagged);
/// assert!(beta.is_prerelease());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedVersion(semver::Version);

impl ResolvedVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parses a full `major.minor.patch` version, ignoring surrounding whitespace.
    pub fn parse(text: &str) -> Result<Self, semver::Error> {
        semver::Version::parse(text.trim()).map(Self)
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The `(major, minor, patch)` triple with prerelease and build stripped.
    pub fn release(&self) -> (u64, u64, u64) {
        (self.0.major, self.0.minor, self.0.patch)
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl From<semver::Version> for ResolvedVersion {
    fn from(version: semver::Version) -> Self {
        Self(version)
    }
}

impl FromStr for ResolvedVersion {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq for ResolvedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ResolvedVersion {}

impl PartialOrd for ResolvedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResolvedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_precedence(&other.0)
    }
}

impl Hash for ResolvedVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.major.hash(state);
        self.0.minor.hash(state);
        self.0.patch.hash(state);
        self.0.pre.as_str().hash(state);
    }
}
