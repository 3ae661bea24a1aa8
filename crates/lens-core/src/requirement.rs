//! Version requirement parsing.
//!
//! Requirement strings follow Cargo's rules: a bare version means caret,
//! comparators separated by commas form a conjunction, and partial versions
//! or wildcards widen to the range implied by their precision.
//!
//! Matching is delegated to [`semver::VersionReq`]. On top of that, every
//! comparator is lowered to an interval so the conjunction can be checked for
//! satisfiability at parse time and so the requirement's syntactic floor
//! ([`VersionRequirement::min_satisfying`]) is available without a registry.

use crate::error::{LensError, Result};
use crate::version::ResolvedVersion;
use semver::{BuildMetadata, Comparator, Op, Prerelease, Version, VersionReq};
use serde::{Serialize, Serializer};
use std::fmt;

/// One end of the interval described by a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: ResolvedVersion,
    pub inclusive: bool,
}

impl Bound {
    fn inclusive(version: ResolvedVersion) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: ResolvedVersion) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A parsed, satisfiable comparator set.
///
/// # Examples
///
/// ```
/// use lens_core::{ResolvedVersion, VersionRequirement};
///
/// let req = VersionRequirement::parse("^1.2.3").unwrap();
/// assert!(req.test(&"1.9.0".parse().unwrap()));
/// assert!(!req.test(&"2.0.0".parse().unwrap()));
/// assert_eq!(req.min_satisfying(), Some(ResolvedVersion::new(1, 2, 3)));
///
/// let upper_only = VersionRequirement::parse("<2.0.0").unwrap();
/// assert_eq!(upper_only.min_satisfying(), None);
/// ```
#[derive(Debug, Clone)]
pub struct VersionRequirement {
    raw: String,
    req: VersionReq,
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRequirement {
    /// Parses a requirement string into a comparator conjunction.
    ///
    /// Fails on syntax errors and on conjunctions no version can satisfy,
    /// such as `>=2.0.0, <1.0.0`.
    pub fn parse(text: &str) -> Result<Self> {
        let raw = text.trim();
        let req = VersionReq::parse(raw).map_err(|e| invalid(raw, e.to_string()))?;

        let mut lower: Option<Bound> = None;
        let mut upper: Option<Bound> = None;
        for comparator in &req.comparators {
            let (lo, hi) = comparator_bounds(comparator).map_err(|message| invalid(raw, message))?;
            if let Some(lo) = lo {
                lower = Some(match lower {
                    Some(current) => tighter_lower(current, lo),
                    None => lo,
                });
            }
            if let Some(hi) = hi {
                upper = Some(match upper {
                    Some(current) => tighter_upper(current, hi),
                    None => hi,
                });
            }
        }

        let requirement = Self {
            raw: raw.to_string(),
            req,
            lower,
            upper,
        };

        if !requirement.is_satisfiable() {
            return Err(invalid(raw, "no version can satisfy every comparator".into()));
        }

        Ok(requirement)
    }

    /// Returns `true` if `version` satisfies every comparator.
    pub fn test(&self, version: &ResolvedVersion) -> bool {
        self.req.matches(version.as_semver())
    }

    /// Lowest version literally expressed by the requirement's lower bound.
    ///
    /// Computed from syntax alone. `None` when the requirement only has an
    /// upper bound. A bare `*` has the floor `0.0.0`.
    pub fn min_satisfying(&self) -> Option<ResolvedVersion> {
        match &self.lower {
            Some(bound) => Some(floor_of(bound)),
            None if self.req.comparators.is_empty() => Some(ResolvedVersion::new(0, 0, 0)),
            None => None,
        }
    }

    pub fn comparators(&self) -> &[Comparator] {
        &self.req.comparators
    }

    pub fn lower_bound(&self) -> Option<&Bound> {
        self.lower.as_ref()
    }

    pub fn upper_bound(&self) -> Option<&Bound> {
        self.upper.as_ref()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn is_satisfiable(&self) -> bool {
        let candidate = self
            .lower
            .as_ref()
            .map_or_else(|| ResolvedVersion::new(0, 0, 0), floor_of);

        match &self.upper {
            Some(upper) if upper.inclusive => candidate <= upper.version,
            Some(upper) => candidate < upper.version,
            None => true,
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for VersionRequirement {
    fn eq(&self, other: &Self) -> bool {
        self.req == other.req
    }
}

impl Serialize for VersionRequirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn invalid(requirement: &str, message: String) -> LensError {
    LensError::InvalidRequirement {
        requirement: requirement.to_string(),
        message,
    }
}

fn version(major: u64, minor: u64, patch: u64, pre: &Prerelease) -> ResolvedVersion {
    Version {
        major,
        minor,
        patch,
        pre: pre.clone(),
        build: BuildMetadata::EMPTY,
    }
    .into()
}

fn release(major: u64, minor: u64, patch: u64) -> ResolvedVersion {
    ResolvedVersion::new(major, minor, patch)
}

/// Lowers one comparator to its `(lower, upper)` interval ends.
fn comparator_bounds(
    c: &Comparator,
) -> std::result::Result<(Option<Bound>, Option<Bound>), String> {
    let major = c.major;
    let base = version(major, c.minor.unwrap_or(0), c.patch.unwrap_or(0), &c.pre);
    let next_major = || Bound::exclusive(release(major.saturating_add(1), 0, 0));
    let next_minor = |minor: u64| Bound::exclusive(release(major, minor.saturating_add(1), 0));

    let bounds = match c.op {
        Op::Exact => match (c.minor, c.patch) {
            (Some(_), Some(_)) => (Some(Bound::inclusive(base.clone())), Some(Bound::inclusive(base))),
            (Some(minor), None) => (Some(Bound::inclusive(base)), Some(next_minor(minor))),
            (None, _) => (Some(Bound::inclusive(base)), Some(next_major())),
        },
        Op::Greater => match (c.minor, c.patch) {
            (Some(_), Some(_)) => (Some(Bound::exclusive(base)), None),
            (Some(minor), None) => (
                Some(Bound::inclusive(release(major, minor.saturating_add(1), 0))),
                None,
            ),
            (None, _) => (
                Some(Bound::inclusive(release(major.saturating_add(1), 0, 0))),
                None,
            ),
        },
        Op::GreaterEq => (Some(Bound::inclusive(base)), None),
        Op::Less => (None, Some(Bound::exclusive(base))),
        Op::LessEq => match (c.minor, c.patch) {
            (Some(_), Some(_)) => (None, Some(Bound::inclusive(base))),
            (Some(minor), None) => (None, Some(next_minor(minor))),
            (None, _) => (None, Some(next_major())),
        },
        Op::Tilde => {
            let upper = match c.minor {
                Some(minor) => next_minor(minor),
                None => next_major(),
            };
            (Some(Bound::inclusive(base)), Some(upper))
        }
        Op::Caret => {
            let upper = match (major, c.minor, c.patch) {
                (0, Some(0), Some(patch)) => Bound::exclusive(release(0, 0, patch.saturating_add(1))),
                (0, Some(0), None) => Bound::exclusive(release(0, 1, 0)),
                (0, Some(minor), _) => next_minor(minor),
                _ => next_major(),
            };
            (Some(Bound::inclusive(base)), Some(upper))
        }
        Op::Wildcard => match c.minor {
            Some(minor) => (Some(Bound::inclusive(base)), Some(next_minor(minor))),
            None => (Some(Bound::inclusive(base)), Some(next_major())),
        },
        _ => return Err(format!("unsupported comparator '{}'", c)),
    };

    Ok(bounds)
}

fn tighter_lower(a: Bound, b: Bound) -> Bound {
    match a.version.cmp(&b.version) {
        std::cmp::Ordering::Greater => a,
        std::cmp::Ordering::Less => b,
        std::cmp::Ordering::Equal if !a.inclusive => a,
        std::cmp::Ordering::Equal => b,
    }
}

fn tighter_upper(a: Bound, b: Bound) -> Bound {
    match a.version.cmp(&b.version) {
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Equal if !a.inclusive => a,
        std::cmp::Ordering::Equal => b,
    }
}

/// Smallest version admitted by a lower bound.
fn floor_of(bound: &Bound) -> ResolvedVersion {
    if bound.inclusive {
        return bound.version.clone();
    }

    let v = bound.version.as_semver();
    if !v.pre.is_empty()
        && let Ok(pre) = Prerelease::new(&format!("{}.0", v.pre))
    {
        return version(v.major, v.minor, v.patch, &pre);
    }
    release(v.major, v.minor, v.patch.saturating_add(1))
}
