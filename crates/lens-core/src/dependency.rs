//! Dependency declarations and their validation results.

use crate::error::{ErrorDetail, ErrorKind};
use crate::requirement::VersionRequirement;
use crate::status::{Status, compute_status};
use crate::version::ResolvedVersion;
use serde::{Serialize, Serializer};
use std::fmt;

/// Name of the implicit default registry.
pub const CRATES_IO: &str = "crates-io";

/// Identifier of the registry a dependency is published to.
///
/// Alternate registries are opaque names resolved through external
/// registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryId {
    CratesIo,
    Named(String),
}

impl RegistryId {
    /// Maps a `registry = "..."` value to an id; `crates-io` is the default.
    pub fn from_name(name: &str) -> Self {
        if name == CRATES_IO {
            Self::CratesIo
        } else {
            Self::Named(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CratesIo => CRATES_IO,
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RegistryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Git pin recorded for a git dependency. Not interpreted further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitReference {
    Rev(String),
    Branch(String),
    Tag(String),
}

/// Where a dependency comes from, decided once at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DependencySource {
    Registry {
        registry: RegistryId,
    },
    Git {
        url: String,
        reference: Option<GitReference>,
    },
    Path {
        path: String,
    },
    Workspace,
}

/// Manifest section a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencySection {
    Dependencies,
    DevDependencies,
    BuildDependencies,
    WorkspaceDependencies,
}

/// The version requirement of a declaration, or why there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementSpec {
    Parsed(VersionRequirement),
    Unparseable { raw: String, message: String },
    Missing,
    /// The entry has no recognised dependency shape at all.
    Malformed { message: String },
}

impl RequirementSpec {
    pub fn from_raw(raw: &str) -> Self {
        match VersionRequirement::parse(raw) {
            Ok(req) => Self::Parsed(req),
            Err(err) => Self::Unparseable {
                raw: raw.to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn parsed(&self) -> Option<&VersionRequirement> {
        match self {
            Self::Parsed(req) => Some(req),
            _ => None,
        }
    }

    /// The declaration text, when there was one.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Parsed(req) => Some(req.as_str()),
            Self::Unparseable { raw, .. } => Some(raw),
            Self::Missing | Self::Malformed { .. } => None,
        }
    }

    /// Error to report for a requirement that cannot be classified.
    pub fn error(&self) -> Option<ErrorDetail> {
        match self {
            Self::Parsed(_) => None,
            Self::Unparseable { message, .. } => Some(ErrorDetail::new(
                ErrorKind::RequirementUnparseable,
                message.clone(),
            )),
            Self::Missing => Some(ErrorDetail::new(
                ErrorKind::RequirementMissing,
                "no version requirement declared",
            )),
            Self::Malformed { message } => {
                Some(ErrorDetail::new(ErrorKind::EntryMalformed, message.clone()))
            }
        }
    }
}

/// A typed dependency declaration.
///
/// `line` is the zero-based source line of the declaration's key and is the
/// join key consumers use to anchor per-dependency feedback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    pub name: String,
    /// Real crate name when the dependency is renamed with `package = "..."`.
    pub package: Option<String>,
    pub requirement: RequirementSpec,
    pub line: u32,
    pub source: DependencySource,
    pub section: DependencySection,
    /// `cfg(...)` or target triple for `[target.*]` sections.
    pub target: Option<String>,
}

impl Dependency {
    /// Name to look up in the registry.
    pub fn crate_name(&self) -> &str {
        self.package.as_deref().unwrap_or(&self.name)
    }

    pub fn registry(&self) -> Option<&RegistryId> {
        match &self.source {
            DependencySource::Registry { registry } => Some(registry),
            _ => None,
        }
    }

    /// Only registry dependencies are eligible for update suggestions or advisories.
    pub fn is_registry(&self) -> bool {
        self.registry().is_some()
    }
}

/// Outcome of validating one dependency.
///
/// `status == Status::Error` exactly when `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyValidationResult {
    pub dependency: Dependency,
    pub status: Status,
    pub latest: Option<ResolvedVersion>,
    pub latest_stable: Option<ResolvedVersion>,
    pub locked: Option<ResolvedVersion>,
    pub error: Option<ErrorDetail>,
}

impl DependencyValidationResult {
    pub fn failed(
        dependency: Dependency,
        error: ErrorDetail,
        locked: Option<ResolvedVersion>,
    ) -> Self {
        Self {
            dependency,
            status: Status::Error,
            latest: None,
            latest_stable: None,
            locked,
            error: Some(error),
        }
    }

    /// Classifies a dependency whose requirement parsed and whose versions resolved.
    pub fn evaluate(
        dependency: Dependency,
        requirement: &VersionRequirement,
        latest_stable: Option<ResolvedVersion>,
        latest: Option<ResolvedVersion>,
        locked: Option<ResolvedVersion>,
    ) -> Self {
        let status = compute_status(requirement, latest_stable.as_ref(), latest.as_ref());
        let error = (status == Status::Error).then(|| {
            if latest_stable.is_none() && latest.is_none() {
                ErrorDetail::new(ErrorKind::NoVersions, "no versions resolved from the registry")
            } else {
                ErrorDetail::new(
                    ErrorKind::UnclassifiableRequirement,
                    format!("requirement '{}' has no lower bound", requirement),
                )
            }
        });

        Self {
            dependency,
            status,
            latest,
            latest_stable,
            locked,
            error,
        }
    }

    /// The version a presentation layer should offer as the update target.
    pub fn suggested_update(&self) -> Option<&ResolvedVersion> {
        if !self.status.is_outdated() {
            return None;
        }
        self.latest_stable.as_ref().or(self.latest.as_ref())
    }
}
