use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Core error types for crate-lens.
///
/// Covers the failure families of a validation pass. Only [`LensError::ManifestParse`]
/// aborts a whole pass; every other variant is scoped to a single dependency,
/// a lockfile, or the advisory enrichment and is downgraded by its caller.
///
/// # Examples
///
/// ```
/// use lens_core::error::{LensError, Result};
///
/// fn check(text: &str) -> Result<()> {
///     if text.trim().is_empty() {
///         return Err(LensError::InvalidRequirement {
///             requirement: text.into(),
///             message: "empty requirement".into(),
///         });
///     }
///     Ok(())
/// }
///
/// assert!(check("").is_err());
/// ```
#[derive(Error, Debug)]
pub enum LensError {
    #[error("failed to parse {file}: {message}")]
    ManifestParse { file: String, message: String },

    #[error("invalid version requirement '{requirement}': {message}")]
    InvalidRequirement {
        requirement: String,
        message: String,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    #[error(transparent)]
    Advisory(#[from] AdvisoryError),

    #[error("registry configuration error: {0}")]
    RegistryConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, LensError>`.
pub type Result<T> = std::result::Result<T, LensError>;

/// Failure to resolve the published versions of one crate.
///
/// `Clone` because a single in-flight fetch is shared between every caller
/// awaiting the same `(name, registry)` key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("registry request failed for '{package}': {message}")]
    Transport { package: String, message: String },

    #[error("crate '{package}' not found in registry '{registry}'")]
    NotFound { package: String, registry: String },

    #[error("no usable versions published for '{package}'")]
    NoVersions { package: String },

    #[error("registry '{registry}' is not configured")]
    RegistryNotConfigured { registry: String },

    #[error("registry '{registry}' uses an unsupported index: {index}")]
    UnsupportedIndex { registry: String, index: String },
}

impl ResolutionError {
    /// Classification used when this failure is attached to a dependency result.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::RegistryUnreachable,
            Self::NotFound { .. } => ErrorKind::CrateNotFound,
            Self::NoVersions { .. } => ErrorKind::NoVersions,
            Self::RegistryNotConfigured { .. } => ErrorKind::RegistryNotConfigured,
            Self::UnsupportedIndex { .. } => ErrorKind::UnsupportedIndex,
        }
    }
}

/// A lockfile could not be read or parsed.
///
/// Never propagated out of a pass: callers treat the lockfile as absent.
#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("failed to read lockfile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed lockfile {path}: {message}")]
    Malformed { path: String, message: String },
}

/// The advisory tool ran but did not produce a usable report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvisoryError {
    #[error("failed to run advisory tool: {0}")]
    Exec(String),

    #[error("advisory tool exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("unreadable advisory report: {0}")]
    Report(String),
}

/// Stable classification of a per-dependency failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    RequirementUnparseable,
    RequirementMissing,
    EntryMalformed,
    UnclassifiableRequirement,
    RegistryUnreachable,
    CrateNotFound,
    NoVersions,
    RegistryNotConfigured,
    UnsupportedIndex,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequirementUnparseable => "requirement-unparseable",
            Self::RequirementMissing => "requirement-missing",
            Self::EntryMalformed => "entry-malformed",
            Self::UnclassifiableRequirement => "unclassifiable-requirement",
            Self::RegistryUnreachable => "registry-unreachable",
            Self::CrateNotFound => "crate-not-found",
            Self::NoVersions => "no-versions",
            Self::RegistryNotConfigured => "registry-not-configured",
            Self::UnsupportedIndex => "unsupported-index",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a single dependency's validation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&ResolutionError> for ErrorDetail {
    fn from(err: &ResolutionError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
