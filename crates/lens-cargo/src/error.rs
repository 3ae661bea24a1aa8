//! Errors specific to Cargo file handling.

use lens_core::{LensError, LockfileError};
use thiserror::Error;

/// Errors raised while reading Cargo's own files.
///
/// Registry and advisory failures are reported through the core
/// [`lens_core::ResolutionError`] and [`lens_core::AdvisoryError`] types
/// instead, since they are attached to individual results.
#[derive(Error, Debug)]
pub enum CargoError {
    /// Cargo.toml is not valid TOML.
    #[error("failed to parse {file}: {source}")]
    TomlParse {
        file: String,
        #[source]
        source: toml_edit::TomlError,
    },

    /// A `.cargo/config.toml` file is not valid TOML.
    #[error("failed to parse cargo config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml_edit::TomlError,
    },

    /// Cargo.lock is readable but not a lockfile.
    #[error("invalid Cargo.lock {path}: {message}")]
    InvalidLockfile { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CargoError>;

impl CargoError {
    pub fn invalid_lockfile(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLockfile {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<CargoError> for LensError {
    fn from(err: CargoError) -> Self {
        match err {
            CargoError::TomlParse { file, source } => LensError::ManifestParse {
                file,
                message: source.to_string(),
            },
            CargoError::ConfigParse { .. } => LensError::RegistryConfig(err.to_string()),
            CargoError::InvalidLockfile { path, message } => {
                LensError::Lockfile(LockfileError::Malformed { path, message })
            }
            CargoError::Io(e) => LensError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml_error() -> toml_edit::TomlError {
        "[dependencies\nserde = 1"
            .parse::<toml_edit::DocumentMut>()
            .unwrap_err()
    }

    #[test]
    fn test_manifest_error_converts_to_file_level_error() {
        let err = CargoError::TomlParse {
            file: "/work/Cargo.toml".into(),
            source: toml_error(),
        };
        let lens: LensError = err.into();
        assert!(matches!(lens, LensError::ManifestParse { ref file, .. } if file == "/work/Cargo.toml"));
    }

    #[test]
    fn test_invalid_lockfile_converts() {
        let err = CargoError::invalid_lockfile("Cargo.lock", "missing [[package]]");
        assert_eq!(
            err.to_string(),
            "invalid Cargo.lock Cargo.lock: missing [[package]]"
        );
        let lens: LensError = err.into();
        assert!(matches!(lens, LensError::Lockfile(LockfileError::Malformed { .. })));
    }

    #[test]
    fn test_config_error_converts() {
        let err = CargoError::ConfigParse {
            path: ".cargo/config.toml".into(),
            source: toml_error(),
        };
        let lens: LensError = err.into();
        assert!(lens.to_string().starts_with("registry configuration error"));
    }
}
