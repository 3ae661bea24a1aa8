use lens_core::LensError;
use thiserror::Error;

/// Errors raised while setting up or driving validation passes.
///
/// Per-dependency failures never surface here; they are attached to the
/// dependency's own result.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Lens(#[from] LensError),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// A pass stage observed its cancellation token.
///
/// Not a failure: a cancelled stage emits nothing and leaves no side effects.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("validation pass cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::ManifestRead {
            path: "/work/Cargo.toml".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to read manifest /work/Cargo.toml"));
    }

    #[test]
    fn test_lens_error_is_transparent() {
        let err: AppError = LensError::RegistryConfig("bad index".into()).into();
        assert_eq!(err.to_string(), "registry configuration error: bad index");
    }
}
