//! Dependency staleness engine for Cargo manifests.
//!
//! An [`Engine`] runs validation passes over a long-lived [`Session`]: it
//! parses a manifest, resolves published versions for every registry
//! dependency, reconciles them with `Cargo.lock`, and publishes a verdict per
//! dependency to a [`ResultSink`]. Advisories from `cargo audit` are merged
//! afterwards by a background task.

pub mod advisory;
pub mod config;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod resolver;
pub mod session;
mod test_utils;

pub use config::LensConfig;
pub use engine::{Engine, PassOutcome, ResultSink, ValidationPass, ValidationReport};
pub use error::{AppError, Cancelled, Result};
pub use session::Session;
