//! Cargo support for crate-lens.
//!
//! Implements the lens-core collaborator traits for Cargo projects:
//!
//! - [`parse_manifest`] reads `Cargo.toml` into typed dependencies with line anchors
//! - [`CargoLockParser`] reads `Cargo.lock`
//! - [`SparseIndexClient`] fetches published versions over the sparse index protocol
//! - [`CargoConfigLoader`] resolves alternate registries from `.cargo/config.toml`
//! - [`CargoAudit`] runs `cargo audit` for security advisories

pub mod audit;
pub mod error;
pub mod lockfile;
pub mod parser;
pub mod registry;
pub mod registry_config;

pub use audit::{CargoAudit, parse_audit_report};
pub use error::{CargoError, Result};
pub use lockfile::{CARGO_LOCK, CargoLockParser};
pub use parser::{ParsedManifest, parse_manifest};
pub use registry::{SparseIndexClient, crate_url, sparse_index_path};
pub use registry_config::CargoConfigLoader;
