//! Cargo.lock reader.
//!
//! Reads every `[[package]]` entry into [`LockedPackages`]. A lockfile that is
//! not valid TOML, or whose `package` key is not an array of tables, is
//! rejected as a whole; entries with a missing or unparseable version are
//! skipped individually.
//!
//! # Examples
//!
//! ```
//! use lens_cargo::lockfile::parse_lock_content;
//!
//! let lock = r#"
//! version = 3
//!
//! [[package]]
//! name = "serde"
//! version = "1.0.195"
//! source = "registry+https://github.com/rust-lang/crates.io-index"
//! "#;
//!
//! let packages = parse_lock_content(lock, "Cargo.lock").unwrap();
//! assert_eq!(packages.get("serde")[0].version.to_string(), "1.0.195");
//! ```

use crate::error::{CargoError, Result};
use async_trait::async_trait;
use lens_core::{LockedPackages, LockedVersion, LockfileError, LockfileProvider, ResolvedVersion};
use std::path::Path;
use toml_edit::DocumentMut;

pub const CARGO_LOCK: &str = "Cargo.lock";

/// [`LockfileProvider`] for `Cargo.lock`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CargoLockParser;

#[async_trait]
impl LockfileProvider for CargoLockParser {
    fn lockfile_name(&self) -> &'static str {
        CARGO_LOCK
    }

    async fn parse_lockfile(
        &self,
        lockfile_path: &Path,
    ) -> std::result::Result<LockedPackages, LockfileError> {
        let path = lockfile_path.display().to_string();
        let content = tokio::fs::read_to_string(lockfile_path)
            .await
            .map_err(|source| LockfileError::Read {
                path: path.clone(),
                source,
            })?;

        let packages = parse_lock_content(&content, &path).map_err(|err| match err {
            CargoError::InvalidLockfile { path, message } => {
                LockfileError::Malformed { path, message }
            }
            other => LockfileError::Malformed {
                path: path.clone(),
                message: other.to_string(),
            },
        })?;

        tracing::debug!("parsed {}: {} packages", path, packages.len());
        Ok(packages)
    }
}

/// Parses Cargo.lock text. `path` is only used in error messages.
pub fn parse_lock_content(content: &str, path: &str) -> Result<LockedPackages> {
    let doc: DocumentMut = content
        .parse()
        .map_err(|e: toml_edit::TomlError| CargoError::invalid_lockfile(path, e.to_string()))?;

    let mut packages = LockedPackages::new();

    let Some(item) = doc.get("package") else {
        return Ok(packages);
    };
    let entries = item
        .as_array_of_tables()
        .ok_or_else(|| CargoError::invalid_lockfile(path, "`package` is not an array of tables"))?;

    for table in entries {
        let Some(name) = table.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(version) = table
            .get("version")
            .and_then(|v| v.as_str())
            .and_then(|v| ResolvedVersion::parse(v).ok())
        else {
            tracing::debug!("skipping locked package '{}' without a usable version", name);
            continue;
        };

        packages.insert(LockedVersion {
            name: name.to_string(),
            version,
            source: table
                .get("source")
                .and_then(|v| v.as_str())
                .map(String::from),
        });
    }

    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::VersionRequirement;
    use lens_core::registry::CRATES_IO_INDEX;

    const SAMPLE: &str = r#"# This file is automatically @generated by Cargo.
version = 4

[[package]]
name = "demo"
version = "0.1.0"
dependencies = ["serde", "syn 1.0.109", "syn 2.0.48"]

[[package]]
name = "serde"
version = "1.0.195"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "63261df402c67811e9ac6def069e4786148c4563f4b50fd4bf30aa370d626b02"

[[package]]
name = "syn"
version = "1.0.109"
source = "registry+https://github.com/rust-lang/crates.io-index"

[[package]]
name = "syn"
version = "2.0.48"
source = "sparse+https://index.crates.io/"

[[package]]
name = "internal"
version = "3.1.0"
source = "sparse+https://registry.example.com/index/"

[[package]]
name = "forked"
version = "0.2.0"
source = "git+https://github.com/example/forked?tag=v0.2.0#0123abcd"
"#;

    #[test]
    fn test_parse_all_packages() {
        let packages = parse_lock_content(SAMPLE, "Cargo.lock").unwrap();
        assert_eq!(packages.len(), 6);
        assert_eq!(packages.get("syn").len(), 2);
        assert!(packages.get("demo")[0].source.is_none());
    }

    #[test]
    fn test_select_by_registry() {
        let packages = parse_lock_content(SAMPLE, "Cargo.lock").unwrap();
        let req = VersionRequirement::parse("2").unwrap();
        assert_eq!(
            packages
                .select("syn", CRATES_IO_INDEX, Some(&req))
                .unwrap()
                .to_string(),
            "2.0.48"
        );
        assert_eq!(
            packages
                .select("internal", "sparse+https://registry.example.com/index", None)
                .unwrap()
                .to_string(),
            "3.1.0"
        );
        assert!(packages.select("internal", CRATES_IO_INDEX, None).is_none());
        assert!(packages.select("forked", CRATES_IO_INDEX, None).is_none());
    }

    #[test]
    fn test_skips_unusable_entries() {
        let lock = r#"
[[package]]
name = "no-version"

[[package]]
name = "bad-version"
version = "one"

[[package]]
version = "1.0.0"

[[package]]
name = "ok"
version = "1.0.0"
"#;
        let packages = parse_lock_content(lock, "Cargo.lock").unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages.get("ok").len(), 1);
    }

    #[test]
    fn test_invalid_toml_is_malformed() {
        let err = parse_lock_content("[[package]\nname = ", "Cargo.lock").unwrap_err();
        assert!(matches!(err, CargoError::InvalidLockfile { .. }));
    }

    #[test]
    fn test_wrong_package_shape_is_malformed() {
        let err = parse_lock_content("package = \"serde\"\n", "Cargo.lock").unwrap_err();
        assert!(err.to_string().contains("array of tables"));
    }

    #[test]
    fn test_no_packages() {
        let packages = parse_lock_content("version = 3\n", "Cargo.lock").unwrap();
        assert!(packages.is_empty());
    }

    #[tokio::test]
    async fn test_provider_reads_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(CARGO_LOCK);
        std::fs::write(&path, SAMPLE).unwrap();

        let packages = CargoLockParser.parse_lockfile(&path).await.unwrap();
        assert_eq!(packages.get("serde").len(), 1);
    }

    #[tokio::test]
    async fn test_provider_reports_malformed_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(CARGO_LOCK);
        std::fs::write(&path, "not = [valid").unwrap();

        let err = CargoLockParser.parse_lockfile(&path).await.unwrap_err();
        assert!(matches!(err, LockfileError::Malformed { .. }));
    }

    #[test]
    fn test_locate_lockfile_from_member() {
        let temp = tempfile::tempdir().unwrap();
        let member = temp.path().join("crates/member");
        std::fs::create_dir_all(&member).unwrap();
        std::fs::write(temp.path().join(CARGO_LOCK), SAMPLE).unwrap();

        let found = CargoLockParser.locate_lockfile(&member.join("Cargo.toml"));
        assert_eq!(found, Some(temp.path().join(CARGO_LOCK)));
    }
}
