//! `cargo audit` adapter.
//!
//! Runs `cargo audit --json` next to the manifest and normalises the report
//! into an [`AdvisoryMap`]. The child process is killed when the returned
//! future is dropped, so a cancelled check leaves nothing running.

use async_trait::async_trait;
use lens_core::{Advisory, AdvisoryError, AdvisoryMap, AdvisorySeverity, AdvisoryTool};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// [`AdvisoryTool`] backed by the `cargo audit` subcommand.
#[derive(Debug, Clone)]
pub struct CargoAudit {
    cargo_path: String,
}

impl CargoAudit {
    pub fn new(cargo_path: impl Into<String>) -> Self {
        Self {
            cargo_path: cargo_path.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.cargo_path);
        command
            .arg("audit")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Default for CargoAudit {
    fn default() -> Self {
        Self::new("cargo")
    }
}

#[async_trait]
impl AdvisoryTool for CargoAudit {
    async fn is_installed(&self) -> bool {
        let installed = self
            .command()
            .arg("--version")
            .output()
            .await
            .is_ok_and(|output| output.status.success());
        tracing::debug!("cargo audit installed: {}", installed);
        installed
    }

    async fn audit(&self, manifest_path: &Path) -> Result<AdvisoryMap, AdvisoryError> {
        let mut command = self.command();
        command.arg("--json");
        if let Some(dir) = manifest_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        tracing::info!("running cargo audit for {}", manifest_path.display());
        let output = command
            .output()
            .await
            .map_err(|e| AdvisoryError::Exec(e.to_string()))?;

        // Exit status 1 only means vulnerabilities were found; the report is on stdout.
        match parse_audit_report(&output.stdout) {
            Ok(map) => Ok(map),
            Err(_) if !output.status.success() => Err(AdvisoryError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(err) => Err(err),
        }
    }
}

#[derive(Deserialize)]
struct AuditReport {
    #[serde(default)]
    vulnerabilities: VulnerabilityReport,
    #[serde(default)]
    warnings: BTreeMap<String, Vec<Finding>>,
}

#[derive(Deserialize, Default)]
struct VulnerabilityReport {
    #[serde(default)]
    list: Vec<Finding>,
}

#[derive(Deserialize)]
struct Finding {
    package: FindingPackage,
    advisory: Option<FindingAdvisory>,
}

#[derive(Deserialize)]
struct FindingPackage {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct FindingAdvisory {
    id: String,
    title: String,
    url: Option<String>,
}

/// Parses `cargo audit --json` output.
pub fn parse_audit_report(stdout: &[u8]) -> Result<AdvisoryMap, AdvisoryError> {
    let report: AuditReport =
        serde_json::from_slice(stdout).map_err(|e| AdvisoryError::Report(e.to_string()))?;

    let mut map = AdvisoryMap::new();

    for finding in report.vulnerabilities.list {
        if let Some(advisory) = finding.advisory {
            map.insert(
                finding.package.name,
                Advisory {
                    id: advisory.id,
                    severity: AdvisorySeverity::Vulnerability,
                    title: advisory.title,
                    url: advisory.url,
                    version: Some(finding.package.version),
                },
            );
        }
    }

    for (kind, findings) in report.warnings {
        for finding in findings {
            let advisory = match finding.advisory {
                Some(advisory) => Advisory {
                    id: advisory.id,
                    severity: AdvisorySeverity::Warning,
                    title: advisory.title,
                    url: advisory.url,
                    version: Some(finding.package.version),
                },
                // yanked warnings carry no advisory record
                None => Advisory {
                    id: kind.clone(),
                    severity: AdvisorySeverity::Warning,
                    title: format!("{} {} is {}", finding.package.name, finding.package.version, kind),
                    url: None,
                    version: Some(finding.package.version),
                },
            };
            map.insert(finding.package.name, advisory);
        }
    }

    Ok(map)
}
