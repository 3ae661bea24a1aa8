//! Security advisory data model.

use crate::error::AdvisoryError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// How serious an advisory is.
///
/// Ordered so that vulnerabilities sort ahead of informational warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvisorySeverity {
    Vulnerability,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub id: String,
    pub severity: AdvisorySeverity,
    pub title: String,
    pub url: Option<String>,
    /// Affected version found in the lockfile, when reported.
    pub version: Option<String>,
}

/// Crate name → advisories, most severe first.
///
/// A missing key means no known advisories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AdvisoryMap {
    entries: BTreeMap<String, Vec<Advisory>>,
}

impl AdvisoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an advisory, skipping duplicates of an id already recorded for the crate.
    pub fn insert(&mut self, crate_name: impl Into<String>, advisory: Advisory) {
        let list = self.entries.entry(crate_name.into()).or_default();
        if list.iter().any(|existing| existing.id == advisory.id) {
            return;
        }
        list.push(advisory);
        list.sort_by_key(|a| a.severity);
    }

    pub fn get(&self, crate_name: &str) -> &[Advisory] {
        self.entries
            .get(crate_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, crate_name: &str) -> bool {
        self.entries.contains_key(crate_name)
    }

    /// Number of crates with at least one advisory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Advisory])> {
        self.entries
            .iter()
            .map(|(name, list)| (name.as_str(), list.as_slice()))
    }
}

/// Result of one advisory check.
///
/// `available == false` means the tool is not installed, which is not an
/// error. A tool that ran but failed sets `error` and leaves the map empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvisoryCheck {
    pub available: bool,
    pub advisories: AdvisoryMap,
    pub error: Option<String>,
}

impl AdvisoryCheck {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn completed(advisories: AdvisoryMap) -> Self {
        Self {
            available: true,
            advisories,
            error: None,
        }
    }

    pub fn failed(error: &AdvisoryError) -> Self {
        Self {
            available: true,
            advisories: AdvisoryMap::new(),
            error: Some(error.to_string()),
        }
    }
}

/// External advisory tool.
///
/// Dropping the future returned by [`AdvisoryTool::audit`] must stop the
/// underlying work; callers rely on that for cancellation.
#[async_trait]
pub trait AdvisoryTool: Send + Sync {
    /// Probes whether the tool can be run at all.
    async fn is_installed(&self) -> bool;

    /// Audits the project owning `manifest_path`.
    async fn audit(&self, manifest_path: &Path) -> Result<AdvisoryMap, AdvisoryError>;
}
