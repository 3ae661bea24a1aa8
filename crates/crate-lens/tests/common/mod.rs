//! Scripted collaborators for engine integration tests.

use async_trait::async_trait;
use crate_lens::{LensConfig, ResultSink, Session, ValidationReport};
use lens_core::{
    AdvisoryCheck, AdvisoryError, AdvisoryMap, AdvisoryTool, LensError, LockedPackages,
    LockfileError, LockfileProvider, PublishedVersion, RegistryConfig, RegistryConfigLoader,
    RegistryIndex, ResolutionError, VersionSource,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Version source with per-crate answers and a fixed latency.
#[allow(dead_code)]
pub struct FakeRegistry {
    versions: Mutex<HashMap<String, Result<Vec<PublishedVersion>, ResolutionError>>>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeRegistry {
    pub fn new(latency: Duration) -> Self {
        Self {
            versions: Mutex::new(HashMap::new()),
            latency,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn publish(self, name: &str, versions: &[&str]) -> Self {
        let list = versions
            .iter()
            .map(|v| PublishedVersion::new(v.parse().unwrap()))
            .collect();
        self.versions
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(list));
        self
    }

    pub fn publish_yanked(self, name: &str, versions: &[&str]) -> Self {
        let list = versions
            .iter()
            .map(|v| PublishedVersion {
                version: v.parse().unwrap(),
                yanked: true,
            })
            .collect();
        self.versions
            .lock()
            .unwrap()
            .insert(name.to_string(), Ok(list));
        self
    }

    pub fn fail(self, name: &str, error: ResolutionError) -> Self {
        self.versions
            .lock()
            .unwrap()
            .insert(name.to_string(), Err(error));
        self
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == name)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VersionSource for FakeRegistry {
    async fn fetch_versions(
        &self,
        crate_name: &str,
        index: &RegistryIndex,
    ) -> Result<Vec<PublishedVersion>, ResolutionError> {
        self.calls.lock().unwrap().push(crate_name.to_string());
        tokio::time::sleep(self.latency).await;

        let answer = self.versions.lock().unwrap().get(crate_name).cloned();
        answer.unwrap_or_else(|| {
            Err(ResolutionError::NotFound {
                package: crate_name.to_string(),
                registry: index.registry.to_string(),
            })
        })
    }
}

/// Registry config loader with a fixed mapping.
#[derive(Default)]
#[allow(dead_code)]
pub struct StaticRegistries(pub Vec<(String, String)>);

#[async_trait]
impl RegistryConfigLoader for StaticRegistries {
    async fn load(&self, _scope: &Path) -> lens_core::Result<RegistryConfig> {
        let mut config = RegistryConfig::new();
        for (name, index) in &self.0 {
            config.insert_if_absent(name.clone(), index.clone());
        }
        Ok(config)
    }
}

/// Lockfile provider that never finds a lockfile.
pub struct NoLockfile;

#[async_trait]
impl LockfileProvider for NoLockfile {
    fn lockfile_name(&self) -> &'static str {
        "crate-lens-integration-no-such.lock"
    }

    async fn parse_lockfile(&self, path: &Path) -> Result<LockedPackages, LockfileError> {
        Err(LockfileError::Malformed {
            path: path.display().to_string(),
            message: "no lockfile expected".into(),
        })
    }
}

/// Advisory tool with a scripted report and latency.
#[allow(dead_code)]
pub struct FakeAudit {
    installed: bool,
    report: Result<AdvisoryMap, AdvisoryError>,
    latency: Duration,
    pub audits: AtomicUsize,
}

#[allow(dead_code)]
impl FakeAudit {
    pub fn missing() -> Self {
        Self::new(false, Ok(AdvisoryMap::new()), Duration::ZERO)
    }

    pub fn new(
        installed: bool,
        report: Result<AdvisoryMap, AdvisoryError>,
        latency: Duration,
    ) -> Self {
        Self {
            installed,
            report,
            latency,
            audits: AtomicUsize::new(0),
        }
    }

    pub fn audit_count(&self) -> usize {
        self.audits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdvisoryTool for FakeAudit {
    async fn is_installed(&self) -> bool {
        self.installed
    }

    async fn audit(&self, _manifest_path: &Path) -> Result<AdvisoryMap, AdvisoryError> {
        self.audits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.report.clone()
    }
}

/// Everything a sink was handed, in order.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Event {
    Results(ValidationReport),
    Advisories {
        path: PathBuf,
        generation: u64,
        check: AdvisoryCheck,
    },
    ParseError {
        path: PathBuf,
        generation: u64,
        message: String,
    },
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<ValidationReport> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Results(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn advisories(&self) -> Vec<(u64, AdvisoryCheck)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Advisories {
                    generation, check, ..
                } => Some((generation, check)),
                _ => None,
            })
            .collect()
    }
}

impl ResultSink for RecordingSink {
    fn publish_results(&self, report: &ValidationReport) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Results(report.clone()));
    }

    fn publish_advisories(&self, path: &Path, generation: u64, check: &AdvisoryCheck) {
        self.events.lock().unwrap().push(Event::Advisories {
            path: path.to_path_buf(),
            generation,
            check: check.clone(),
        });
    }

    fn publish_parse_error(&self, path: &Path, generation: u64, error: &LensError) {
        self.events.lock().unwrap().push(Event::ParseError {
            path: path.to_path_buf(),
            generation,
            message: error.to_string(),
        });
    }
}

#[allow(dead_code)]
pub fn session(
    config: LensConfig,
    registry: Arc<FakeRegistry>,
    registries: StaticRegistries,
    audit: Arc<FakeAudit>,
) -> Arc<Session> {
    Arc::new(Session::with_collaborators(
        config,
        registry,
        Arc::new(registries),
        Arc::new(NoLockfile),
        audit,
    ))
}
