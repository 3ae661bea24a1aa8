//! Per-file validation passes.
//!
//! Each manifest path has at most one active pass. Starting a pass cancels
//! the one it replaces, and every emission goes through a generation check
//! performed under the pass map's lock, so a superseded pass can never
//! publish after its successor has started.
//!
//! A pass runs in two parts:
//!
//! 1. **Primary**: parse, registry configuration, lockfile, then concurrent
//!    per-dependency resolution. Results are published as soon as ready.
//! 2. **Advisories**: a background task whose result is merged only if the
//!    pass is still current when it completes.

use crate::advisory::check_advisories;
use crate::error::{AppError, Cancelled};
use crate::resolver::{load_lockfile, load_registry_config, validate_dependency};
use crate::session::Session;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use lens_cargo::parse_manifest;
use lens_core::{AdvisoryCheck, CancellationToken, DependencyValidationResult, LensError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

/// Receives the output of validation passes.
///
/// Calls are synchronous and made while the engine holds the pass map entry
/// for `path`. Implementations must not call back into the [`Engine`].
pub trait ResultSink: Send + Sync {
    fn publish_results(&self, report: &ValidationReport);

    fn publish_advisories(&self, path: &Path, generation: u64, check: &AdvisoryCheck);

    /// The manifest is not valid TOML; no per-dependency results exist.
    fn publish_parse_error(&self, path: &Path, generation: u64, error: &LensError);
}

/// Classification results of one completed primary pass, ordered by line.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Absolute manifest path.
    pub path: PathBuf,
    pub generation: u64,
    pub results: Vec<DependencyValidationResult>,
    /// Entries skipped because an earlier dependency already owns their line.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unanchored: Vec<String>,
}

#[derive(Debug)]
pub enum PassOutcome {
    Completed(ValidationReport),
    ParseFailed { generation: u64, error: LensError },
    /// Superseded or cancelled; nothing was published.
    Cancelled,
}

/// A finished primary pass plus its still-running advisory task, if any.
#[derive(Debug)]
pub struct ValidationPass {
    pub outcome: PassOutcome,
    pub advisories: Option<JoinHandle<()>>,
}

/// Results ordered by line, plus the names of unanchored entries.
type Classified = (Vec<DependencyValidationResult>, Vec<String>);

/// Resolves `path` against the current directory; the pass map and every
/// stage key on this form.
fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|e| {
        tracing::warn!("cannot resolve {} to an absolute path: {}", path.display(), e);
        path.to_path_buf()
    })
}

struct ActivePass {
    generation: u64,
    token: CancellationToken,
}

struct EngineInner {
    session: Arc<Session>,
    sink: Arc<dyn ResultSink>,
    passes: DashMap<PathBuf, ActivePass>,
    generation: AtomicU64,
}

/// Orchestrates validation passes over a shared [`Session`].
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(session: Arc<Session>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                session,
                sink,
                passes: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    /// Reads a manifest from disk and validates it.
    pub async fn validate_file(&self, path: &Path) -> Result<ValidationPass, AppError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AppError::ManifestRead {
                    path: path.display().to_string(),
                    source,
                })?;
        Ok(self.validate(path, &content).await)
    }

    /// Runs a validation pass for `path`, cancelling any pass already active for it.
    ///
    /// A relative `path` is resolved against the current directory before any
    /// stage runs. Returns once the primary results are published. The
    /// advisory check, when enabled, keeps running on the returned handle.
    pub async fn validate(&self, path: &Path, content: &str) -> ValidationPass {
        let path = &absolute_path(path);
        let (generation, token) = self.begin(path);
        tracing::debug!("starting pass {} for {}", generation, path.display());

        let classified = self.classify(path, content, &token).await;
        let sink = &self.inner.sink;

        match classified {
            Err(Cancelled) => {
                tracing::debug!("pass {} for {} cancelled", generation, path.display());
                self.finish(path, generation);
                ValidationPass::cancelled()
            }
            Ok(Err(error)) => {
                tracing::warn!("failed to parse {}: {}", path.display(), error);
                let published = self.emit_if_current(path, generation, || {
                    sink.publish_parse_error(path, generation, &error)
                });
                self.finish(path, generation);
                if !published {
                    return ValidationPass::cancelled();
                }
                ValidationPass {
                    outcome: PassOutcome::ParseFailed { generation, error },
                    advisories: None,
                }
            }
            Ok(Ok((results, unanchored))) => {
                let report = ValidationReport {
                    path: path.to_path_buf(),
                    generation,
                    results,
                    unanchored,
                };
                if !self.emit_if_current(path, generation, || sink.publish_results(&report)) {
                    self.finish(path, generation);
                    return ValidationPass::cancelled();
                }
                tracing::info!(
                    "validated {}: {} registry dependencies",
                    path.display(),
                    report.results.len()
                );

                let advisories = if self.inner.session.config.advisories.enabled {
                    Some(self.spawn_advisories(path.to_path_buf(), generation, &token))
                } else {
                    self.finish(path, generation);
                    None
                };

                ValidationPass {
                    outcome: PassOutcome::Completed(report),
                    advisories,
                }
            }
        }
    }

    /// Cancels the active pass for `path`, including its advisory check.
    pub fn cancel(&self, path: &Path) {
        let path = absolute_path(path);
        if let Some((_, active)) = self.inner.passes.remove(&path) {
            active.token.cancel();
            tracing::debug!("cancelled pass {} for {}", active.generation, path.display());
        }
    }

    pub fn cancel_all(&self) {
        self.inner.passes.retain(|_, active| {
            active.token.cancel();
            false
        });
    }

    /// Whether a pass (primary or advisory part) is still running for `path`.
    pub fn is_active(&self, path: &Path) -> bool {
        self.inner.passes.contains_key(&absolute_path(path))
    }

    fn begin(&self, path: &Path) -> (u64, CancellationToken) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let previous = self.inner.passes.insert(
            path.to_path_buf(),
            ActivePass {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            tracing::debug!(
                "pass {} for {} superseded by {}",
                previous.generation,
                path.display(),
                generation
            );
        }
        (generation, token)
    }

    /// Runs `emit` only if `generation` is still the active pass for `path`.
    ///
    /// The map entry stays read-locked while `emit` runs, so [`Engine::begin`]
    /// for the same path waits for it to return.
    fn emit_if_current(&self, path: &Path, generation: u64, emit: impl FnOnce()) -> bool {
        match self.inner.passes.get(path) {
            Some(active) if active.generation == generation && !active.token.is_cancelled() => {
                emit();
                true
            }
            _ => false,
        }
    }

    fn finish(&self, path: &Path, generation: u64) {
        self.inner
            .passes
            .remove_if(path, |_, active| active.generation == generation);
    }

    async fn classify(
        &self,
        path: &Path,
        content: &str,
        token: &CancellationToken,
    ) -> Result<Result<Classified, LensError>, Cancelled> {
        if token.is_cancelled() {
            return Err(Cancelled);
        }

        let manifest = match parse_manifest(content, path) {
            Ok(manifest) => manifest,
            Err(e) => return Ok(Err(e.into())),
        };

        let unanchored = manifest
            .unanchored
            .iter()
            .map(|dep| dep.name.clone())
            .collect();

        let session = self.inner.session.as_ref();
        let registry_config = load_registry_config(session, path, token).await?;
        let lockfile = load_lockfile(session, path, token).await?;

        let dependencies: Vec<_> = manifest
            .dependencies
            .into_iter()
            .filter(|dep| dep.is_registry())
            .collect();
        tracing::debug!(
            "resolving {} registry dependencies for {}",
            dependencies.len(),
            path.display()
        );

        let outcomes: Vec<_> = stream::iter(dependencies)
            .map(|dependency| {
                validate_dependency(
                    session,
                    dependency,
                    &registry_config,
                    lockfile.as_deref(),
                    token,
                )
            })
            .buffer_unordered(session.config.registry.concurrency.max(1))
            .collect()
            .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            results.extend(outcome?);
        }
        results.sort_by_key(|result| result.dependency.line);

        Ok(Ok((results, unanchored)))
    }

    fn spawn_advisories(
        &self,
        path: PathBuf,
        generation: u64,
        token: &CancellationToken,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        let token = token.child_token();

        tokio::spawn(async move {
            match check_advisories(&engine.inner.session, &path, &token).await {
                Ok(check) => {
                    let sink = &engine.inner.sink;
                    let merged = engine.emit_if_current(&path, generation, || {
                        sink.publish_advisories(&path, generation, &check)
                    });
                    if !merged {
                        tracing::debug!(
                            "discarding advisories of superseded pass {} for {}",
                            generation,
                            path.display()
                        );
                    }
                }
                Err(Cancelled) => {
                    tracing::debug!("advisory check for pass {} cancelled", generation);
                }
            }
            engine.finish(&path, generation);
        })
    }
}

impl ValidationPass {
    fn cancelled() -> Self {
        Self {
            outcome: PassOutcome::Cancelled,
            advisories: None,
        }
    }

    /// Waits for the advisory task, if one was started.
    pub async fn wait_advisories(self) -> PassOutcome {
        if let Some(handle) = self.advisories
            && let Err(e) = handle.await
        {
            tracing::warn!("advisory task failed: {}", e);
        }
        self.outcome
    }
}
