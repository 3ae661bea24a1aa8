//! Session caches.
//!
//! Every cache here is an explicit object owned by a long-lived session and
//! handed to the components that need it, so tests can substitute or inspect
//! them. All of them are safe to invalidate at any time, including when empty.

use crate::dependency::RegistryId;
use crate::error::ResolutionError;
use crate::registry::PublishedVersion;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default time-to-live for resolved version lists.
pub const DEFAULT_VERSION_TTL: Duration = Duration::from_secs(300);

/// Outcome of resolving one crate, shared by every caller of the same key.
pub type FetchResult = Result<Arc<Vec<PublishedVersion>>, ResolutionError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Cache key: one crate in one registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionKey {
    pub crate_name: String,
    pub registry: RegistryId,
}

impl VersionKey {
    pub fn new(crate_name: impl Into<String>, registry: RegistryId) -> Self {
        Self {
            crate_name: crate_name.into(),
            registry,
        }
    }
}

struct CachedVersions {
    versions: Arc<Vec<PublishedVersion>>,
    fetched_at: Instant,
}

struct VersionCacheInner {
    entries: DashMap<VersionKey, CachedVersions>,
    in_flight: DashMap<VersionKey, SharedFetch>,
    /// Bumped on invalidation so fetches started earlier cannot repopulate.
    epoch: AtomicU64,
    ttl: Duration,
}

/// Registry version cache with TTL expiry and in-flight request dedupe.
///
/// Concurrent [`VersionCache::get_or_fetch`] calls for the same key share a
/// single fetch. The fetch runs as its own task, so a caller that gives up
/// (cancellation) never strands the others. Failures are not cached.
///
/// # Examples
///
/// ```
/// use lens_core::cache::{VersionCache, VersionKey};
/// use lens_core::RegistryId;
/// use std::time::Duration;
///
/// let cache = VersionCache::new(Duration::from_secs(60));
/// assert!(cache.get(&VersionKey::new("serde", RegistryId::CratesIo)).is_none());
/// cache.invalidate();
/// assert!(cache.is_empty());
/// ```
#[derive(Clone)]
pub struct VersionCache {
    inner: Arc<VersionCacheInner>,
}

impl VersionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(VersionCacheInner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                epoch: AtomicU64::new(0),
                ttl,
            }),
        }
    }

    /// Returns cached versions unless absent or expired. Expired entries are evicted.
    pub fn get(&self, key: &VersionKey) -> Option<Arc<Vec<PublishedVersion>>> {
        let ttl = self.inner.ttl;
        if let Some(cached) = self.inner.entries.get(key)
            && cached.fetched_at.elapsed() < ttl
        {
            return Some(Arc::clone(&cached.versions));
        }

        self.inner
            .entries
            .remove_if(key, |_, cached| cached.fetched_at.elapsed() >= ttl);
        None
    }

    pub fn insert(&self, key: VersionKey, versions: Vec<PublishedVersion>) {
        self.inner.entries.insert(
            key,
            CachedVersions {
                versions: Arc::new(versions),
                fetched_at: Instant::now(),
            },
        );
    }

    /// Returns cached versions or runs `fetch`, joining an identical in-flight
    /// request if there is one.
    ///
    /// Returns `None` if `token` is cancelled before or while waiting.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: VersionKey,
        token: &CancellationToken,
        fetch: F,
    ) -> Option<FetchResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<PublishedVersion>, ResolutionError>> + Send + 'static,
    {
        if token.is_cancelled() {
            return None;
        }

        if let Some(hit) = self.get(&key) {
            tracing::debug!("version cache hit: {}@{}", key.crate_name, key.registry);
            return Some(Ok(hit));
        }

        let shared = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!("joining in-flight fetch: {}", key.crate_name);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                tracing::debug!("version cache miss: {}@{}", key.crate_name, key.registry);
                let shared = self.spawn_fetch(key.clone(), fetch());
                entry.insert(shared.clone());
                shared
            }
        };

        tokio::select! {
            () = token.cancelled() => None,
            result = shared => Some(result),
        }
    }

    fn spawn_fetch<Fut>(&self, key: VersionKey, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = Result<Vec<PublishedVersion>, ResolutionError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let epoch = inner.epoch.load(Ordering::SeqCst);
        let package = key.crate_name.clone();

        let handle = tokio::spawn(async move {
            let result = fetch.await.map(Arc::new);
            if inner.epoch.load(Ordering::SeqCst) == epoch {
                if let Ok(versions) = &result {
                    inner.entries.insert(
                        key.clone(),
                        CachedVersions {
                            versions: Arc::clone(versions),
                            fetched_at: Instant::now(),
                        },
                    );
                }
                inner.in_flight.remove(&key);
            }
            result
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(ResolutionError::Transport {
                    package,
                    message: format!("fetch task failed: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }

    /// Drops every cached version list and forgets in-flight requests.
    pub fn invalidate(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.entries.clear();
        self.inner.in_flight.clear();
        tracing::debug!("version cache cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.len()
    }
}

impl Default for VersionCache {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_TTL)
    }
}

/// Plain keyed cache with explicit invalidation.
///
/// Used for per-scope registry configuration.
pub struct KeyedCache<K, V> {
    entries: DashMap<K, Arc<V>>,
}

impl<K: Eq + Hash, V> KeyedCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).map(|v| Arc::clone(&v))
    }

    pub fn set(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    pub fn invalidate(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V> Default for KeyedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

const PROBE_UNKNOWN: u8 = 0;
const PROBE_ABSENT: u8 = 1;
const PROBE_PRESENT: u8 = 2;

/// Memoised result of an external-tool availability probe.
#[derive(Debug, Default)]
pub struct ProbeCache {
    state: AtomicU8,
}

impl ProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<bool> {
        match self.state.load(Ordering::Acquire) {
            PROBE_ABSENT => Some(false),
            PROBE_PRESENT => Some(true),
            _ => None,
        }
    }

    pub fn set(&self, available: bool) {
        let state = if available { PROBE_PRESENT } else { PROBE_ABSENT };
        self.state.store(state, Ordering::Release);
    }

    pub fn invalidate(&self) {
        self.state.store(PROBE_UNKNOWN, Ordering::Release);
    }
}
