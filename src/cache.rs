//! TTL-keyed store of RBAC probe outcomes (C1).
//!
//! Scoped to a single [`RbacProbe`](crate::rbac::RbacProbe) instance rather
//! than a process-global — the §9 redesign flag this replaces is a shared
//! global cache with no clear owner or shutdown point. Guarded by
//! `parking_lot::RwLock` (never held across an `.await`), the same choice
//! `kube-runtime::metrics::Metrics` makes for its shared counters.

use crate::gvk::Gvr;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// `(namespace, verb, gvr, name)` — `name` is empty for type-level verbs
/// such as `list`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Namespace the probe was scoped to, empty for cluster-scoped checks.
    pub namespace: String,
    /// The verb probed, e.g. `"get"`, `"list"`.
    pub verb: String,
    /// The resource kind probed.
    pub gvr: Gvr,
    /// Object name, empty for type-level probes.
    pub name: String,
}

impl CacheKey {
    /// Build a key from its parts.
    pub fn new(namespace: &str, verb: &str, gvr: &Gvr, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            verb: verb.to_string(),
            gvr: gvr.clone(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    allowed: bool,
    error: Option<String>,
    inserted_at: Instant,
}

/// The outcome of a [`PermissionCache::get`] lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A fresh entry was found.
    Hit {
        /// Whether the cached probe allowed the action.
        allowed: bool,
        /// An error cached alongside a negative result, if any.
        error: Option<String>,
    },
    /// No entry, or the entry was older than the configured TTL (and was evicted).
    Miss,
}

/// A snapshot of one cache entry, as exposed by [`PermissionCache::stats`].
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    /// How long ago the entry was inserted.
    pub age: Duration,
    /// Whether the entry carries a cached error.
    pub has_error: bool,
}

/// Summary statistics over the cache contents.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of live entries (expired entries are not counted, but are not
    /// swept just by calling `stats`).
    pub size: usize,
    /// The configured TTL.
    pub ttl: Duration,
    /// A snapshot of every entry.
    pub entries: Vec<EntrySnapshot>,
}

struct Inner {
    store: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

/// A handle to the background sweeper task; aborts it when dropped so the
/// sweeper's lifetime never outlives its owning [`PermissionCache`]/probe.
pub struct SweeperHandle {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// `(namespace, verb, GVR, name) -> (allowed, error, insertedAt)`, TTL-evicted.
#[derive(Clone)]
pub struct PermissionCache {
    inner: Arc<Inner>,
}

impl PermissionCache {
    /// Construct an empty cache with the given entry TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(HashMap::new()),
                ttl,
            }),
        }
    }

    /// Look up a key. A stale entry (age > TTL) is evicted on read and
    /// reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Lookup {
        {
            let store = self.inner.store.read();
            if let Some(entry) = store.get(key) {
                if entry.inserted_at.elapsed() <= self.inner.ttl {
                    return Lookup::Hit {
                        allowed: entry.allowed,
                        error: entry.error.clone(),
                    };
                }
            } else {
                return Lookup::Miss;
            }
        }
        // Entry existed but was stale; take the write lock to evict it.
        self.inner.store.write().remove(key);
        Lookup::Miss
    }

    /// Populate (or overwrite) an entry. Errors are cached alongside denies
    /// because they usually reflect a stable authz misconfiguration; callers
    /// who want a fresh probe after fixing RBAC should call [`clear`](Self::clear).
    pub fn set(&self, key: CacheKey, allowed: bool, error: Option<String>) {
        self.inner.store.write().insert(
            key,
            CacheEntry {
                allowed,
                error,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Empty the cache.
    pub fn clear(&self) {
        self.inner.store.write().clear();
    }

    /// Snapshot size, TTL, and per-entry age/error state.
    pub fn stats(&self) -> CacheStats {
        let store = self.inner.store.read();
        let entries = store
            .values()
            .map(|e| EntrySnapshot {
                age: e.inserted_at.elapsed(),
                has_error: e.error.is_some(),
            })
            .collect::<Vec<_>>();
        CacheStats {
            size: entries.len(),
            ttl: self.inner.ttl,
            entries,
        }
    }

    /// Start a background task that evicts stale entries once a minute.
    /// The returned handle aborts the task on drop.
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let ttl = inner.ttl;
                inner.store.write().retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
            }
        });
        SweeperHandle { task }
    }
}
