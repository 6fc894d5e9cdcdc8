use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::backend::SessionBackend;
use crate::time::parse_timestamp;

/// Write-once map from thread id to creation time.
///
/// Clones share storage, so one cache can be handed to every consumer in a
/// session while separate sessions stay isolated. Entries are never evicted:
/// a thread's creation time cannot change.
#[derive(Debug, Clone, Default)]
pub struct CreationTimeCache {
    inner: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl CreationTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .copied()
    }

    /// Store `at` unless a value already exists; returns the stored value.
    pub fn insert(&self, thread_id: &str, at: DateTime<Utc>) -> DateTime<Utc> {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(thread_id.to_string())
            .or_insert(at)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a resolved creation time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Cached,
    EarliestRun,
    /// Current time; not cached, so a later resolution can replace it.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub at: DateTime<Utc>,
    pub source: TimeSource,
}

impl ResolvedTime {
    pub fn is_stable(&self) -> bool {
        self.source != TimeSource::Fallback
    }
}

/// Derives a thread's creation time from its earliest run.
#[derive(Clone)]
pub struct CreationTimeResolver {
    backend: Arc<dyn SessionBackend>,
    cache: CreationTimeCache,
}

impl CreationTimeResolver {
    pub fn new(backend: Arc<dyn SessionBackend>, cache: CreationTimeCache) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &CreationTimeCache {
        &self.cache
    }

    pub async fn resolve(&self, thread_id: &str) -> DateTime<Utc> {
        self.resolve_with_source(thread_id).await.at
    }

    /// Cached value, else the earliest run's `created_at`, else now.
    ///
    /// Concurrent misses for the same id each hit the backend; the cache is
    /// write-once so they settle on the same value.
    pub async fn resolve_with_source(&self, thread_id: &str) -> ResolvedTime {
        if let Some(at) = self.cache.get(thread_id) {
            return ResolvedTime {
                at,
                source: TimeSource::Cached,
            };
        }

        match self.backend.list_runs(thread_id).await {
            Ok(runs) => {
                let earliest = runs
                    .iter()
                    .filter_map(|run| parse_timestamp(&run.created_at))
                    .min();
                if let Some(at) = earliest {
                    return ResolvedTime {
                        at: self.cache.insert(thread_id, at),
                        source: TimeSource::EarliestRun,
                    };
                }
                debug!("No dated runs for thread {thread_id}; using current time");
            }
            Err(e) => {
                warn!("Error getting creation time for thread {thread_id}: {e:#}");
            }
        }

        ResolvedTime {
            at: Utc::now(),
            source: TimeSource::Fallback,
        }
    }
}
