use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, warn};

use threadline_api::{Thread, ThreadSearchRequest};

use crate::backend::SessionBackend;
use crate::error::{CoreError, Result};
use crate::resolver::{CreationTimeCache, CreationTimeResolver, TimeSource};

/// A known thread together with its resolved creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry {
    pub thread: Thread,
    pub created_at: DateTime<Utc>,
    pub source: TimeSource,
}

impl ThreadEntry {
    pub fn thread_id(&self) -> &str {
        &self.thread.thread_id
    }
}

/// What the UI renders: newest thread first plus the active selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorySnapshot {
    pub threads: Vec<ThreadEntry>,
    pub active_thread_id: Option<String>,
    pub loading: bool,
}

impl DirectorySnapshot {
    pub fn active(&self) -> Option<&ThreadEntry> {
        let id = self.active_thread_id.as_deref()?;
        self.threads.iter().find(|entry| entry.thread_id() == id)
    }

    pub fn is_active(&self, thread_id: &str) -> bool {
        self.active_thread_id.as_deref() == Some(thread_id)
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryOptions {
    /// Graph id used as the `graph_id` metadata filter.
    pub assistant_id: String,
    pub page_limit: u32,
}

impl DirectoryOptions {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            page_limit: 100,
        }
    }
}

/// In-memory list of known threads, kept in sync with the backend.
///
/// Every fetch draws a ticket; a response is applied only when its ticket is
/// newer than the last one applied, so a slow fetch can never overwrite the
/// result of a fetch that started after it.
pub struct ThreadDirectory {
    backend: Arc<dyn SessionBackend>,
    resolver: CreationTimeResolver,
    options: DirectoryOptions,
    state: watch::Sender<DirectorySnapshot>,
    next_ticket: AtomicU64,
    applied_ticket: Mutex<u64>,
}

impl ThreadDirectory {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        cache: CreationTimeCache,
        options: DirectoryOptions,
    ) -> Self {
        let resolver = CreationTimeResolver::new(backend.clone(), cache);
        let (state, _) = watch::channel(DirectorySnapshot::default());
        Self {
            backend,
            resolver,
            options,
            state,
            next_ticket: AtomicU64::new(0),
            applied_ticket: Mutex::new(0),
        }
    }

    pub fn resolver(&self) -> &CreationTimeResolver {
        &self.resolver
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DirectorySnapshot> {
        self.state.subscribe()
    }

    pub fn handle(self: &Arc<Self>) -> DirectoryHandle {
        DirectoryHandle {
            inner: Arc::downgrade(self),
        }
    }

    /// Fetch, order and publish the thread list.
    ///
    /// A transport failure is logged and yields an empty list while the
    /// published list is left as it was: empty means "unknown right now",
    /// not "no threads".
    pub async fn fetch_threads(&self) -> Vec<ThreadEntry> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let req = ThreadSearchRequest::for_graph(&self.options.assistant_id, self.options.page_limit);

        let threads = match self.backend.search_threads(&req).await {
            Ok(threads) => threads,
            Err(e) => {
                warn!("Error fetching threads: {e:#}");
                return Vec::new();
            }
        };

        let entries = self.order_by_creation(threads).await;
        self.apply(ticket, &entries);
        entries
    }

    async fn order_by_creation(&self, threads: Vec<Thread>) -> Vec<ThreadEntry> {
        let resolved = join_all(
            threads
                .iter()
                .map(|thread| self.resolver.resolve_with_source(&thread.thread_id)),
        )
        .await;

        let mut entries: Vec<ThreadEntry> = threads
            .into_iter()
            .zip(resolved)
            .map(|(thread, time)| ThreadEntry {
                thread,
                created_at: time.at,
                source: time.source,
            })
            .collect();
        // Stable: equal times keep the backend's order.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    fn apply(&self, ticket: u64, entries: &[ThreadEntry]) -> bool {
        let mut applied = self
            .applied_ticket
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if ticket <= *applied {
            debug!("Discarding stale thread list (ticket {ticket}, applied {})", *applied);
            return false;
        }
        *applied = ticket;

        self.state.send_modify(|state| {
            state.threads = entries.to_vec();
            if state.active_thread_id.is_none() {
                state.active_thread_id = entries.first().map(|e| e.thread_id().to_string());
            }
        });
        true
    }

    /// Select a thread. The id does not have to be listed yet. Returns false
    /// (and notifies nobody) when the selection is unchanged.
    pub fn set_active_thread_id(&self, thread_id: Option<String>) -> bool {
        self.state.send_if_modified(|state| {
            if state.active_thread_id == thread_id {
                return false;
            }
            state.active_thread_id = thread_id;
            true
        })
    }

    pub fn set_loading(&self, loading: bool) -> bool {
        self.state.send_if_modified(|state| {
            if state.loading == loading {
                return false;
            }
            state.loading = loading;
            true
        })
    }
}

/// Weak consumer handle onto a [`ThreadDirectory`].
///
/// Views hold these instead of the directory itself; once the directory is
/// gone every call fails with [`CoreError::DirectoryDetached`].
#[derive(Clone)]
pub struct DirectoryHandle {
    inner: Weak<ThreadDirectory>,
}

impl DirectoryHandle {
    pub fn directory(&self) -> Result<Arc<ThreadDirectory>> {
        self.inner.upgrade().ok_or(CoreError::DirectoryDetached)
    }

    pub fn snapshot(&self) -> Result<DirectorySnapshot> {
        Ok(self.directory()?.snapshot())
    }

    pub fn set_active_thread_id(&self, thread_id: Option<String>) -> Result<bool> {
        Ok(self.directory()?.set_active_thread_id(thread_id))
    }

    pub fn subscribe(&self) -> Result<watch::Receiver<DirectorySnapshot>> {
        Ok(self.directory()?.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, run_at, thread};
    use std::time::Duration;

    fn directory(backend: &Arc<FakeBackend>) -> Arc<ThreadDirectory> {
        Arc::new(ThreadDirectory::new(
            backend.clone(),
            CreationTimeCache::new(),
            DirectoryOptions::new("sql-agent"),
        ))
    }

    fn seed(backend: &FakeBackend, id: &str, created_at: &str) {
        backend.add_thread(thread(id, Vec::new()));
        backend.set_runs(id, vec![run_at(id, created_at)]);
    }

    fn ids(entries: &[ThreadEntry]) -> Vec<&str> {
        entries.iter().map(ThreadEntry::thread_id).collect()
    }

    #[tokio::test]
    async fn fetch_orders_newest_first_and_selects_newest() {
        let backend = Arc::new(FakeBackend::new());
        seed(&backend, "old", "2024-01-01T00:00:00Z");
        seed(&backend, "new", "2024-03-01T00:00:00Z");
        seed(&backend, "mid", "2024-02-01T00:00:00Z");
        let dir = directory(&backend);

        let entries = dir.fetch_threads().await;
        assert_eq!(ids(&entries), vec!["new", "mid", "old"]);
        assert!(entries.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let snapshot = dir.snapshot();
        assert_eq!(snapshot.active_thread_id.as_deref(), Some("new"));
        assert_eq!(snapshot.active().map(ThreadEntry::thread_id), Some("new"));
    }

    #[tokio::test]
    async fn equal_times_keep_backend_order() {
        let backend = Arc::new(FakeBackend::new());
        seed(&backend, "a", "2024-01-01T00:00:00Z");
        seed(&backend, "b", "2024-01-01T00:00:00Z");
        seed(&backend, "c", "2024-01-01T00:00:00Z");
        let entries = directory(&backend).fetch_threads().await;
        assert_eq!(ids(&entries), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn existing_selection_survives_refresh() {
        let backend = Arc::new(FakeBackend::new());
        seed(&backend, "old", "2024-01-01T00:00:00Z");
        seed(&backend, "new", "2024-03-01T00:00:00Z");
        let dir = directory(&backend);

        dir.set_active_thread_id(Some("old".to_string()));
        dir.fetch_threads().await;
        assert_eq!(dir.snapshot().active_thread_id.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn transport_failure_returns_empty_and_keeps_previous_list() {
        let backend = Arc::new(FakeBackend::new());
        seed(&backend, "t-1", "2024-01-01T00:00:00Z");
        let dir = directory(&backend);
        assert_eq!(dir.fetch_threads().await.len(), 1);

        backend.fail_search(true);
        assert!(dir.fetch_threads().await.is_empty());
        assert_eq!(ids(&dir.snapshot().threads), vec!["t-1"]);
    }

    #[tokio::test]
    async fn creation_times_are_cached_across_refreshes() {
        let backend = Arc::new(FakeBackend::new());
        seed(&backend, "t-1", "2024-01-01T00:00:00Z");
        seed(&backend, "t-2", "2024-01-02T00:00:00Z");
        let dir = directory(&backend);

        dir.fetch_threads().await;
        dir.fetch_threads().await;
        assert_eq!(backend.search_calls(), 2);
        assert_eq!(backend.run_list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_does_not_overwrite_newer_one() {
        let backend = Arc::new(FakeBackend::new());
        seed(&backend, "fresh", "2024-02-01T00:00:00Z");
        backend.set_runs("stale", vec![run_at("stale", "2024-01-01T00:00:00Z")]);
        backend.script_search(Duration::from_millis(500), vec![thread("stale", Vec::new())]);
        backend.script_search(Duration::ZERO, vec![thread("fresh", Vec::new())]);
        let dir = directory(&backend);

        let slow = {
            let dir = dir.clone();
            tokio::spawn(async move { dir.fetch_threads().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = dir.fetch_threads().await;
        let slow = slow.await.expect("slow fetch task");

        assert_eq!(ids(&fast), vec!["fresh"]);
        // The late response is still returned to its caller...
        assert_eq!(ids(&slow), vec!["stale"]);
        // ...but not published.
        assert_eq!(ids(&dir.snapshot().threads), vec!["fresh"]);
    }

    #[tokio::test]
    async fn set_active_thread_id_is_idempotent() {
        let backend = Arc::new(FakeBackend::new());
        let dir = directory(&backend);
        let mut rx = dir.subscribe();

        assert!(dir.set_active_thread_id(Some("x".to_string())));
        let after_first = dir.snapshot();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!dir.set_active_thread_id(Some("x".to_string())));
        assert_eq!(dir.snapshot(), after_first);
        assert!(!rx.has_changed().unwrap());
        // Unknown ids are accepted without a network call.
        assert_eq!(backend.search_calls(), 0);
    }

    #[tokio::test]
    async fn handle_fails_after_directory_drop() {
        let backend = Arc::new(FakeBackend::new());
        let dir = directory(&backend);
        let handle = dir.handle();
        assert!(handle.snapshot().is_ok());
        assert!(handle.set_active_thread_id(Some("t".into())).unwrap());

        drop(dir);
        assert!(matches!(handle.snapshot(), Err(CoreError::DirectoryDetached)));
    }
}
