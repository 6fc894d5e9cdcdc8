//! In-memory [`SessionBackend`] for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};

use threadline_api::{
    Message, Run, RunStreamRequest, StreamEvent, Thread, ThreadSearchRequest, ThreadState,
    ThreadValues,
};
use threadline_api_client::RunStream;

use crate::backend::SessionBackend;

/// Thread with the given id and messages.
pub fn thread(id: &str, messages: Vec<Message>) -> Thread {
    Thread {
        thread_id: id.to_string(),
        values: ThreadValues {
            messages,
            extra: Map::new(),
        },
        ..Thread::default()
    }
}

/// Run record for `thread_id` created at `created_at`.
pub fn run_at(thread_id: &str, created_at: &str) -> Run {
    Run {
        run_id: format!("run-{thread_id}-{created_at}"),
        thread_id: thread_id.to_string(),
        created_at: created_at.to_string(),
        updated_at: created_at.to_string(),
        status: "success".to_string(),
        ..Run::default()
    }
}

#[derive(Default)]
struct Calls {
    creates: AtomicUsize,
    searches: AtomicUsize,
    run_lists: AtomicUsize,
    state_gets: AtomicUsize,
    streams: AtomicUsize,
}

/// Scripted backend. Unless a scripted search response is queued, searches
/// return every known thread.
#[derive(Default)]
pub struct FakeBackend {
    threads: Mutex<Vec<Thread>>,
    runs: Mutex<HashMap<String, Vec<Run>>>,
    stream_events: Mutex<Vec<StreamEvent>>,
    scripted_searches: Mutex<VecDeque<(Duration, Vec<Thread>)>>,
    sent: Mutex<Vec<(String, RunStreamRequest)>>,
    create_delay: Mutex<Duration>,
    fail_search: AtomicBool,
    fail_runs: AtomicBool,
    fail_stream: AtomicBool,
    next_thread: AtomicUsize,
    calls: Calls,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&self, thread: Thread) {
        lock(&self.threads).push(thread);
    }

    pub fn set_runs(&self, thread_id: &str, runs: Vec<Run>) {
        lock(&self.runs).insert(thread_id.to_string(), runs);
    }

    pub fn set_stream_events(&self, events: Vec<StreamEvent>) {
        *lock(&self.stream_events) = events;
    }

    /// Queue a one-shot search response delivered after `delay`.
    pub fn script_search(&self, delay: Duration, threads: Vec<Thread>) {
        lock(&self.scripted_searches).push_back((delay, threads));
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *lock(&self.create_delay) = delay;
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub fn fail_run_listing(&self, fail: bool) {
        self.fail_runs.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stream(&self, fail: bool) {
        self.fail_stream.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, RunStreamRequest)> {
        lock(&self.sent).clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls.creates.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.calls.searches.load(Ordering::SeqCst)
    }

    pub fn run_list_calls(&self) -> usize {
        self.calls.run_lists.load(Ordering::SeqCst)
    }

    pub fn state_calls(&self) -> usize {
        self.calls.state_gets.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.calls.streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn create_thread(&self) -> Result<Thread> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.create_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let n = self.next_thread.fetch_add(1, Ordering::SeqCst) + 1;
        let created = thread(&format!("thread-{n}"), Vec::new());
        self.add_thread(created.clone());
        Ok(created)
    }

    async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState> {
        self.calls.state_gets.fetch_add(1, Ordering::SeqCst);
        let threads = lock(&self.threads).clone();
        match threads.into_iter().find(|t| t.thread_id == thread_id) {
            Some(found) => Ok(ThreadState {
                values: found.values,
                ..ThreadState::default()
            }),
            None => bail!("404 Not Found: thread {thread_id}"),
        }
    }

    async fn search_threads(&self, _req: &ThreadSearchRequest) -> Result<Vec<Thread>> {
        self.calls.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        let scripted = lock(&self.scripted_searches).pop_front();
        if let Some((delay, threads)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(threads);
        }
        Ok(lock(&self.threads).clone())
    }

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>> {
        self.calls.run_lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_runs.load(Ordering::SeqCst) {
            bail!("500 Internal Server Error");
        }
        Ok(lock(&self.runs).get(thread_id).cloned().unwrap_or_default())
    }

    async fn stream_run(&self, thread_id: &str, req: &RunStreamRequest) -> Result<RunStream> {
        self.calls.streams.fetch_add(1, Ordering::SeqCst);
        if self.fail_stream.load(Ordering::SeqCst) {
            bail!("409 Conflict: thread {thread_id} is busy");
        }
        lock(&self.sent).push((thread_id.to_string(), req.clone()));
        Ok(RunStream::from_events(lock(&self.stream_events).clone()))
    }
}

/// `messages/partial` event carrying one assistant message snapshot.
pub fn partial(id: &str, text: &str) -> StreamEvent {
    StreamEvent::new(
        "messages/partial",
        serde_json::json!([{"type": "ai", "id": id, "content": text}]),
    )
}

/// `end` event.
pub fn end() -> StreamEvent {
    StreamEvent::new("end", Value::Null)
}
