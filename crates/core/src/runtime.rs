use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info};

use threadline_api::{Command, Message, RunStreamRequest};
use threadline_api_client::RunStream;

use crate::backend::SessionBackend;

/// Bridges UI actions (new thread, switch, send) to the backend and tracks
/// which thread is current.
///
/// States: no thread → active thread → active thread with a different id.
/// There is no terminal state.
pub struct ConversationRuntime {
    backend: Arc<dyn SessionBackend>,
    assistant_id: String,
    current: watch::Sender<Option<String>>,
    messages: Mutex<Vec<Message>>,
    // Serializes lazy creation so concurrent first sends share one thread.
    create_gate: tokio::sync::Mutex<()>,
}

impl ConversationRuntime {
    pub fn new(backend: Arc<dyn SessionBackend>, assistant_id: impl Into<String>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            backend,
            assistant_id: assistant_id.into(),
            current,
            messages: Mutex::new(Vec::new()),
            create_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    pub fn current_thread_id(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Notified whenever the current thread changes.
    pub fn watch_thread(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_messages().clone()
    }

    /// Replace the local message list, typically with the accumulated result
    /// of a finished stream.
    pub fn record_messages(&self, messages: Vec<Message>) {
        *self.lock_messages() = messages;
    }

    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adopt(&self, thread_id: &str) {
        self.current.send_if_modified(|current| {
            if current.as_deref() == Some(thread_id) {
                return false;
            }
            *current = Some(thread_id.to_string());
            true
        });
    }

    pub async fn switch_to_new_thread(&self) -> Result<String> {
        let thread = self
            .backend
            .create_thread()
            .await
            .context("Failed to create thread")?;
        self.adopt(&thread.thread_id);
        self.lock_messages().clear();
        info!("Switched to new thread {}", thread.thread_id);
        Ok(thread.thread_id)
    }

    pub async fn switch_to_thread(&self, thread_id: &str) -> Result<Vec<Message>> {
        let state = self
            .backend
            .get_thread_state(thread_id)
            .await
            .with_context(|| format!("Failed to load thread {thread_id}"))?;
        self.adopt(thread_id);
        let messages = state.values.messages;
        *self.lock_messages() = messages.clone();
        debug!("Switched to thread {thread_id} ({} messages)", messages.len());
        Ok(messages)
    }

    /// Send `messages` (and an optional resume/steer `command`) on the current
    /// thread, creating one first if none exists. The response stream is
    /// returned as-is; consuming deltas is the caller's job.
    pub async fn send_message(
        &self,
        messages: Vec<Message>,
        command: Option<Command>,
    ) -> Result<RunStream> {
        let thread_id = self.ensure_thread().await?;

        let req = RunStreamRequest::new(&self.assistant_id, messages.clone(), command);
        let stream = self
            .backend
            .stream_run(&thread_id, &req)
            .await
            .with_context(|| format!("Failed to start run on thread {thread_id}"))?;
        // Only a run the server accepted becomes part of the local history.
        self.lock_messages().extend(messages);
        Ok(stream)
    }

    async fn ensure_thread(&self) -> Result<String> {
        if let Some(id) = self.current_thread_id() {
            return Ok(id);
        }
        let _gate = self.create_gate.lock().await;
        if let Some(id) = self.current_thread_id() {
            return Ok(id);
        }

        let thread = self
            .backend
            .create_thread()
            .await
            .context("Failed to create thread for first message")?;
        self.adopt(&thread.thread_id);
        info!("Created thread {} for first message", thread.thread_id);
        Ok(thread.thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, end, partial, thread};
    use std::time::Duration;
    use threadline_api::StreamMode;

    fn runtime(backend: &Arc<FakeBackend>) -> ConversationRuntime {
        ConversationRuntime::new(backend.clone(), "sql-agent")
    }

    #[tokio::test]
    async fn first_send_creates_thread_then_streams() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_stream_events(vec![partial("m-1", "Hi"), end()]);
        let rt = runtime(&backend);
        assert_eq!(rt.current_thread_id(), None);

        let stream = rt
            .send_message(vec![Message::human("hello")], None)
            .await
            .expect("send");
        let events = stream.collect_events().await.unwrap();
        assert_eq!(events.len(), 2);

        assert_eq!(backend.create_calls(), 1);
        assert_eq!(backend.stream_calls(), 1);
        assert_eq!(rt.current_thread_id().as_deref(), Some("thread-1"));
        let sent = backend.sent();
        assert_eq!(sent[0].0, "thread-1");
        assert_eq!(sent[0].1.assistant_id, "sql-agent");
        assert_eq!(
            sent[0].1.stream_mode,
            vec![StreamMode::Messages, StreamMode::Updates]
        );
        assert_eq!(rt.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_sends_share_one_thread() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_create_delay(Duration::from_millis(200));
        let rt = runtime(&backend);

        let (a, b) = tokio::join!(
            rt.send_message(vec![Message::human("one")], None),
            rt.send_message(vec![Message::human("two")], None),
        );
        a.expect("first send");
        b.expect("second send");

        assert_eq!(backend.create_calls(), 1);
        let sent = backend.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(thread_id, _)| thread_id == "thread-1"));
    }

    #[tokio::test]
    async fn command_only_resume_sends_null_input() {
        let backend = Arc::new(FakeBackend::new());
        let rt = runtime(&backend);
        rt.switch_to_new_thread().await.unwrap();

        rt.send_message(Vec::new(), Some(Command::resume(serde_json::json!({"approved": true}))))
            .await
            .unwrap();
        let (_, req) = &backend.sent()[0];
        assert!(req.input.is_none());
        assert!(req.command.as_ref().and_then(|c| c.resume.as_ref()).is_some());
        assert_eq!(backend.create_calls(), 1);
    }

    #[tokio::test]
    async fn switch_to_thread_replaces_messages_and_notifies() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_thread(thread(
            "existing",
            vec![Message::human("q"), Message::human("q2")],
        ));
        let rt = runtime(&backend);
        rt.record_messages(vec![Message::human("stale")]);
        let mut changes = rt.watch_thread();

        let messages = rt.switch_to_thread("existing").await.unwrap();
        assert_eq!(backend.state_calls(), 1);
        assert_eq!(messages.len(), 2);
        assert_eq!(rt.messages(), messages);
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().as_deref(), Some("existing"));

        // Re-selecting the same thread is not a change.
        rt.switch_to_thread("existing").await.unwrap();
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn failed_switch_keeps_current_thread() {
        let backend = Arc::new(FakeBackend::new());
        let rt = runtime(&backend);
        let id = rt.switch_to_new_thread().await.unwrap();

        assert!(rt.switch_to_thread("missing").await.is_err());
        assert_eq!(rt.current_thread_id(), Some(id));
    }

    #[tokio::test]
    async fn rejected_run_leaves_local_history_untouched() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_stream(true);
        let rt = runtime(&backend);
        rt.record_messages(vec![Message::human("earlier")]);

        let err = rt
            .send_message(vec![Message::human("lost")], None)
            .await
            .err()
            .expect("stream start fails");
        assert!(format!("{err:#}").contains("409 Conflict"));
        assert_eq!(backend.stream_calls(), 1);
        assert_eq!(rt.messages(), vec![Message::human("earlier")]);
        // The lazily created thread stays current for the retry.
        assert_eq!(rt.current_thread_id().as_deref(), Some("thread-1"));

        backend.fail_stream(false);
        rt.send_message(vec![Message::human("again")], None)
            .await
            .expect("retry");
        assert_eq!(backend.create_calls(), 1);
        assert_eq!(rt.messages().len(), 2);
    }

    #[tokio::test]
    async fn new_thread_clears_messages() {
        let backend = Arc::new(FakeBackend::new());
        let rt = runtime(&backend);
        rt.record_messages(vec![Message::human("old")]);

        let first = rt.switch_to_new_thread().await.unwrap();
        let second = rt.switch_to_new_thread().await.unwrap();
        assert_ne!(first, second);
        assert!(rt.messages().is_empty());
        assert_eq!(rt.current_thread_id(), Some(second));
    }
}
