//! Wire types for the threads/runs API of the graph-execution service.
//!
//! This crate is the **single source of truth** for request/response shapes.
//! Every payload the service owns is deserialized leniently: unknown fields are
//! kept in `extra` maps and missing collections default to empty, so a newer
//! server never breaks thread listing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ─── Threads ─────────────────────────────────────────────────────────────────

/// A persisted conversation owned by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_values")]
    pub values: ThreadValues,
}

impl Thread {
    pub fn messages(&self) -> &[Message] {
        &self.values.messages
    }
}

/// The `values` channel of a thread. Only `messages` is interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThreadValues {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Snapshot returned by `GET /threads/{id}/state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThreadState {
    #[serde(default, deserialize_with = "lenient_values")]
    pub values: ThreadValues,
    #[serde(default)]
    pub next: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Value>,
}

/// Body of `POST /threads`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateThreadRequest {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Body of `POST /threads/search`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThreadSearchRequest {
    pub metadata: Map<String, Value>,
    pub limit: u32,
    pub offset: u32,
}

impl ThreadSearchRequest {
    /// Threads belonging to one assistant/graph, newest page first.
    pub fn for_graph(graph_id: &str, limit: u32) -> Self {
        let mut metadata = Map::new();
        metadata.insert("graph_id".to_string(), Value::String(graph_id.to_string()));
        Self {
            metadata,
            limit,
            offset: 0,
        }
    }
}

// ─── Messages ────────────────────────────────────────────────────────────────

/// Role tag carried in a message's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Human,
    Ai,
    Tool,
    System,
    Function,
    #[serde(rename = "AIMessageChunk")]
    AiChunk,
    #[serde(untagged)]
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Tool => "tool",
            Self::System => "system",
            Self::Function => "function",
            Self::AiChunk => "AIMessageChunk",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Ai | Self::AiChunk)
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multi-part message body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}

/// Message body: a plain string or an ordered list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// First text part, or the whole string.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Parts(parts) => parts
                .iter()
                .find(|part| part.kind == "text")
                .and_then(|part| part.text.as_deref()),
        }
    }

    /// All text parts joined, in order.
    pub fn joined_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

/// A tool invocation requested by an assistant message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// A single chat message as stored in thread values or streamed back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "type")]
    pub role: MessageRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            role,
            content,
            id: None,
            name: None,
            text: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            extra: Map::new(),
        }
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, MessageContent::Text(text.into()))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Best display text. Parts content yields its first text part only;
    /// string content falls back to the direct `text` field when empty.
    pub fn display_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Parts(_) => self.content.first_text().filter(|text| !text.is_empty()),
            MessageContent::Text(text) if !text.is_empty() => Some(text.as_str()),
            MessageContent::Text(_) => self.text.as_deref(),
        }
    }
}

// ─── Runs ────────────────────────────────────────────────────────────────────

/// One execution of the graph against a thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub run_id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub assistant_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multitask_strategy: Option<String>,
}

/// Out-of-band control signal sent with (or instead of) new input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goto: Option<Value>,
}

impl Command {
    pub fn resume(value: Value) -> Self {
        Self {
            resume: Some(value),
            ..Self::default()
        }
    }
}

/// Which channels the service streams back for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    Values,
    Messages,
    Updates,
    Events,
    Debug,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunInput {
    pub messages: Vec<Message>,
}

/// Body of `POST /threads/{id}/runs/stream`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunStreamRequest {
    pub assistant_id: String,
    /// `null` when resuming with a command only.
    pub input: Option<RunInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    pub stream_mode: Vec<StreamMode>,
}

impl RunStreamRequest {
    pub fn new(assistant_id: &str, messages: Vec<Message>, command: Option<Command>) -> Self {
        Self {
            assistant_id: assistant_id.to_string(),
            input: (!messages.is_empty()).then_some(RunInput { messages }),
            command,
            stream_mode: vec![StreamMode::Messages, StreamMode::Updates],
        }
    }
}

// ─── Streaming ───────────────────────────────────────────────────────────────

/// One server-sent event of a run stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub event: String,
    pub data: Value,
}

/// Coarse classification of [`StreamEvent::event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    Metadata,
    /// `[chunk, metadata]` tuples.
    MessageChunk,
    /// Lists of whole messages (`messages/partial`, `messages/complete`).
    MessageSnapshot,
    MessageMetadata,
    Updates,
    Values,
    Error,
    End,
    Other,
}

impl StreamEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn kind(&self) -> StreamEventKind {
        // Subgraph events arrive as `messages|ns:...` / `updates|ns:...`.
        let name = self.event.split('|').next().unwrap_or_default();
        match name {
            "metadata" => StreamEventKind::Metadata,
            "messages" => StreamEventKind::MessageChunk,
            "messages/partial" | "messages/complete" => StreamEventKind::MessageSnapshot,
            "messages/metadata" => StreamEventKind::MessageMetadata,
            "updates" => StreamEventKind::Updates,
            "values" => StreamEventKind::Values,
            "error" => StreamEventKind::Error,
            "end" => StreamEventKind::End,
            _ => StreamEventKind::Other,
        }
    }
}

// ─── Serde helpers ───────────────────────────────────────────────────────────

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Thread values are graph-defined; anything that is not a messages-bearing
/// object becomes an empty value set instead of failing the whole payload.
fn lenient_values<'de, D>(deserializer: D) -> Result<ThreadValues, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}
