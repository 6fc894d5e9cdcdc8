use serde_json::Value;
use tracing::{debug, warn};

use threadline_api::{Message, MessageContent, MessageRole, StreamEvent, StreamEventKind};

/// What one stream event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Ignored,
    RunStarted(String),
    /// Text appended to the message at `index`.
    Delta { index: usize, text: String },
    /// Whole messages inserted or replaced, by index.
    Upserted(Vec<usize>),
    /// The full message list was replaced from a `values` event.
    Replaced,
    Error(String),
    End,
}

/// Folds run-stream events into a message list, in arrival order.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    messages: Vec<Message>,
    run_id: Option<String>,
    error: Option<String>,
    finished: bool,
}

impl MessageAccumulator {
    pub fn new(history: Vec<Message>) -> Self {
        Self {
            messages: history,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn apply(&mut self, event: &StreamEvent) -> StreamUpdate {
        match event.kind() {
            StreamEventKind::Metadata => match event.data.get("run_id").and_then(Value::as_str) {
                Some(run_id) => {
                    self.run_id = Some(run_id.to_string());
                    StreamUpdate::RunStarted(run_id.to_string())
                }
                None => StreamUpdate::Ignored,
            },
            StreamEventKind::MessageSnapshot => self.apply_snapshot(&event.data),
            StreamEventKind::MessageChunk => self.apply_chunk(&event.data),
            StreamEventKind::Updates => self.apply_updates(&event.data),
            StreamEventKind::Values => {
                let Some(raw) = event.data.get("messages") else {
                    return StreamUpdate::Ignored;
                };
                match serde_json::from_value::<Vec<Message>>(raw.clone()) {
                    Ok(messages) => {
                        self.messages = messages;
                        StreamUpdate::Replaced
                    }
                    Err(e) => {
                        debug!("Skipping undecodable values event: {e}");
                        StreamUpdate::Ignored
                    }
                }
            }
            StreamEventKind::Error => {
                let message = error_message(&event.data);
                warn!("Run stream reported an error: {message}");
                self.error = Some(message.clone());
                StreamUpdate::Error(message)
            }
            StreamEventKind::End => {
                self.finished = true;
                StreamUpdate::End
            }
            StreamEventKind::MessageMetadata | StreamEventKind::Other => StreamUpdate::Ignored,
        }
    }

    fn apply_snapshot(&mut self, data: &Value) -> StreamUpdate {
        let incoming = decode_messages(data);
        // Only a streaming assistant message grows; anything else is a whole upsert.
        if let [message] = incoming.as_slice()
            && message.role.is_assistant()
        {
            let previous = self.position(message).map(|idx| text_of(&self.messages[idx]));
            let current = text_of(message);
            let index = self.upsert(message.clone());
            if let Some(text) = growth(previous.as_deref(), &current) {
                return StreamUpdate::Delta { index, text };
            }
            return StreamUpdate::Upserted(vec![index]);
        }
        self.upsert_all(incoming)
    }

    fn apply_chunk(&mut self, data: &Value) -> StreamUpdate {
        // `messages` events carry `[chunk, metadata]`.
        let raw = match data {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let mut chunk: Message = match serde_json::from_value(raw) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping undecodable message chunk: {e}");
                return StreamUpdate::Ignored;
            }
        };
        if chunk.role == MessageRole::AiChunk {
            chunk.role = MessageRole::Ai;
        }
        let text = chunk.content.joined_text();

        match self.position(&chunk) {
            Some(index) => {
                let target = &mut self.messages[index];
                let mut merged = target.content.joined_text();
                merged.push_str(&text);
                target.content = MessageContent::Text(merged);
                if !chunk.tool_calls.is_empty() {
                    target.tool_calls = chunk.tool_calls;
                }
                StreamUpdate::Delta { index, text }
            }
            None => {
                self.messages.push(chunk);
                StreamUpdate::Delta {
                    index: self.messages.len() - 1,
                    text,
                }
            }
        }
    }

    fn apply_updates(&mut self, data: &Value) -> StreamUpdate {
        let Some(nodes) = data.as_object() else {
            return StreamUpdate::Ignored;
        };
        let incoming: Vec<Message> = nodes
            .values()
            .filter_map(|update| update.get("messages"))
            .flat_map(decode_messages)
            .collect();
        self.upsert_all(incoming)
    }

    fn upsert_all(&mut self, incoming: Vec<Message>) -> StreamUpdate {
        if incoming.is_empty() {
            return StreamUpdate::Ignored;
        }
        let indices = incoming.into_iter().map(|m| self.upsert(m)).collect();
        StreamUpdate::Upserted(indices)
    }

    fn position(&self, message: &Message) -> Option<usize> {
        let id = message.id.as_deref()?;
        self.messages
            .iter()
            .position(|existing| existing.id.as_deref() == Some(id))
    }

    fn upsert(&mut self, message: Message) -> usize {
        match self.position(&message) {
            Some(index) => {
                self.messages[index] = message;
                index
            }
            None => {
                self.messages.push(message);
                self.messages.len() - 1
            }
        }
    }
}

fn decode_messages(value: &Value) -> Vec<Message> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

fn text_of(message: &Message) -> String {
    message.content.joined_text()
}

/// Suffix added to `previous` to produce `current`, when `current` extends it.
fn growth(previous: Option<&str>, current: &str) -> Option<String> {
    match previous {
        None if !current.is_empty() => Some(current.to_string()),
        Some(prev) if current.len() > prev.len() => {
            current.strip_prefix(prev).map(str::to_string)
        }
        _ => None,
    }
}

fn error_message(data: &Value) -> String {
    match data {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}
