use std::io::IsTerminal;

use serde::Serialize;
use serde_json::Value;
use threadline_api::{Message, MessageRole};
use threadline_core::{DirectorySnapshot, ThreadLabeler};
use threadline_render::ToolCall;

use crate::session::Session;

/// Colors only on a terminal, and never with `NO_COLOR` set.
pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// One row of `threadline threads --json`.
#[derive(Debug, Serialize)]
pub struct ThreadRow {
    pub thread_id: String,
    pub title: String,
    pub time: String,
    pub created_at: String,
    pub active: bool,
}

pub fn thread_rows(snapshot: &DirectorySnapshot, labeler: &ThreadLabeler) -> Vec<ThreadRow> {
    snapshot
        .threads
        .iter()
        .map(|entry| {
            let label = labeler.label(entry);
            ThreadRow {
                active: snapshot.is_active(&label.thread_id),
                thread_id: label.thread_id,
                title: label.title,
                time: label.time,
                created_at: entry.created_at.to_rfc3339(),
            }
        })
        .collect()
}

pub fn print_thread_rows(rows: &[ThreadRow]) {
    if rows.is_empty() {
        println!("No threads found.");
        return;
    }
    for (i, row) in rows.iter().enumerate() {
        let marker = if row.active { "*" } else { " " };
        println!(
            "{marker} {:>3}  {:<43}  {:<22}  {}",
            i + 1,
            row.title,
            row.time,
            row.thread_id
        );
    }
}

/// Tool invocations requested by `message`, each paired with the tool
/// message that answered it (if any) among `messages`.
pub fn tool_calls_of(message: &Message, messages: &[Message]) -> Vec<ToolCall> {
    message
        .tool_calls
        .iter()
        .map(|call| {
            let args_text = match &call.args {
                Value::String(raw) => raw.clone(),
                Value::Null => "{}".to_string(),
                other => other.to_string(),
            };
            let answer = call.id.as_deref().and_then(|id| {
                messages.iter().find(|m| {
                    m.role == MessageRole::Tool && m.tool_call_id.as_deref() == Some(id)
                })
            });
            ToolCall {
                tool_name: call.name.clone(),
                args_text,
                result: answer.map(tool_result_value),
            }
        })
        .collect()
}

/// Find the invocation a tool message answers.
pub fn tool_call_for(tool_message: &Message, messages: &[Message]) -> Option<ToolCall> {
    let id = tool_message.tool_call_id.as_deref()?;
    let (owner, index) = messages
        .iter()
        .filter(|m| m.role.is_assistant())
        .find_map(|m| {
            m.tool_calls
                .iter()
                .position(|call| call.id.as_deref() == Some(id))
                .map(|index| (m, index))
        })?;
    tool_calls_of(owner, messages).into_iter().nth(index)
}

fn tool_result_value(message: &Message) -> Value {
    Value::String(message.content.joined_text())
}

pub fn print_tool_call(session: &Session, call: &ToolCall) {
    println!(
        "{}",
        session.renderer.text(call, session.theme, use_color())
    );
}

/// Print a conversation, rendering tool calls inline with their results.
pub fn print_history(session: &Session, messages: &[Message]) {
    for message in messages {
        match &message.role {
            MessageRole::Human => {
                println!("you: {}", message.display_text().unwrap_or_default());
            }
            role if role.is_assistant() => {
                let text = message.content.joined_text();
                if !text.trim().is_empty() {
                    println!("assistant: {text}");
                }
                for call in tool_calls_of(message, messages) {
                    print_tool_call(session, &call);
                }
            }
            MessageRole::Tool => {}
            other => {
                if let Some(text) = message.display_text() {
                    println!("{other}: {text}");
                }
            }
        }
    }
}
