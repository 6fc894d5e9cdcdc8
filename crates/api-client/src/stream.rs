use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::{Result, anyhow};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use threadline_api::StreamEvent;

const CHANNEL_CAPACITY: usize = 64;

type EventSender = mpsc::Sender<Result<StreamEvent>>;

/// Server-sent events of one run, delivered in arrival order.
pub struct RunStream {
    rx: mpsc::Receiver<Result<StreamEvent>>,
}

impl RunStream {
    /// Decode an SSE response body on a background task.
    pub fn from_response(response: reqwest::Response) -> Self {
        let (tx, stream) = Self::channel(CHANNEL_CAPACITY);
        let body = response.bytes_stream();
        tokio::spawn(async move {
            if let Err(e) = pump(body, tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });
        stream
    }

    fn channel(capacity: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// A finished stream over a fixed list of events.
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let (tx, stream) = Self::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event.
            let _ = tx.try_send(Ok(event));
        }
        stream
    }

    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        self.rx.recv().await
    }

    /// Drain the stream, stopping at the first transport error.
    pub async fn collect_events(mut self) -> Result<Vec<StreamEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event?);
        }
        Ok(events)
    }
}

impl Stream for RunStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

async fn pump(
    mut body: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    tx: EventSender,
) -> Result<()> {
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| anyhow!("run stream interrupted: {e}"))?;
        for event in decoder.push(&chunk) {
            if tx.send(Ok(event)).await.is_err() {
                // Receiver dropped.
                return Ok(());
            }
        }
    }

    if let Some(event) = decoder.finish() {
        let _ = tx.send(Ok(event)).await;
    }
    Ok(())
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a blank line so multi-byte UTF-8 sequences split
/// across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame[..pos])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_frame(&String::from_utf8_lossy(&rest))
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let mut event = String::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if event.is_empty() && data_lines.is_empty() {
        return None;
    }
    if event.is_empty() {
        event = "message".to_string();
    }

    let raw = data_lines.join("\n");
    let data = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!("non-JSON data for SSE event {event}: {e}");
            Value::String(raw)
        })
    };

    Some(StreamEvent { event, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: metadata\ndata: {\"run_").is_empty());
        let events = decoder.push(b"id\": \"r-1\"}\n\nevent: end\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "metadata");
        assert_eq!(events[0].data, json!({"run_id": "r-1"}));

        let tail = decoder.finish().expect("trailing frame");
        assert_eq!(tail.event, "end");
        assert_eq!(tail.data, Value::Null);
    }

    #[test]
    fn handles_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"event: values\r\ndata: [1,\r\ndata: 2]\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!([1, 2]));
    }

    #[test]
    fn keeps_multibyte_text_split_mid_character() {
        let payload = "event: messages\ndata: [{\"type\":\"ai\",\"content\":\"héllo\"},{}]\n\n";
        let bytes = payload.as_bytes();
        let split = payload.find('é').expect("accent") + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(events[0].data[0]["content"], json!("héllo"));
    }

    #[test]
    fn comments_are_ignored_and_bad_json_is_kept_raw() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\n\nevent: error\ndata: boom\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "error");
        assert_eq!(events[0].data, json!("boom"));
    }

    #[tokio::test]
    async fn from_events_replays_in_order() {
        let stream = RunStream::from_events(vec![
            StreamEvent::new("metadata", json!({})),
            StreamEvent::new("end", Value::Null),
        ]);
        let events = stream.collect_events().await.unwrap();
        let names: Vec<_> = events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, vec!["metadata", "end"]);
    }
}
