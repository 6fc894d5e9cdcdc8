//! Title and time labels for the thread list.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use threadline_api::{Message, MessageRole, Thread};

use crate::directory::ThreadEntry;
use crate::resolver::ResolvedTime;
use crate::time::{format_label, from_epoch_number, parse_timestamp, timestamp_from_value};

pub const DEFAULT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 40;

static EPOCH_IN_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{10,}").unwrap());

/// Title shown for a thread: the first human message (or the first message
/// of any role), truncated to 40 characters.
pub fn thread_title(thread: &Thread) -> String {
    let messages = thread.messages();
    let first = messages
        .iter()
        .find(|m| m.role == MessageRole::Human)
        .or_else(|| messages.first());

    match first.and_then(Message::display_text).map(str::trim) {
        Some(text) if !text.is_empty() => truncate(text, TITLE_MAX_CHARS),
        _ => DEFAULT_TITLE.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Creation time recoverable from the thread payload alone, for threads whose
/// runs could not be resolved.
pub fn legacy_creation_time(thread: &Thread) -> Option<DateTime<Utc>> {
    if let Some(at) = thread
        .metadata
        .get("creation_time")
        .and_then(timestamp_from_value)
    {
        return Some(at);
    }
    if let Some(at) = EPOCH_IN_ID_RE
        .find(&thread.thread_id)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(from_epoch_number)
    {
        return Some(at);
    }
    // Only ids shaped like an ISO date-time, never bare dates or digit runs.
    let id = &thread.thread_id;
    if id.contains('T')
        && id.contains('-')
        && let Some(at) = parse_timestamp(id)
    {
        return Some(at);
    }
    thread
        .messages()
        .first()
        .and_then(|m| m.extra.get("created_at"))
        .and_then(timestamp_from_value)
}

/// Formatted time labels by thread id. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct FormattedTimeCache {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl FormattedTimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread_id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
    }

    fn insert(&self, thread_id: &str, label: String) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(thread_id.to_string(), label);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLabel {
    pub thread_id: String,
    pub title: String,
    pub time: String,
}

pub struct ThreadLabeler {
    cache: FormattedTimeCache,
    offset: FixedOffset,
}

impl ThreadLabeler {
    /// Labels rendered in the given UTC offset.
    pub fn new(offset: FixedOffset) -> Self {
        Self::with_cache(FormattedTimeCache::new(), offset)
    }

    /// Labels rendered in the machine's current local offset.
    pub fn local() -> Self {
        Self::new(*chrono::Local::now().offset())
    }

    pub fn with_cache(cache: FormattedTimeCache, offset: FixedOffset) -> Self {
        Self { cache, offset }
    }

    pub fn cache(&self) -> &FormattedTimeCache {
        &self.cache
    }

    pub fn label(&self, entry: &ThreadEntry) -> ThreadLabel {
        let resolved = ResolvedTime {
            at: entry.created_at,
            source: entry.source,
        };
        ThreadLabel {
            thread_id: entry.thread_id().to_string(),
            title: thread_title(&entry.thread),
            time: self.time_label(&entry.thread, Some(resolved)),
        }
    }

    /// Resolved time when stable, else the legacy chain, else the unstable
    /// resolution or now. Only stable labels are cached.
    pub fn time_label(&self, thread: &Thread, resolved: Option<ResolvedTime>) -> String {
        if let Some(label) = self.cache.get(&thread.thread_id) {
            return label;
        }

        let stable = resolved
            .filter(ResolvedTime::is_stable)
            .map(|r| r.at)
            .or_else(|| legacy_creation_time(thread));
        if let Some(at) = stable {
            let label = format_label(at, self.offset);
            self.cache.insert(&thread.thread_id, label.clone());
            return label;
        }

        let at = resolved.map_or_else(Utc::now, |r| r.at);
        format_label(at, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TimeSource;
    use crate::testing::thread;
    use chrono::TimeZone;
    use serde_json::json;
    use threadline_api::{ContentPart, MessageContent};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn title_prefers_first_human_message() {
        let mut ai = Message::human("assistant first");
        ai.role = MessageRole::Ai;
        let t = thread("t", vec![ai, Message::human("  How many orders?  ")]);
        assert_eq!(thread_title(&t), "How many orders?");
    }

    #[test]
    fn title_reads_first_text_part_and_direct_text() {
        let parts = Message::new(
            MessageRole::Human,
            MessageContent::Parts(vec![ContentPart::text("from parts")]),
        );
        assert_eq!(thread_title(&thread("t", vec![parts])), "from parts");

        let mut direct = Message::new(MessageRole::Human, MessageContent::Text(String::new()));
        direct.text = Some("direct".to_string());
        assert_eq!(thread_title(&thread("t", vec![direct])), "direct");

        // A parts list without a text part has no title text of its own.
        let mut image_only = Message::new(
            MessageRole::Human,
            MessageContent::Parts(vec![ContentPart {
                kind: "image_url".to_string(),
                ..ContentPart::text("")
            }]),
        );
        image_only.text = Some("ignored".to_string());
        assert_eq!(thread_title(&thread("t", vec![image_only])), DEFAULT_TITLE);
    }

    #[test]
    fn title_defaults_and_truncates() {
        assert_eq!(thread_title(&thread("t", Vec::new())), DEFAULT_TITLE);

        let long = "a".repeat(45);
        let title = thread_title(&thread("t", vec![Message::human(long)]));
        assert_eq!(title, format!("{}...", "a".repeat(40)));

        let exact = "é".repeat(40);
        assert_eq!(thread_title(&thread("t", vec![Message::human(exact.clone())])), exact);
    }

    #[test]
    fn legacy_chain_order() {
        let mut t = thread("thread-1700000000123", Vec::new());
        t.metadata.insert("creation_time".to_string(), json!("2024-01-05T00:00:00Z"));
        assert_eq!(
            legacy_creation_time(&t),
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        );

        t.metadata.clear();
        assert_eq!(
            legacy_creation_time(&t).map(|at| at.timestamp_millis()),
            Some(1_700_000_000_123)
        );

        let dated = thread("2024-02-02T08:30:00Z", Vec::new());
        assert_eq!(
            legacy_creation_time(&dated),
            Some(Utc.with_ymd_and_hms(2024, 2, 2, 8, 30, 0).unwrap())
        );

        let mut first = Message::human("hi");
        first.extra.insert("created_at".to_string(), json!(1_700_000_000));
        let from_message = thread("opaque", vec![first]);
        assert_eq!(
            legacy_creation_time(&from_message).map(|at| at.timestamp()),
            Some(1_700_000_000)
        );

        assert_eq!(legacy_creation_time(&thread("opaque", Vec::new())), None);
    }

    #[test]
    fn ids_need_date_time_shape_to_count_as_dates() {
        assert_eq!(legacy_creation_time(&thread("2024-02-02", Vec::new())), None);
        assert_eq!(legacy_creation_time(&thread("123456789", Vec::new())), None);
        assert_eq!(legacy_creation_time(&thread("Thread-a", Vec::new())), None);

        let naive = thread("2024-02-02T08:30:00", Vec::new());
        assert_eq!(
            legacy_creation_time(&naive),
            Some(Utc.with_ymd_and_hms(2024, 2, 2, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn stable_labels_are_cached_fallbacks_are_not() {
        let labeler = ThreadLabeler::new(utc());
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 15, 7, 0).unwrap();

        let fallback = ResolvedTime {
            at,
            source: TimeSource::Fallback,
        };
        let t = thread("opaque", Vec::new());
        assert_eq!(labeler.time_label(&t, Some(fallback)), "Jan 5, 2024 3:07 PM");
        assert!(labeler.cache().is_empty());

        let resolved = ResolvedTime {
            at,
            source: TimeSource::EarliestRun,
        };
        labeler.time_label(&t, Some(resolved));
        assert_eq!(labeler.cache().get("opaque").as_deref(), Some("Jan 5, 2024 3:07 PM"));

        // Cached label wins over a later, different resolution.
        let later = ResolvedTime {
            at: at + chrono::Duration::days(1),
            source: TimeSource::Cached,
        };
        assert_eq!(labeler.time_label(&t, Some(later)), "Jan 5, 2024 3:07 PM");
    }

    #[test]
    fn legacy_time_beats_fallback() {
        let labeler = ThreadLabeler::new(utc());
        let mut t = thread("opaque", Vec::new());
        t.metadata.insert("creation_time".to_string(), json!(1_704_467_220_000_i64));
        let fallback = ResolvedTime {
            at: Utc::now(),
            source: TimeSource::Fallback,
        };
        assert_eq!(labeler.time_label(&t, Some(fallback)), "Jan 5, 2024 3:07 PM");
        assert_eq!(labeler.cache().len(), 1);
    }

    #[test]
    fn label_combines_title_and_time() {
        let labeler = ThreadLabeler::new(utc());
        let entry = ThreadEntry {
            thread: thread("t-9", vec![Message::human("top customers")]),
            created_at: Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 0).unwrap(),
            source: TimeSource::EarliestRun,
        };
        assert_eq!(
            labeler.label(&entry),
            ThreadLabel {
                thread_id: "t-9".to_string(),
                title: "top customers".to_string(),
                time: "Dec 31, 2023 11:59 PM".to_string(),
            }
        );
    }
}
