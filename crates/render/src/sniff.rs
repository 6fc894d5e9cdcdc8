//! Content sniffers: best-effort detectors that turn a raw tool-result
//! string into a structured body. A [`SnifferChain`] tries them in order and
//! the first match wins; anything unmatched is shown as raw text.

use serde_json::Value;
use tracing::trace;

use crate::tree::{ResultBody, Table};
use crate::tuple::parse_tuple_list;

pub trait ContentSniffer: Send + Sync {
    fn name(&self) -> &'static str;
    fn sniff(&self, text: &str) -> Option<ResultBody>;
}

/// Database error strings (`Error: ...`).
pub struct SqlErrorSniffer;

impl ContentSniffer for SqlErrorSniffer {
    fn name(&self) -> &'static str {
        "sql-error"
    }

    fn sniff(&self, text: &str) -> Option<ResultBody> {
        is_sql_error(text).then_some(ResultBody::SqlError)
    }
}

pub fn is_sql_error(text: &str) -> bool {
    text.trim().starts_with("Error:")
}

/// JSON objects and arrays, pretty-printed.
pub struct JsonSniffer;

impl ContentSniffer for JsonSniffer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn sniff(&self, text: &str) -> Option<ResultBody> {
        let trimmed = text.trim();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return None;
        }
        let value: Value = serde_json::from_str(trimmed).ok()?;
        pretty_json(&value).map(ResultBody::Json)
    }
}

/// Python-style lists of tuples, as printed for query rows.
pub struct TupleTableSniffer;

impl ContentSniffer for TupleTableSniffer {
    fn name(&self) -> &'static str {
        "tuple-table"
    }

    fn sniff(&self, text: &str) -> Option<ResultBody> {
        parse_tuple_list(text).map(ResultBody::Table)
    }
}

/// A closure sniffer, for ad-hoc detectors.
pub struct FnSniffer<F> {
    name: &'static str,
    sniff: F,
}

impl<F> FnSniffer<F>
where
    F: Fn(&str) -> Option<ResultBody> + Send + Sync,
{
    pub fn new(name: &'static str, sniff: F) -> Self {
        Self { name, sniff }
    }
}

impl<F> ContentSniffer for FnSniffer<F>
where
    F: Fn(&str) -> Option<ResultBody> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn sniff(&self, text: &str) -> Option<ResultBody> {
        (self.sniff)(text)
    }
}

pub struct SnifferChain {
    sniffers: Vec<Box<dyn ContentSniffer>>,
}

impl Default for SnifferChain {
    /// SQL error, then JSON, then tuple table.
    fn default() -> Self {
        Self::empty()
            .with(SqlErrorSniffer)
            .with(JsonSniffer)
            .with(TupleTableSniffer)
    }
}

impl SnifferChain {
    pub fn empty() -> Self {
        Self {
            sniffers: Vec::new(),
        }
    }

    /// Append a sniffer; it runs after every sniffer already in the chain.
    pub fn with(mut self, sniffer: impl ContentSniffer + 'static) -> Self {
        self.sniffers.push(Box::new(sniffer));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sniffers.iter().map(|s| s.name()).collect()
    }

    pub fn sniff(&self, text: &str) -> Option<ResultBody> {
        self.sniffers.iter().find_map(|sniffer| {
            let body = sniffer.sniff(text);
            if body.is_some() {
                trace!("Tool result matched sniffer {}", sniffer.name());
            }
            body
        })
    }

    /// Structured body for a tool result. Strings go through the chain and
    /// fall back to raw text; any other JSON value is pretty-printed.
    pub fn render_value(&self, value: &Value) -> ResultBody {
        match value {
            Value::String(text) => self
                .sniff(text)
                .unwrap_or_else(|| ResultBody::Text(text.clone())),
            other => pretty_json(other)
                .map(ResultBody::Json)
                .unwrap_or_else(|| ResultBody::Text(other.to_string())),
        }
    }
}

fn pretty_json(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) | Value::Array(_) => serde_json::to_string_pretty(value).ok(),
        _ => None,
    }
}

/// Rows as an owned table, for sniffers built outside this crate.
pub fn table(rows: Vec<Vec<String>>) -> ResultBody {
    ResultBody::Table(Table::new(rows))
}
