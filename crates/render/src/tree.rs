//! Display tree produced for one tool invocation.

use serde_json::Value;

/// A tool invocation as it arrives from a message stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool_name: String,
    pub args_text: String,
    /// `None` while the tool is still running.
    pub result: Option<Value>,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, args_text: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args_text: args_text.into(),
            result: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn kind(&self) -> ToolKind {
        ToolKind::from_name(&self.tool_name)
    }

    /// The result as a string, when it is one.
    pub fn result_str(&self) -> Option<&str> {
        self.result.as_ref().and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Database schema lookup (`sql_db_schema`, `*db_schema`).
    Schema,
    /// Database query (`sql_db_query`, `*db_query`).
    Query,
    Other,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        if name.ends_with("db_schema") {
            Self::Schema
        } else if name.ends_with("db_query") {
            Self::Query
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }

    pub(crate) fn syntect_name(self) -> &'static str {
        match self {
            Self::Light => "InspiredGitHub",
            Self::Dark => "base16-ocean.dark",
        }
    }
}

/// Rendered form of the invocation's arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgsBody {
    /// A query pulled out of the args; `formatted` is what gets displayed and
    /// copied.
    Sql { query: String, formatted: String },
    Json(String),
    Plain(String),
}

impl ArgsBody {
    /// Text offered by the copy control, if this body has one.
    pub fn copy_text(&self) -> Option<&str> {
        match self {
            Self::Sql { formatted, .. } => Some(formatted.as_str()),
            Self::Json(pretty) => Some(pretty.as_str()),
            Self::Plain(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultBody {
    SqlError,
    /// Pretty-printed JSON.
    Json(String),
    Table(Table),
    Text(String),
}

impl ResultBody {
    pub const SQL_ERROR_TEXT: &'static str = "SQL Error";

    pub fn copy_text(&self) -> Option<&str> {
        match self {
            Self::Json(pretty) => Some(pretty.as_str()),
            _ => None,
        }
    }
}

/// Rows of cell strings. Rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Collapsible single panel used for schema lookups and database errors.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub tool_name: String,
    pub args_text: String,
    pub result: Option<ResultBody>,
    pub collapsed: bool,
}

/// Invocation card followed by a separate result section.
#[derive(Debug, Clone, PartialEq)]
pub struct CardsView {
    pub tool_name: String,
    pub args: ArgsBody,
    pub result: Option<ResultBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolView {
    Panel(PanelView),
    Cards(CardsView),
}

impl ToolView {
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Panel(panel) => &panel.tool_name,
            Self::Cards(cards) => &cards.tool_name,
        }
    }

    pub fn result(&self) -> Option<&ResultBody> {
        match self {
            Self::Panel(panel) => panel.result.as_ref(),
            Self::Cards(cards) => cards.result.as_ref(),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, Self::Panel(panel) if panel.collapsed)
    }

    /// Flip a panel between collapsed and expanded. Cards have no toggle.
    pub fn toggle(&mut self) -> bool {
        match self {
            Self::Panel(panel) => {
                panel.collapsed = !panel.collapsed;
                true
            }
            Self::Cards(_) => false,
        }
    }
}
