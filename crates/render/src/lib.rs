//! Tool-call rendering: decides how a tool invocation and its result are
//! laid out and produces HTML or terminal text for it.

pub mod error;
pub mod highlight;
pub mod html;
pub mod renderer;
pub mod sniff;
pub mod sql;
pub mod text;
pub mod tree;
pub mod tuple;

pub use error::RenderError;
pub use renderer::{OutputFormat, ToolResultRenderer, render_view};
pub use sniff::{ContentSniffer, FnSniffer, SnifferChain};
pub use text::TextStyle;
pub use tree::{
    ArgsBody, CardsView, PanelView, ResultBody, Table, Theme, ToolCall, ToolKind, ToolView,
};
