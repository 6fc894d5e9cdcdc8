use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use threadline_render::{OutputFormat, Theme, ToolCall, ToolResultRenderer, render_view};

use crate::output::use_color;

pub struct RenderArgs {
    pub name: String,
    pub args: String,
    pub result: Option<String>,
    pub result_file: Option<PathBuf>,
    /// Parse the result as JSON instead of passing it through as a string.
    pub json_result: bool,
    pub html: bool,
    pub dark: bool,
    pub expand: bool,
}

/// `threadline render-tool`: render one tool invocation offline.
pub fn run_render(args: RenderArgs) -> Result<()> {
    let result_text = match (&args.result, &args.result_file) {
        (_, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read result file {}", path.display()))?,
        ),
        (Some(text), None) => Some(text.clone()),
        (None, None) => None,
    };
    let result = match result_text {
        Some(text) if args.json_result => Some(
            serde_json::from_str::<Value>(&text).context("Result is not valid JSON")?,
        ),
        Some(text) => Some(Value::String(text)),
        None => None,
    };

    let call = ToolCall {
        tool_name: args.name,
        args_text: args.args,
        result,
    };
    let theme = if args.dark { Theme::Dark } else { Theme::Light };
    let format = if args.html {
        OutputFormat::Html
    } else {
        OutputFormat::Text { color: use_color() }
    };

    let mut view = ToolResultRenderer::default().view(&call);
    if args.expand && view.is_collapsed() {
        view.toggle();
    }
    println!("{}", render_view(&view, theme, format));
    Ok(())
}
