use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::html::to_html;
use crate::sniff::{SnifferChain, is_sql_error};
use crate::sql::format_query;
use crate::text::{TextStyle, to_text};
use crate::tree::{ArgsBody, CardsView, PanelView, Theme, ToolCall, ToolKind, ToolView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Html,
    Text { color: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    tool_name: String,
    args_text: String,
    result: Option<String>,
    theme: Theme,
    format: OutputFormat,
}

impl CacheKey {
    fn new(call: &ToolCall, theme: Theme, format: OutputFormat) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            args_text: call.args_text.clone(),
            result: call.result.as_ref().map(Value::to_string),
            theme,
            format,
        }
    }
}

/// Maps a tool invocation to a display tree and renders it, memoizing the
/// formatted output per invocation, theme and format.
pub struct ToolResultRenderer {
    sniffers: SnifferChain,
    cache: Mutex<HashMap<CacheKey, Arc<str>>>,
}

impl Default for ToolResultRenderer {
    fn default() -> Self {
        Self::new(SnifferChain::default())
    }
}

impl ToolResultRenderer {
    pub fn new(sniffers: SnifferChain) -> Self {
        Self {
            sniffers,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn sniffers(&self) -> &SnifferChain {
        &self.sniffers
    }

    /// Decide the layout for `call`.
    ///
    /// Schema lookups and database errors get a collapsed panel; everything
    /// else gets an invocation card plus a result section.
    pub fn view(&self, call: &ToolCall) -> ToolView {
        let kind = call.kind();
        let result = call.result.as_ref().map(|r| self.sniffers.render_value(r));
        let errored = call.result_str().is_some_and(is_sql_error);

        if kind == ToolKind::Schema || errored {
            return ToolView::Panel(PanelView {
                tool_name: call.tool_name.clone(),
                args_text: call.args_text.clone(),
                result,
                collapsed: true,
            });
        }

        ToolView::Cards(CardsView {
            tool_name: call.tool_name.clone(),
            args: format_args(kind, &call.args_text),
            result,
        })
    }

    pub fn render(&self, call: &ToolCall, theme: Theme, format: OutputFormat) -> Arc<str> {
        let key = CacheKey::new(call, theme, format);
        if let Some(hit) = self.lock_cache().get(&key) {
            return hit.clone();
        }

        let rendered: Arc<str> = render_view(&self.view(call), theme, format).into();
        self.lock_cache().insert(key, rendered.clone());
        rendered
    }

    pub fn html(&self, call: &ToolCall, theme: Theme) -> Arc<str> {
        self.render(call, theme, OutputFormat::Html)
    }

    pub fn text(&self, call: &ToolCall, theme: Theme, color: bool) -> Arc<str> {
        self.render(call, theme, OutputFormat::Text { color })
    }

    pub fn cached_outputs(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<str>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render an already-built view, e.g. a panel the user has expanded.
pub fn render_view(view: &ToolView, theme: Theme, format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => to_html(view, theme),
        OutputFormat::Text { color } => to_text(view, TextStyle { theme, color }),
    }
}

fn format_args(kind: ToolKind, args_text: &str) -> ArgsBody {
    let parsed = serde_json::from_str::<Value>(args_text);
    if let Ok(value) = &parsed {
        if kind == ToolKind::Query
            && let Some(query) = value.get("query").and_then(Value::as_str)
        {
            return ArgsBody::Sql {
                query: query.to_string(),
                formatted: format_query(query),
            };
        }
        if value.is_object()
            && let Ok(pretty) = serde_json::to_string_pretty(value)
        {
            return ArgsBody::Json(pretty);
        }
    } else if kind == ToolKind::Query {
        debug!("Query tool arguments are not JSON; showing them verbatim");
    }
    ArgsBody::Plain(args_text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ResultBody, Table};
    use serde_json::json;

    fn renderer() -> ToolResultRenderer {
        ToolResultRenderer::default()
    }

    #[test]
    fn schema_tool_uses_collapsed_panel() {
        let call = ToolCall::new("sql_db_schema", r#"{"table_names": "orders"}"#)
            .with_result(json!("CREATE TABLE orders (id INTEGER)"));
        let view = renderer().view(&call);
        assert!(view.is_collapsed());
        assert_eq!(
            view.result(),
            Some(&ResultBody::Text("CREATE TABLE orders (id INTEGER)".to_string()))
        );
    }

    #[test]
    fn error_results_render_sql_error_panel_for_any_tool() {
        for name in ["sql_db_query", "web_search", "sql_db_schema"] {
            let call = ToolCall::new(name, r#"{"query": "select * from nope"}"#)
                .with_result(json!(" Error: (sqlite3.OperationalError) no such table: nope"));
            let view = renderer().view(&call);
            assert!(view.is_collapsed(), "{name} should collapse");
            assert_eq!(view.result(), Some(&ResultBody::SqlError));
        }
    }

    #[test]
    fn query_tool_formats_sql_and_tabulates_rows() {
        let call = ToolCall::new("sql_db_query", r#"{"query": "select id, name from users"}"#)
            .with_result(json!("[(1, 'a'), (2, 'b')]"));
        let ToolView::Cards(cards) = renderer().view(&call) else {
            panic!("expected cards");
        };
        assert_eq!(
            cards.args,
            ArgsBody::Sql {
                query: "select id, name from users".to_string(),
                formatted: "SELECT\n  id,\n  name\nFROM\n  users".to_string(),
            }
        );
        assert_eq!(
            cards.result,
            Some(ResultBody::Table(Table::new(vec![
                vec!["1".to_string(), "a".to_string()],
                vec!["2".to_string(), "b".to_string()],
            ])))
        );
    }

    #[test]
    fn date_cells_are_normalized_in_results() {
        let call = ToolCall::new("sql_db_query", r#"{"query": "select day from t"}"#)
            .with_result(json!("[(datetime.date(2024, 1, 5),)]"));
        let view = renderer().view(&call);
        assert_eq!(
            view.result(),
            Some(&ResultBody::Table(Table::new(vec![vec!["2024-1-5".to_string()]])))
        );
    }

    #[test]
    fn other_tools_pretty_print_object_args() {
        let call = ToolCall::new("web_search", r#"{"q":"rust"}"#);
        let ToolView::Cards(cards) = renderer().view(&call) else {
            panic!("expected cards");
        };
        assert_eq!(cards.args, ArgsBody::Json("{\n  \"q\": \"rust\"\n}".to_string()));
        assert_eq!(cards.result, None);

        let plain = ToolCall::new("sql_db_query", "not json");
        let ToolView::Cards(cards) = renderer().view(&plain) else {
            panic!("expected cards");
        };
        assert_eq!(cards.args, ArgsBody::Plain("not json".to_string()));
    }

    #[test]
    fn query_with_url_is_left_verbatim() {
        let call = ToolCall::new(
            "sql_db_query",
            r#"{"query": "select *\n   from links where href = 'http://a.b'"}"#,
        );
        let ToolView::Cards(cards) = renderer().view(&call) else {
            panic!("expected cards");
        };
        assert_eq!(cards.args.copy_text(), Some("select *\nfrom links where href = 'http://a.b'"));
    }

    #[test]
    fn rendered_output_is_cached_per_theme_and_format() {
        let renderer = renderer();
        let call = ToolCall::new("sql_db_query", r#"{"query": "select 1"}"#)
            .with_result(json!("[(1,)]"));

        let first = renderer.html(&call, Theme::Light);
        let second = renderer.html(&call, Theme::Light);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(renderer.cached_outputs(), 1);

        renderer.html(&call, Theme::Dark);
        let text = renderer.text(&call, Theme::Light, false);
        assert_eq!(renderer.cached_outputs(), 3);
        assert!(text.contains("SELECT\n    1"));

        renderer.clear_cache();
        assert_eq!(renderer.cached_outputs(), 0);
    }
}
