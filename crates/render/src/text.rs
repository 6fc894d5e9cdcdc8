//! Plain-terminal rendering of tool views.

use unicode_width::UnicodeWidthStr;

use crate::highlight::{Language, terminal_or_plain};
use crate::tree::{ArgsBody, ResultBody, Table, Theme, ToolView};

/// Options for [`to_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextStyle {
    pub theme: Theme,
    /// Emit ANSI colors for code blocks.
    pub color: bool,
}

pub fn to_text(view: &ToolView, style: TextStyle) -> String {
    let mut lines = Vec::new();
    match view {
        ToolView::Panel(panel) => {
            let marker = if panel.collapsed { "▸" } else { "▾" };
            lines.push(format!("{marker} Used tool: {}", panel.tool_name));
            if !panel.collapsed {
                lines.push(indent(&panel.args_text));
                if let Some(result) = &panel.result {
                    lines.push("  Result:".to_string());
                    lines.push(indent(&result_text(result, style)));
                }
            }
        }
        ToolView::Cards(cards) => {
            lines.push(format!("✓ Used tool: {}", cards.tool_name));
            lines.push(indent(&args_text(&cards.args, style)));
            if let Some(result) = &cards.result {
                lines.push("Result:".to_string());
                lines.push(indent(&result_text(result, style)));
            }
        }
    }
    lines.join("\n")
}

fn code(text: &str, language: Language, style: TextStyle) -> String {
    if style.color {
        terminal_or_plain(text, language, style.theme)
    } else {
        text.to_string()
    }
}

fn args_text(args: &ArgsBody, style: TextStyle) -> String {
    match args {
        ArgsBody::Sql { formatted, .. } => code(formatted, Language::Sql, style),
        ArgsBody::Json(pretty) => code(pretty, Language::Json, style),
        ArgsBody::Plain(text) => text.clone(),
    }
}

fn result_text(result: &ResultBody, style: TextStyle) -> String {
    match result {
        ResultBody::SqlError => ResultBody::SQL_ERROR_TEXT.to_string(),
        ResultBody::Json(pretty) => code(pretty, Language::Json, style),
        ResultBody::Table(table) => table_text(table),
        ResultBody::Text(text) => text.clone(),
    }
}

/// Columns padded to a common display width, separated by ` | `.
pub fn table_text(table: &Table) -> String {
    let mut widths = vec![0usize; table.column_count()];
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let pad = widths[i].saturating_sub(UnicodeWidthStr::width(cell.as_str()));
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CardsView, PanelView};

    #[test]
    fn table_columns_align_by_display_width() {
        let table = Table::new(vec![
            vec!["1".to_string(), "東京".to_string(), "x".to_string()],
            vec!["22".to_string(), "Paris".to_string()],
        ]);
        assert_eq!(table_text(&table), "1  | 東京  | x\n22 | Paris");
    }

    #[test]
    fn collapsed_panel_shows_only_header() {
        let mut view = ToolView::Panel(PanelView {
            tool_name: "sql_db_schema".to_string(),
            args_text: "orders".to_string(),
            result: Some(ResultBody::Text("CREATE TABLE orders".to_string())),
            collapsed: true,
        });
        assert_eq!(to_text(&view, TextStyle::default()), "▸ Used tool: sql_db_schema");

        view.toggle();
        assert_eq!(
            to_text(&view, TextStyle::default()),
            "▾ Used tool: sql_db_schema\n  orders\n  Result:\n  CREATE TABLE orders"
        );
    }

    #[test]
    fn cards_list_args_then_result() {
        let view = ToolView::Cards(CardsView {
            tool_name: "sql_db_query".to_string(),
            args: ArgsBody::Sql {
                query: "select 1".to_string(),
                formatted: "SELECT\n  1".to_string(),
            },
            result: Some(ResultBody::SqlError),
        });
        assert_eq!(
            to_text(&view, TextStyle::default()),
            "✓ Used tool: sql_db_query\n  SELECT\n    1\nResult:\n  SQL Error"
        );
    }
}
