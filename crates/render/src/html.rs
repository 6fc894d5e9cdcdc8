//! HTML fragments for tool views. Every piece of tool-provided text is
//! escaped before it reaches markup.

use std::fmt::Write as _;

use crate::highlight::{Language, html_or_plain};
use crate::tree::{ArgsBody, CardsView, PanelView, ResultBody, Table, Theme, ToolView};

const TABLE_STYLE: &str = "<style>\
.tool-result-table{border-collapse:collapse;width:100%;font-size:0.875rem}\
.tool-result-table td{border:1px solid #e5e5e5;padding:0.25rem 0.5rem;text-align:left}\
.tool-result-table tr:nth-child(even){background-color:rgba(0,0,0,0.03)}\
</style>";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn to_html(view: &ToolView, theme: Theme) -> String {
    match view {
        ToolView::Panel(panel) => panel_html(panel, theme),
        ToolView::Cards(cards) => cards_html(cards, theme),
    }
}

fn header(tool_name: &str) -> String {
    format!("Used tool: <b>{}</b>", escape_html(tool_name))
}

fn panel_html(panel: &PanelView, theme: Theme) -> String {
    let mut out = String::new();
    let open = if panel.collapsed { "" } else { " open" };
    let _ = write!(
        out,
        "<details class=\"tool-panel\"{open}><summary>{}</summary>",
        header(&panel.tool_name)
    );
    let _ = write!(
        out,
        "<div class=\"tool-args\"><pre>{}</pre></div>",
        escape_html(&panel.args_text)
    );
    if let Some(result) = &panel.result {
        let _ = write!(
            out,
            "<div class=\"tool-result\"><p>Result:</p>{}</div>",
            result_html(result, theme)
        );
    }
    out.push_str("</details>");
    out
}

fn cards_html(cards: &CardsView, theme: Theme) -> String {
    let mut out = String::from("<div class=\"tool-cards\">");
    let _ = write!(
        out,
        "<div class=\"tool-card\"><div class=\"tool-card-header\">{}</div>\
         <div class=\"tool-card-body\">{}</div></div>",
        header(&cards.tool_name),
        args_html(&cards.args, theme)
    );
    if let Some(result) = &cards.result {
        let _ = write!(
            out,
            "<div class=\"tool-card\"><div class=\"tool-card-header\">Result:</div>\
             <div class=\"tool-card-body\">{}</div></div>",
            result_html(result, theme)
        );
    }
    out.push_str("</div>");
    out
}

fn copy_button(text: &str) -> String {
    format!(
        "<button class=\"copy\" data-copy=\"{}\" title=\"Copy\">Copy</button>",
        escape_html(text)
    )
}

fn code_block(code: &str, language: Language, theme: Theme) -> String {
    format!(
        "<div class=\"code-block\">{}{}</div>",
        copy_button(code),
        html_or_plain(code, language, theme)
    )
}

fn args_html(args: &ArgsBody, theme: Theme) -> String {
    match args {
        ArgsBody::Sql { formatted, .. } => code_block(formatted, Language::Sql, theme),
        ArgsBody::Json(pretty) => code_block(pretty, Language::Json, theme),
        ArgsBody::Plain(text) => format!("<pre>{}</pre>", escape_html(text)),
    }
}

fn result_html(result: &ResultBody, theme: Theme) -> String {
    match result {
        ResultBody::SqlError => format!("<pre>{}</pre>", ResultBody::SQL_ERROR_TEXT),
        ResultBody::Json(pretty) => code_block(pretty, Language::Json, theme),
        ResultBody::Table(table) => table_html(table),
        ResultBody::Text(text) => format!("<pre>{}</pre>", escape_html(text)),
    }
}

pub fn table_html(table: &Table) -> String {
    let mut out = String::from(TABLE_STYLE);
    out.push_str("<table class=\"tool-result-table\"><tbody>");
    for row in &table.rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape_html(cell));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}
