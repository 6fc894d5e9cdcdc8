use std::sync::LazyLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::{LinesWithEndings, as_24_bit_terminal_escaped};
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::html::escape_html;
use crate::tree::Theme;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Sql,
    Json,
}

impl Language {
    fn extension(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Json => "json",
        }
    }
}

fn syntax(language: Language) -> Result<&'static SyntaxReference> {
    SYNTAX_SET
        .find_syntax_by_extension(language.extension())
        .ok_or(RenderError::MissingSyntax(language.extension()))
}

fn theme(theme: Theme) -> Result<&'static SyntectTheme> {
    THEME_SET
        .themes
        .get(theme.syntect_name())
        .ok_or(RenderError::MissingTheme(theme.syntect_name()))
}

/// Highlighted `<pre>` block with inline styles.
pub fn highlight_html(code: &str, language: Language, theme_choice: Theme) -> Result<String> {
    let html = highlighted_html_for_string(code, &SYNTAX_SET, syntax(language)?, theme(theme_choice)?)?;
    Ok(html)
}

/// Code with 24-bit ANSI colors, reset at the end.
pub fn highlight_terminal(code: &str, language: Language, theme_choice: Theme) -> Result<String> {
    let mut highlighter = HighlightLines::new(syntax(language)?, theme(theme_choice)?);
    let mut out = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter.highlight_line(line, &SYNTAX_SET)?;
        out.push_str(&as_24_bit_terminal_escaped(&ranges[..], false));
    }
    out.push_str("\x1b[0m");
    Ok(out)
}

/// [`highlight_html`], falling back to an escaped plain block.
pub fn html_or_plain(code: &str, language: Language, theme_choice: Theme) -> String {
    highlight_html(code, language, theme_choice).unwrap_or_else(|e| {
        debug!("Falling back to plain code block: {e}");
        format!("<pre><code>{}</code></pre>", escape_html(code))
    })
}

/// [`highlight_terminal`], falling back to the code as-is.
pub fn terminal_or_plain(code: &str, language: Language, theme_choice: Theme) -> String {
    highlight_terminal(code, language, theme_choice).unwrap_or_else(|e| {
        debug!("Falling back to uncolored code: {e}");
        code.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_syntaxes_and_themes_resolve() {
        assert!(syntax(Language::Sql).is_ok());
        assert!(syntax(Language::Json).is_ok());
        assert!(theme(Theme::Light).is_ok());
        assert!(theme(Theme::Dark).is_ok());
    }

    #[test]
    fn highlighted_html_escapes_markup() {
        let html = html_or_plain("SELECT '<script>' AS x", Language::Sql, Theme::Dark);
        assert!(html.starts_with("<pre"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;"));
    }

    #[test]
    fn terminal_output_keeps_text_and_resets() {
        let out = terminal_or_plain("{\"a\": 1}\n", Language::Json, Theme::Light);
        assert!(out.ends_with("\x1b[0m"));
        assert!(out.contains('1'));
    }
}
