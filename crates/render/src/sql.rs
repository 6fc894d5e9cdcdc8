//! Small SQL pretty-printer: uppercase keywords, one line per major clause,
//! clause bodies indented by two spaces.
//!
//! Only the top level of a statement is laid out; parenthesised subqueries
//! and expressions stay on one line.

const INDENT: usize = 2;

const KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "AVG", "BETWEEN", "BY", "CASE", "CAST", "COALESCE", "COUNT",
    "CROSS", "DELETE", "DESC", "DISTINCT", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FROM",
    "FULL", "GROUP", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN",
    "LEFT", "LIKE", "ILIKE", "LIMIT", "MAX", "MIN", "NATURAL", "NOT", "NULL", "OFFSET", "ON",
    "OR", "ORDER", "OUTER", "OVER", "PARTITION", "RIGHT", "ROUND", "SELECT", "SET", "SUM",
    "THEN", "TRUE", "UNION", "UPDATE", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

/// Clauses that start a new line at column zero. Longest match first.
const MAJOR_CLAUSES: &[&[&str]] = &[
    &["INSERT", "INTO"],
    &["DELETE", "FROM"],
    &["GROUP", "BY"],
    &["ORDER", "BY"],
    &["UNION", "ALL"],
    &["SELECT"],
    &["FROM"],
    &["WHERE"],
    &["HAVING"],
    &["LIMIT"],
    &["OFFSET"],
    &["UNION"],
    &["INTERSECT"],
    &["EXCEPT"],
    &["VALUES"],
    &["UPDATE"],
    &["SET"],
    &["WITH"],
];

/// Join variants, placed on their own indented line inside a FROM body.
const JOIN_CLAUSES: &[&[&str]] = &[
    &["LEFT", "OUTER", "JOIN"],
    &["RIGHT", "OUTER", "JOIN"],
    &["FULL", "OUTER", "JOIN"],
    &["LEFT", "JOIN"],
    &["RIGHT", "JOIN"],
    &["FULL", "JOIN"],
    &["INNER", "JOIN"],
    &["CROSS", "JOIN"],
    &["NATURAL", "JOIN"],
    &["JOIN"],
];

/// Clause bodies where top-level commas break the line.
const LIST_CLAUSES: &[&str] = &["SELECT", "GROUP BY", "ORDER BY", "SET"];
/// Clause bodies where top-level AND/OR break the line.
const CONDITION_CLAUSES: &[&str] = &["WHERE", "HAVING"];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Number(String),
    Operator(String),
    Comment(String),
    Punct(char),
}

/// `true` when the query embeds a literal URL. Such queries are shown as
/// written because reflowing would break the URL string.
pub fn embeds_url(query: &str) -> bool {
    query.contains("http://") || query.contains("https://")
}

/// Format a query for display. Queries embedding a URL only have each line
/// trimmed.
pub fn format_query(query: &str) -> String {
    if embeds_url(query) {
        return query
            .trim()
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
    }
    format_sql(query)
}

pub fn format_sql(sql: &str) -> String {
    let tokens = tokenize(sql);
    let mut out = LineWriter::default();
    let mut clause = String::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        if depth == 0 {
            if let Some(len) = match_words(&tokens[i..], MAJOR_CLAUSES) {
                clause = join_upper(&tokens[i..i + len]);
                out.newline(0);
                out.push(&clause, Spacing::Normal);
                out.newline(INDENT);
                i += len;
                continue;
            }
            if let Some(len) = match_words(&tokens[i..], JOIN_CLAUSES) {
                out.newline(INDENT);
                out.push(&join_upper(&tokens[i..i + len]), Spacing::Normal);
                i += len;
                continue;
            }
            if CONDITION_CLAUSES.contains(&clause.as_str())
                && let Token::Word(word) = &tokens[i]
                && matches!(word.to_ascii_uppercase().as_str(), "AND" | "OR")
            {
                out.newline(INDENT);
                out.push(&word.to_ascii_uppercase(), Spacing::Normal);
                i += 1;
                continue;
            }
        }

        match &tokens[i] {
            Token::Punct('(') => {
                let previous = i.checked_sub(1).and_then(|p| tokens.get(p));
                let glued = matches!(previous, Some(Token::Word(w)) if is_callable(w));
                out.push("(", if glued { Spacing::Glued } else { Spacing::Normal });
                depth += 1;
            }
            Token::Punct(')') => {
                depth = depth.saturating_sub(1);
                out.push(")", Spacing::Glued);
            }
            Token::Punct(',') => {
                out.push(",", Spacing::Glued);
                if depth == 0 && LIST_CLAUSES.contains(&clause.as_str()) {
                    out.newline(INDENT);
                }
            }
            Token::Punct(';') => {
                out.push(";", Spacing::Glued);
                clause.clear();
            }
            Token::Punct('.') => out.push(".", Spacing::Glued),
            Token::Punct(c) => out.push(&c.to_string(), Spacing::Normal),
            Token::Operator(op) if op == "::" => out.push(op, Spacing::Glued),
            Token::Operator(op) => out.push(op, Spacing::Normal),
            Token::Word(word) => {
                let upper = word.to_ascii_uppercase();
                if KEYWORDS.contains(&upper.as_str()) {
                    out.push(&upper, Spacing::Normal);
                } else {
                    out.push(word, Spacing::Normal);
                }
            }
            Token::Quoted(text) | Token::Number(text) => out.push(text, Spacing::Normal),
            Token::Comment(text) => {
                out.push(text, Spacing::Normal);
                if text.starts_with("--") {
                    out.newline(if clause.is_empty() { 0 } else { INDENT });
                }
            }
        }
        i += 1;
    }

    out.finish()
}

/// Functions and identifiers take their argument list without a space;
/// keywords such as `IN` or `AS` keep one.
fn is_callable(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    if !KEYWORDS.contains(&upper.as_str()) {
        return true;
    }
    matches!(
        upper.as_str(),
        "AVG" | "CAST" | "COALESCE" | "COUNT" | "MAX" | "MIN" | "ROUND" | "SUM" | "OVER"
    )
}

fn match_words(tokens: &[Token], candidates: &[&[&str]]) -> Option<usize> {
    candidates.iter().find_map(|words| {
        let matched = words.len() <= tokens.len()
            && words.iter().zip(tokens).all(|(expected, token)| {
                matches!(token, Token::Word(w) if w.eq_ignore_ascii_case(expected))
            });
        matched.then_some(words.len())
    })
}

fn join_upper(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter_map(|token| match token {
            Token::Word(w) => Some(w.to_ascii_uppercase()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Spacing {
    Normal,
    /// No space before.
    Glued,
}

#[derive(Default)]
struct LineWriter {
    lines: Vec<String>,
    current: String,
    /// Current line holds only indentation.
    fresh: bool,
}

impl LineWriter {
    fn newline(&mut self, indent: usize) {
        if !self.current.trim().is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
        self.current = " ".repeat(indent);
        self.fresh = true;
    }

    fn push(&mut self, text: &str, spacing: Spacing) {
        let after_open = self.current.ends_with('(') || self.current.ends_with('.');
        let needs_space = !self.fresh
            && !self.current.is_empty()
            && !after_open
            && spacing != Spacing::Glued;
        if needs_space {
            self.current.push(' ');
        }
        self.current.push_str(text);
        self.fresh = false;
    }

    fn finish(mut self) -> String {
        if !self.current.trim().is_empty() {
            self.lines.push(self.current);
        }
        self.lines
            .iter()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'-') {
            let end = chars[i..]
                .iter()
                .position(|&ch| ch == '\n')
                .map_or(chars.len(), |p| i + p);
            tokens.push(Token::Comment(chars[i..end].iter().collect::<String>().trim_end().to_string()));
            i = end;
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut end = i + 2;
            while end < chars.len() && !(chars[end] == '*' && chars.get(end + 1) == Some(&'/')) {
                end += 1;
            }
            end = (end + 2).min(chars.len());
            tokens.push(Token::Comment(chars[i..end].iter().collect()));
            i = end;
        } else if matches!(c, '\'' | '"' | '`') {
            let end = quoted_end(&chars, i);
            tokens.push(Token::Quoted(chars[i..end].iter().collect()));
            i = end;
        } else if c.is_ascii_digit() {
            let mut end = i + 1;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '.') {
                end += 1;
            }
            tokens.push(Token::Number(chars[i..end].iter().collect()));
            i = end;
        } else if c.is_alphanumeric() || c == '_' || c == '$' || c == '@' {
            let mut end = i + 1;
            while end < chars.len() && (chars[end].is_alphanumeric() || matches!(chars[end], '_' | '$')) {
                end += 1;
            }
            tokens.push(Token::Word(chars[i..end].iter().collect()));
            i = end;
        } else if let Some(op) = two_char_operator(c, chars.get(i + 1).copied()) {
            tokens.push(Token::Operator(op.to_string()));
            i += 2;
        } else if matches!(c, '=' | '<' | '>' | '+' | '-' | '*' | '/' | '%') {
            tokens.push(Token::Operator(c.to_string()));
            i += 1;
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }
    tokens
}

/// Index one past the closing quote. A doubled quote is an escaped quote.
fn quoted_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '\\' && quote != '`' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn two_char_operator(c: char, next: Option<char>) -> Option<&'static str> {
    match (c, next?) {
        ('<', '=') => Some("<="),
        ('>', '=') => Some(">="),
        ('<', '>') => Some("<>"),
        ('!', '=') => Some("!="),
        ('|', '|') => Some("||"),
        (':', ':') => Some("::"),
        _ => None,
    }
}
