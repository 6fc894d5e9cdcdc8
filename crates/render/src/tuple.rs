//! Parser for textual lists of tuples such as `[(1, 'a'), (2, 'b')]`, the
//! shape database tools print query rows in.

use std::sync::LazyLock;

use regex::Regex;

use crate::tree::Table;

// `datetime.date(2024` ... `5)` after the row has been split on commas.
static CONSTRUCTOR_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.]*\(\s*(-?\d+)$").unwrap());
static CONSTRUCTOR_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(-?\d+)\)$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());

/// Parse a bracketed list of parenthesised tuples into rows.
///
/// Returns `None` unless the whole input has that shape.
pub fn parse_tuple_list(text: &str) -> Option<Table> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    let rows = split_rows(inner)?;
    if rows.is_empty() {
        return None;
    }
    let rows = rows
        .iter()
        .map(|row| coalesce_constructors(split_cells(row)))
        .collect();
    Some(Table::new(rows))
}

/// Depth-1 spans between matching parentheses, quote-aware.
fn split_rows(inner: &str) -> Option<Vec<String>> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            if depth == 0 {
                return None;
            }
            current.push(c);
            continue;
        }

        match c {
            '\'' | '"' => {
                if depth == 0 {
                    return None;
                }
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                if depth > 1 {
                    current.push(c);
                }
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    rows.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            c if depth == 0 => {
                if c != ',' && !c.is_whitespace() {
                    return None;
                }
            }
            c => current.push(c),
        }
    }

    (depth == 0 && quote.is_none()).then_some(rows)
}

/// Split a row on commas outside quotes. Parentheses are not tracked here,
/// so constructor calls come out split and are rejoined afterwards.
fn split_cells(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in row.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            ',' => cells.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    cells.push(current);

    let mut cells: Vec<String> = cells.iter().map(|cell| cell.trim().to_string()).collect();
    // Python one-tuples print as `(1,)`.
    if cells.len() > 1 && cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}

/// Rejoin `name(y`, `m`, `d)` into `y-m-d`, strip quotes from plain cells.
/// Other constructors that were split are rejoined into one cell.
fn coalesce_constructors(cells: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(cells.len());
    let mut i = 0;
    while i < cells.len() {
        if let Some(joined) = join_constructor(&cells[i..]) {
            out.push(joined.text);
            i += joined.consumed;
            continue;
        }
        out.push(strip_quotes(&cells[i]));
        i += 1;
    }
    out
}

struct Joined {
    text: String,
    consumed: usize,
}

fn join_constructor(cells: &[String]) -> Option<Joined> {
    let first = CONSTRUCTOR_OPEN_RE.captures(&cells[0])?;
    let close = cells.iter().position(|cell| cell.ends_with(')'))?;
    if close == 0 {
        return None;
    }

    let parts = &cells[..=close];
    if close == 2
        && NUMBER_RE.is_match(&parts[1])
        && let Some(last) = CONSTRUCTOR_CLOSE_RE.captures(&parts[2])
    {
        return Some(Joined {
            text: format!("{}-{}-{}", &first[1], parts[1], &last[1]),
            consumed: 3,
        });
    }

    Some(Joined {
        text: parts.join(", "),
        consumed: parts.len(),
    })
}

/// Drop surrounding quotes and undo `\'`, `\"` and `\\` inside them.
/// Unquoted cells are kept verbatim.
fn strip_quotes(cell: &str) -> String {
    let Some(inner) = ['\'', '"'].into_iter().find_map(|q| {
        (cell.len() >= 2 && cell.starts_with(q) && cell.ends_with(q))
            .then(|| &cell[1..cell.len() - 1])
    }) else {
        return cell.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('\'' | '"' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
