/*!
 * SQL text cleanup helpers.
 *
 * LLM replies frequently arrive wrapped in markdown fences or with escaped
 * newlines; parser errors may contain terminal escape codes. These helpers
 * normalize both before statements are parsed, stored or displayed.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI escape pattern is valid"));

const PREVIEW_LENGTH: usize = 200;

/// Strip one leading ```` ```sql ```` / ```` ``` ```` fence and one trailing ```` ``` ```` fence
pub fn strip_code_fences(statement: &str) -> &str {
    let mut cleaned = statement.trim();

    if let Some(rest) = cleaned.strip_prefix("```sql").or_else(|| cleaned.strip_prefix("```SQL")) {
        cleaned = rest.trim();
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest.trim();
    }

    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest.trim();
    }

    cleaned
}

/// Turn literal `\n`, `\r`, `\t` sequences into the characters they denote
pub fn normalize_escapes(statement: &str) -> String {
    statement
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}

/// Fence stripping followed by escape normalization
pub fn clean_statement(statement: &str) -> String {
    normalize_escapes(strip_code_fences(statement)).trim().to_string()
}

/// Single-line preview of a statement, at most 200 characters plus an ellipsis
pub fn preview(statement: &str) -> String {
    let collapsed = strip_code_fences(statement)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.chars().count() > PREVIEW_LENGTH {
        let truncated: String = collapsed.chars().take(PREVIEW_LENGTH).collect();
        format!("{}...", truncated)
    } else {
        collapsed
    }
}

/// Remove terminal escape codes and collapse whitespace in a parser error message
pub fn clean_error_message(message: &str) -> String {
    ANSI_ESCAPE
        .replace_all(message, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when every non-blank line is a `--` comment
pub fn is_comment_only(statement: &str) -> bool {
    let mut lines = statement.lines().map(str::trim).filter(|line| !line.is_empty()).peekable();
    lines.peek().is_some() && lines.all(|line| line.starts_with("--"))
}

/// Remove trailing semicolons and whitespace
pub fn trim_terminator(statement: &str) -> &str {
    statement.trim_end().trim_end_matches(';').trim_end()
}
