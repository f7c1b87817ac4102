/*!
 * Deterministic syntax validation.
 *
 * `SyntaxParser` is the seam for the parser used by the evaluator. The
 * default implementation is backed by `sqlparser`: a statement is valid when
 * it parses under the target dialect, and the normalized form is the parser's
 * own rendering of the parsed statements.
 *
 * `sqlparser` has no grammar for a good part of Databricks DDL (catalogs,
 * volumes, external locations, SQL functions, `COMMENT ON`, tag and mask
 * clauses, and table or schema options such as `USING DELTA`). Such
 * statements are reported as `ParseError::Unsupported` rather than as syntax
 * errors. For `CREATE TABLE`/`CREATE SCHEMA` with trailing options, the part
 * before the first option is still parsed, so errors in the column list are
 * caught.
 */

use std::fmt::Debug;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::dialect::{Dialect, dialect_from_str};
use sqlparser::parser::Parser;

use crate::errors::ParseError;

use super::sql_text::{clean_error_message, clean_statement, is_comment_only};

static PARSER_EXPECTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Expected: (.+?), found: (\S+)").expect("parser expectation pattern is valid"));

/// Object kinds after `CREATE [OR REPLACE]` that the parser does not model
const UNMODELLED_OBJECTS: [&str; 9] = [
    "CATALOG",
    "VOLUME",
    "FUNCTION",
    "PROCEDURE",
    "CONNECTION",
    "SHARE",
    "RECIPIENT",
    "STREAMING",
    "LIVE",
];

/// Leading keywords of statements the parser does not model
const UNMODELLED_STATEMENTS: [&str; 6] = ["COMMENT", "OPTIMIZE", "VACUUM", "REFRESH", "MSCK", "RESTORE"];

/// Two-word clauses of `ALTER` statements the parser does not model
const UNMODELLED_ALTER_CLAUSES: [(&str, &str); 7] = [
    ("SET", "TAGS"),
    ("UNSET", "TAGS"),
    ("SET", "TAG"),
    ("SET", "MASK"),
    ("DROP", "MASK"),
    ("SET", "ROW"),
    ("DROP", "ROW"),
];

/// Table and schema options that end the part of a `CREATE` the parser understands
const TRAILING_OPTIONS: [&str; 9] = [
    "USING",
    "PARTITIONED",
    "CLUSTER",
    "LOCATION",
    "TBLPROPERTIES",
    "DBPROPERTIES",
    "COMMENT",
    "OPTIONS",
    "MANAGED",
];

/// A statement that parsed successfully, re-rendered by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatement {
    /// Parser rendering of every statement found, joined by `;\n`
    pub sql: String,
    /// How many statements the input contained
    pub statement_count: usize,
}

/// Deterministic parser for a target SQL dialect. Never suspends.
///
/// `ParseError::Unsupported` means the statement could not be checked; only
/// `ParseError::Syntax` and `ParseError::Empty` reject a statement.
pub trait SyntaxParser: Send + Sync + Debug {
    fn parse_and_transpile(&self, statement: &str, target_dialect: &str) -> Result<NormalizedStatement, ParseError>;
}

/// `SyntaxParser` backed by the `sqlparser` crate
#[derive(Debug, Default, Clone)]
pub struct SqlParserValidator;

impl SqlParserValidator {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxParser for SqlParserValidator {
    fn parse_and_transpile(&self, statement: &str, target_dialect: &str) -> Result<NormalizedStatement, ParseError> {
        let dialect = dialect_from_str(target_dialect)
            .ok_or_else(|| ParseError::UnsupportedDialect(target_dialect.to_string()))?;

        let cleaned = clean_statement(statement);
        if cleaned.is_empty() {
            return Err(ParseError::Empty);
        }
        if is_comment_only(&cleaned) {
            return Err(ParseError::Unsupported("a comment-only statement".to_string()));
        }
        if let Some(kind) = unmodelled_statement_kind(&cleaned) {
            return Err(ParseError::Unsupported(format!("{} statements", kind)));
        }

        match Parser::parse_sql(dialect.as_ref(), &cleaned) {
            Ok(statements) if statements.is_empty() => Err(ParseError::Empty),
            Ok(statements) => Ok(NormalizedStatement {
                sql: statements
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(";\n"),
                statement_count: statements.len(),
            }),
            Err(e) => {
                let message = clean_error_message(&e.to_string());
                match split_trailing_options(&cleaned) {
                    Some((head, option)) => Err(check_head(dialect.as_ref(), head, option)),
                    None => Err(classify_parser_error(message)),
                }
            }
        }
    }
}

/// Parse the part before the trailing options; errors there are real
fn check_head(dialect: &dyn Dialect, head: &str, option: &str) -> ParseError {
    match Parser::parse_sql(dialect, head) {
        Ok(_) => ParseError::Unsupported(format!("the {} clause", option)),
        Err(e) => ParseError::Syntax(clean_error_message(&e.to_string())),
    }
}

/// Upper-cased words with surrounding punctuation removed
fn keywords(statement: &str) -> Vec<String> {
    statement
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .to_ascii_uppercase()
        })
        .collect()
}

fn skip_create_modifiers(words: &[String]) -> &[String] {
    let skip = words
        .iter()
        .take_while(|word| matches!(word.as_str(), "OR" | "REPLACE" | "TEMPORARY" | "TEMP"))
        .count();
    &words[skip..]
}

/// Name of the statement kind when the parser is known not to model it
fn unmodelled_statement_kind(statement: &str) -> Option<String> {
    let words = keywords(statement);
    let first = words.first()?.as_str();

    match first {
        "CREATE" => {
            let rest = skip_create_modifiers(&words[1..]);
            match rest {
                [external, object, ..] if external == "EXTERNAL" && matches!(object.as_str(), "LOCATION" | "VOLUME") => {
                    Some(format!("CREATE EXTERNAL {}", object))
                }
                [storage, credential, ..] if storage == "STORAGE" && credential == "CREDENTIAL" => {
                    Some("CREATE STORAGE CREDENTIAL".to_string())
                }
                [object, ..] if UNMODELLED_OBJECTS.contains(&object.as_str()) => Some(format!("CREATE {}", object)),
                _ => None,
            }
        }
        "ALTER" => words.windows(2).find_map(|pair| {
            UNMODELLED_ALTER_CLAUSES
                .iter()
                .find(|(verb, noun)| pair[0] == *verb && pair[1] == *noun)
                .map(|(verb, noun)| format!("ALTER ... {} {}", verb, noun))
        }),
        "SET" | "UNSET" if words.get(1).is_some_and(|word| word == "TAG" || word == "TAGS") => {
            Some(format!("{} TAG", first))
        }
        "COMMENT" if words.get(1).is_some_and(|word| word == "ON") => Some("COMMENT ON".to_string()),
        _ if UNMODELLED_STATEMENTS.contains(&first) => Some(first.to_string()),
        _ => None,
    }
}

/// Map a parser failure to `Unsupported` when it names a statement kind the
/// parser has no grammar for, and to `Syntax` otherwise
fn classify_parser_error(message: String) -> ParseError {
    let unmodelled = PARSER_EXPECTATION.captures(&message).and_then(|captures| {
        let expected = captures.get(1)?.as_str();
        let found = captures
            .get(2)?
            .as_str()
            .trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .to_ascii_uppercase();

        let known = match expected {
            "an object type after CREATE" => {
                UNMODELLED_OBJECTS.contains(&found.as_str()) || matches!(found.as_str(), "EXTERNAL" | "STORAGE")
            }
            "an SQL statement" => UNMODELLED_STATEMENTS.contains(&found.as_str()),
            _ => false,
        };
        known.then_some(found)
    });

    match unmodelled {
        Some(found) => ParseError::Unsupported(format!("{} statements", found)),
        None => ParseError::Syntax(message),
    }
}

/// Span of the next whitespace-delimited word starting at or after `from`.
/// A `(` also ends a word.
fn next_word(text: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = (from..bytes.len()).find(|&i| !bytes[i].is_ascii_whitespace())?;
    let end = (start..bytes.len())
        .find(|&i| bytes[i].is_ascii_whitespace() || bytes[i] == b'(')
        .unwrap_or(bytes.len());
    (end > start).then_some((start, end))
}

/// Offset just past the object name of `CREATE [OR REPLACE] [EXTERNAL] TABLE|SCHEMA|DATABASE [IF NOT EXISTS] name`
fn create_target_end(upper: &str) -> Option<usize> {
    fn word(text: &str, (start, end): (usize, usize)) -> &str {
        &text[start..end]
    }

    let mut span = next_word(upper, 0)?;
    if word(upper, span) != "CREATE" {
        return None;
    }
    loop {
        span = next_word(upper, span.1)?;
        match word(upper, span) {
            "OR" | "REPLACE" | "EXTERNAL" => continue,
            "TABLE" | "SCHEMA" | "DATABASE" => break,
            _ => return None,
        }
    }

    span = next_word(upper, span.1)?;
    if word(upper, span) == "IF" {
        for expected in ["NOT", "EXISTS"] {
            span = next_word(upper, span.1)?;
            if word(upper, span) != expected {
                return None;
            }
        }
        span = next_word(upper, span.1)?;
    }
    Some(span.1)
}

/// First trailing option keyword outside parentheses and quotes, after `from`
fn first_trailing_option(upper: &str, from: usize) -> Option<(usize, &'static str)> {
    let bytes = upper.as_bytes();
    let is_word_byte = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if is_word_byte(b) && (i == 0 || !(is_word_byte(bytes[i - 1]) || bytes[i - 1] == b'.')) => {
                let end = (i..bytes.len()).find(|&j| !is_word_byte(bytes[j])).unwrap_or(bytes.len());
                if depth == 0 {
                    if let Some(option) = TRAILING_OPTIONS.iter().find(|option| **option == &upper[i..end]) {
                        return Some((i, *option));
                    }
                }
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a `CREATE TABLE`/`CREATE SCHEMA` into the part the parser understands
/// and the first trailing option keyword
fn split_trailing_options(statement: &str) -> Option<(&str, &'static str)> {
    let upper = statement.to_ascii_uppercase();
    let body_start = create_target_end(&upper)?;
    let (offset, option) = first_trailing_option(&upper, body_start)?;
    Some((statement[..offset].trim_end(), option))
}
