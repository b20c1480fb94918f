//! Statement type classification.
//!
//! Determines the kind of a SQL statement from its leading keyword, after
//! stripping comments. Malformed or unrecognized input classifies as
//! `Unknown` rather than failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of SQL statement, determined by the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Grant,
    Revoke,
    Call,
    Unknown,
}

impl QueryType {
    /// Returns the type as an uppercase keyword string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Call => "CALL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true if the statement reads data without modifying it.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recognized leading keywords, in match order.
const KEYWORDS: &[(&str, QueryType)] = &[
    ("SELECT", QueryType::Select),
    ("INSERT", QueryType::Insert),
    ("UPDATE", QueryType::Update),
    ("DELETE", QueryType::Delete),
    ("CREATE", QueryType::Create),
    ("DROP", QueryType::Drop),
    ("ALTER", QueryType::Alter),
    ("GRANT", QueryType::Grant),
    ("REVOKE", QueryType::Revoke),
    ("CALL", QueryType::Call),
];

/// Classifies a SQL string by its leading keyword.
///
/// Line comments (`--` to end of line) and block comments (`/* ... */`) are
/// stripped before matching, so a commented preamble does not affect the
/// classification. Matching is case-insensitive and looks at the first token
/// only; anything unrecognized yields [`QueryType::Unknown`].
pub fn classify(sql: &str) -> QueryType {
    let stripped = strip_comments(sql);
    let token = leading_token(&stripped);

    for (keyword, query_type) in KEYWORDS {
        if token.eq_ignore_ascii_case(keyword) {
            return *query_type;
        }
    }

    QueryType::Unknown
}

/// Removes line comments and block comments from SQL text.
///
/// Block comments do not nest; an unterminated block comment swallows the
/// rest of the input.
fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                // Line comment: skip to end of line, keep the newline
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                // Block comment: skip past the closing marker, emitting a
                // space so tokens on either side stay separated
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

/// Extracts the first keyword-like token from trimmed SQL text.
fn leading_token(sql: &str) -> &str {
    let trimmed = sql.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}
