//! Statement classification.
//!
//! A prefix check on the trimmed query text, not a parser. A SELECT that
//! reaches a write through a function call is not detected.

use once_cell::sync::Lazy;
use regex::Regex;

/// Top-level shape of a statement, judged from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Starts with `SELECT`; executed as a row-returning query.
    Select,
    /// Starts with a blocked write keyword.
    Write,
    /// Anything else (`WITH`, `EXEC`, `DECLARE`, ...); executed as a
    /// non-row-returning statement.
    Other,
}

/// Regex patterns for statement classification.
///
/// All patterns are hardcoded constants that have been verified to be valid regex.
static WRITE_OPERATION: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)^\s*(INSERT|UPDATE|DELETE|TRUNCATE|DROP|ALTER|CREATE|MERGE)\b")
});

static SELECT_STATEMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?i)^\s*SELECT\b"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Check whether the query begins with a write-operation keyword.
///
/// # Examples
///
/// ```
/// use sqlserver_mcp_server::security::is_write_operation;
///
/// assert!(is_write_operation("  insert into t values (1)"));
/// assert!(!is_write_operation("SELECT * FROM t"));
/// assert!(!is_write_operation("UPDATED_AT"));
/// ```
pub fn is_write_operation(query: &str) -> bool {
    WRITE_OPERATION.is_match(query)
}

/// Classify a statement by its leading keyword.
pub fn classify(query: &str) -> StatementKind {
    if SELECT_STATEMENT.is_match(query) {
        StatementKind::Select
    } else if is_write_operation(query) {
        StatementKind::Write
    } else {
        StatementKind::Other
    }
}
