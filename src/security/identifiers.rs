//! SQL Server identifier validation and bracket quoting.
//!
//! Only plain identifiers (`[A-Za-z_][A-Za-z0-9_]*`) are ever interpolated into
//! statement text; everything else reaches the server as a bound parameter.

use once_cell::sync::Lazy;
use regex::Regex;

static SAFE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Check that `s` is a safe unquoted SQL identifier.
///
/// # Examples
///
/// ```
/// use sqlserver_mcp_server::security::is_safe_identifier;
///
/// assert!(is_safe_identifier("dbo"));
/// assert!(is_safe_identifier("_Order_2024"));
/// assert!(!is_safe_identifier("proc;drop"));
/// assert!(!is_safe_identifier("dbo.Users"));
/// ```
pub fn is_safe_identifier(s: &str) -> bool {
    SAFE_IDENTIFIER.is_match(s)
}

/// The user-facing rejection for an identifier that failed validation.
///
/// `what` names the field, e.g. `"schema name"` or `"procedure name"`.
pub fn invalid_identifier_message(what: &str, value: &str) -> String {
    format!(
        "Invalid {what}: '{value}'. Only alphanumeric characters and underscores are allowed."
    )
}

/// Escape a single identifier using bracket notation.
///
/// Embedded right brackets are doubled, so the result is always one quoted
/// name even for input that did not pass [`is_safe_identifier`].
pub fn quote_identifier(identifier: &str) -> String {
    format!("[{}]", identifier.replace(']', "]]"))
}

/// Bracket-quoted two-part object reference, e.g. `[dbo].[GetUsers]`.
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}

/// Normalize a stored-procedure parameter key to carry a leading `@`.
///
/// The bare name must itself be a safe identifier because it is written into
/// the `EXEC` text; the value is always bound separately.
pub fn normalize_parameter_name(key: &str) -> Result<String, String> {
    let bare = key.strip_prefix('@').unwrap_or(key);
    if is_safe_identifier(bare) {
        Ok(format!("@{bare}"))
    } else {
        Err(invalid_identifier_message("parameter name", key))
    }
}
