//! Placeholder rewriting
//!
//! Endpoint URIs cannot carry a literal `?` inside the query text, so users
//! write another token and it is swapped for the JDBC parameter marker.
//! The swap is a plain text replace: tokens inside string literals are
//! rewritten too.

/// Token replaced when no `placeholder` parameter is given
pub const DEFAULT_PLACEHOLDER: &str = "#";

/// JDBC positional parameter marker
pub const PARAMETER_MARKER: &str = "?";

/// Replaces every occurrence of `placeholder` with `?`
pub fn rewrite(sql: &str, placeholder: &str) -> String {
    if placeholder.is_empty() || placeholder == PARAMETER_MARKER {
        return sql.to_string();
    }
    sql.replace(placeholder, PARAMETER_MARKER)
}
