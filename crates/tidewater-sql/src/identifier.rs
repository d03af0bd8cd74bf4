//! SQL identifier validation.

use crate::error::DbError;

/// Longest identifier `PostgreSQL` accepts without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate that `name` is a plain SQL identifier.
///
/// Rules:
/// - Must not be empty or exceed 63 bytes.
/// - Must start with a letter (`a-zA-Z`) or underscore (`_`).
/// - Remaining characters must be letters, digits (`0-9`), or underscores.
///
/// # Errors
///
/// Returns a schema-category [`DbError`] naming the offending identifier.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(DbError::schema("identifier must not be empty"));
    };

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::schema(format!(
            "identifier '{name}' exceeds maximum length of {MAX_IDENTIFIER_LEN} bytes (got {})",
            name.len()
        )));
    }

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(DbError::schema(format!(
            "identifier '{name}' must start with a letter or underscore"
        )));
    }

    if let Some(ch) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(DbError::schema(format!(
            "identifier '{name}' contains invalid character '{ch}'"
        )));
    }

    Ok(())
}

/// Double-quote `name` as a SQL identifier, doubling any embedded quote.
///
/// Unlike `pg_escape::quote_identifier` this quotes unconditionally, so
/// `transaction` is safe in `SQLite` and mixed-case names keep their case.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
