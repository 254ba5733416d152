//! Input Validation and Identifier Quoting
//!
//! Every string that ends up inside query text passes through this module.
//!
//! - Table arguments are validated here, then embedded only as a quoted
//!   literal for the catalog lookup (`to_regclass('...')`).
//! - Column names are never taken from the caller as-is: they must belong to
//!   the column list read from `pg_attribute`, and are double-quoted.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::validation::{validate_table_name, quote_identifier};
//!
//! validate_table_name(table)?;
//! let col = quote_identifier("category"); // "category"
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use crate::error::{FdError, FdResult};

/// PostgreSQL identifier limit (NAMEDATALEN - 1)
const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

static SQL_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(drop|delete|insert|update|create|alter|truncate|grant)\s")
        .expect("keyword pattern is valid")
});

/// Validate a single unquoted `PostgreSQL` identifier
///
/// Allows letters, digits, underscore and `$`, not starting with a digit,
/// at most 63 bytes. Rejects quotes, semicolons, comment markers and
/// whitespace-separated DDL/DML keywords.
pub fn validate_sql_identifier(identifier: &str, param_name: &str) -> FdResult<()> {
    if identifier.is_empty() {
        return Err(FdError::InvalidInput {
            parameter: param_name.to_string(),
            value: identifier.to_string(),
            reason: "Identifier cannot be empty".to_string(),
        });
    }

    let dangerous_chars = [';', '\'', '"', '\\', '\0'];
    if let Some(ch) = identifier.chars().find(|c| dangerous_chars.contains(c)) {
        return Err(FdError::SecurityViolation {
            parameter: param_name.to_string(),
            value: sanitize_for_logging(identifier),
            reason: format!("Identifier contains dangerous character: '{}'", ch),
        });
    }

    if identifier.contains("--") || identifier.contains("/*") || SQL_KEYWORD_RE.is_match(identifier) {
        return Err(FdError::SecurityViolation {
            parameter: param_name.to_string(),
            value: sanitize_for_logging(identifier),
            reason: "Identifier contains SQL comment markers or keywords".to_string(),
        });
    }

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(FdError::InvalidInput {
            parameter: param_name.to_string(),
            value: format!("{}... ({} chars)", sanitize_for_logging(identifier), identifier.len()),
            reason: format!("Identifier too long (max {} characters)", MAX_IDENTIFIER_LEN),
        });
    }

    if !IDENTIFIER_RE.is_match(identifier) {
        return Err(FdError::InvalidInput {
            parameter: param_name.to_string(),
            value: sanitize_for_logging(identifier),
            reason: "Identifier must start with a letter or underscore and contain only \
                     letters, digits, underscores or '$'".to_string(),
        });
    }

    Ok(())
}

/// Validate a table argument: `table` or `schema.table`
pub fn validate_table_name(name: &str) -> FdResult<()> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(FdError::InvalidInput {
            parameter: "table_name".to_string(),
            value: sanitize_for_logging(name),
            reason: "Expected 'table' or 'schema.table'".to_string(),
        });
    }

    for part in parts {
        validate_sql_identifier(part, "table_name")?;
    }

    Ok(())
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Sanitize string for logging (truncate, escape control chars)
pub fn sanitize_for_logging(s: &str) -> String {
    let max_len = 50;
    let truncated: String = if s.chars().count() > max_len {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    } else {
        s.to_string()
    };

    truncated
        .replace('\0', "\\0")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_sql_identifier("items", "test").is_ok());
        assert!(validate_sql_identifier("carros", "test").is_ok());
        assert!(validate_sql_identifier("_tmp$1", "test").is_ok());
        assert!(validate_sql_identifier("Items2", "test").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_sql_identifier("", "test").is_err());
        assert!(validate_sql_identifier("items; DROP", "test").is_err());
        assert!(validate_sql_identifier("user-data", "test").is_err());
        assert!(validate_sql_identifier("my table", "test").is_err());
        assert!(validate_sql_identifier("'admin'", "test").is_err());
        assert!(validate_sql_identifier("123table", "test").is_err());
        assert!(validate_sql_identifier(&"a".repeat(64), "test").is_err());
    }

    #[test]
    fn test_injection_is_security_violation() {
        crate::error::testing::assert_error_sqlstate(
            validate_sql_identifier("x;drop table items", "table_name"),
            "42501",
        );
        crate::error::testing::assert_error_sqlstate(
            validate_sql_identifier("x--", "table_name"),
            "42501",
        );
    }

    #[test]
    fn test_table_names() {
        assert!(validate_table_name("items").is_ok());
        assert!(validate_table_name("public.items").is_ok());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name(".items").is_err());
        assert!(validate_table_name("public.").is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("category"), "\"category\"");
        assert_eq!(quote_identifier("Odd\"Name"), "\"Odd\"\"Name\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("items"), "'items'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("a\nb"), "a\\nb");
        assert!(sanitize_for_logging(&"x".repeat(80)).ends_with("..."));
    }
}
