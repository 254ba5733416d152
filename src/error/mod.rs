use std::fmt;

#[cfg(any(test, feature = "pg_test"))]
pub mod testing;

/// Main error type for the pg_fdep extension
#[derive(Debug, Clone, PartialEq)]
pub enum FdError {
    // ============ Setup Errors (55xxx) ============
    /// Seed table could not be prepared
    Setup {
        table: String,
        reason: String,
    },

    // ============ Schema Errors (42xxx) ============
    /// Table does not exist (or is not visible on the search_path)
    TableNotFound {
        table: String,
    },

    /// Column list could not be read from the catalog
    SchemaUnreadable {
        table: String,
        reason: String,
    },

    /// Column is not part of the table's trusted column list
    UnknownColumn {
        column: String,
        table: String,
    },

    /// Candidate does not have the (non-empty LHS, RHS not in LHS) shape
    InvalidCandidate {
        reason: String,
    },

    // ============ Query Errors (XX000) ============
    /// A validity query failed against the table
    Query {
        query: String,
        error: String,
    },

    // ============ Input Errors (22xxx / 42xxx) ============
    /// Argument failed validation
    InvalidInput {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Argument looks like an injection attempt
    SecurityViolation {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Configuration error (invalid GUC or per-call override)
    ConfigError {
        setting: String,
        value: String,
        reason: String,
    },

    // ============ System Errors (XX000) ============
    /// Serialization of the report failed
    SerializationError {
        message: String,
    },

    /// Internal error (bug in extension)
    InternalError {
        message: String,
        file: &'static str,
        line: u32,
    },
}

impl FdError {
    /// Get PostgreSQL SQLSTATE code for this error
    pub fn sqlstate(&self) -> &'static str {
        use FdError::*;
        match self {
            Setup { .. } => "55000", // Object not in prerequisite state

            TableNotFound { .. } => "42P01", // Undefined table
            SchemaUnreadable { .. } => "58030", // I/O error
            UnknownColumn { .. } => "42703", // Undefined column
            InvalidCandidate { .. } => "22023", // Invalid parameter value

            Query { .. } => "XX000",

            InvalidInput { .. } => "22P02", // Invalid text representation
            SecurityViolation { .. } => "42501", // Insufficient privilege
            ConfigError { .. } => "F0000", // Config file error

            SerializationError { .. } => "22P05", // Untranslatable character
            InternalError { .. } => "XX001",
        }
    }

    /// Fatal errors abort the discovery run; everything else is per-candidate
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FdError::Query { .. })
    }

    /// Create internal error with file/line info
    pub fn internal(message: String, file: &'static str, line: u32) -> Self {
        FdError::InternalError { message, file, line }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

impl fmt::Display for FdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FdError::*;
        match self {
            Setup { table, reason } => {
                write!(f, "Failed to prepare table '{}': {}", table, reason)
            }
            TableNotFound { table } => {
                write!(f, "Table '{}' does not exist", table)
            }
            SchemaUnreadable { table, reason } => {
                write!(f, "Could not read column list of '{}': {}", table, reason)
            }
            UnknownColumn { column, table } => {
                write!(f, "Column '{}' is not a column of '{}'", column, table)
            }
            InvalidCandidate { reason } => {
                write!(f, "Invalid dependency candidate: {}", reason)
            }
            Query { query, error } => {
                write!(f, "Validity query failed: {}\nQuery: {}", error, truncate(query, 200))
            }
            InvalidInput { parameter, value, reason } => {
                write!(f, "Invalid value for '{}' ({}): {}", parameter, value, reason)
            }
            SecurityViolation { parameter, value, reason } => {
                write!(f, "Rejected value for '{}' ({}): {}", parameter, value, reason)
            }
            ConfigError { setting, value, reason } => {
                write!(f, "Configuration error for '{}': {} (value: {})", setting, reason, value)
            }
            SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
            InternalError { message, file, line } => {
                write!(f, "Internal error at {}:{}: {}\nPlease report this bug.",
                       file, line, message)
            }
        }
    }
}

impl std::error::Error for FdError {}

/// Result type for pg_fdep operations
pub type FdResult<T> = Result<T, FdError>;

/// Convert SpiError to FdError
impl From<pgrx::spi::Error> for FdError {
    fn from(e: pgrx::spi::Error) -> Self {
        FdError::Query {
            query: "Unknown".to_string(),
            error: e.to_string(),
        }
    }
}

/// Convert serde_json::Error to FdError
impl From<serde_json::Error> for FdError {
    fn from(e: serde_json::Error) -> Self {
        FdError::SerializationError {
            message: format!("JSON serialization error: {}", e),
        }
    }
}

/// Helper macro for creating internal errors with automatic file/line
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::FdError::internal($msg.to_string(), file!(), line!())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::FdError::internal(format!($fmt, $($arg)*), file!(), line!())
    };
}

/// Helper macro for requiring a value or returning error
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr) => {
        match $opt {
            Some(v) => v,
            None => return Err($err),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found_message() {
        let err = FdError::TableNotFound {
            table: "items".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("items"));
        assert!(msg.contains("does not exist"));
        assert_eq!(err.sqlstate(), "42P01");
    }

    #[test]
    fn test_query_error_truncates_long_sql() {
        let long_sql = format!("SELECT {}", "x, ".repeat(200));
        let err = FdError::Query {
            query: long_sql.clone(),
            error: "boom".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.len() < long_sql.len());
    }

    #[test]
    fn test_only_query_errors_are_non_fatal() {
        let query = FdError::Query { query: "q".to_string(), error: "e".to_string() };
        let setup = FdError::Setup { table: "t".to_string(), reason: "r".to_string() };
        let schema = FdError::TableNotFound { table: "t".to_string() };

        assert!(!query.is_fatal());
        assert!(setup.is_fatal());
        assert!(schema.is_fatal());
    }

    #[test]
    fn test_internal_error_macro() {
        let err = internal_error!("Test error at {}", "location");

        match err {
            FdError::InternalError { message, file, line } => {
                assert!(message.contains("Test error"));
                assert!(file.ends_with("mod.rs"));
                assert!(line > 0);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_require_macro_returns_error() {
        fn pick(v: Option<i32>) -> FdResult<i32> {
            let x = require!(v, FdError::InvalidCandidate { reason: "missing".to_string() });
            Ok(x * 2)
        }

        assert_eq!(pick(Some(2)), Ok(4));
        assert!(pick(None).is_err());
    }

    #[test]
    fn test_all_error_sqlstates_unique() {
        let errors = vec![
            FdError::Setup { table: "t".to_string(), reason: "r".to_string() },
            FdError::TableNotFound { table: "t".to_string() },
            FdError::SchemaUnreadable { table: "t".to_string(), reason: "r".to_string() },
            FdError::UnknownColumn { column: "c".to_string(), table: "t".to_string() },
            FdError::InvalidCandidate { reason: "r".to_string() },
            FdError::Query { query: "q".to_string(), error: "e".to_string() },
            FdError::InvalidInput { parameter: "p".to_string(), value: "v".to_string(), reason: "r".to_string() },
            FdError::SecurityViolation { parameter: "p".to_string(), value: "v".to_string(), reason: "r".to_string() },
            FdError::ConfigError { setting: "s".to_string(), value: "v".to_string(), reason: "r".to_string() },
            FdError::SerializationError { message: "m".to_string() },
            FdError::InternalError { message: "m".to_string(), file: "f", line: 1 },
        ];

        let sqlstates: std::collections::HashSet<&str> =
            errors.iter().map(FdError::sqlstate).collect();

        assert_eq!(sqlstates.len(), errors.len());
    }
}
