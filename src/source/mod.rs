//! Data Source Adapters
//!
//! The engine talks to table data only through [`DataSource`]. The handle is
//! passed explicitly into every run, so tests swap in an in-memory fake.
//!
//! - `spi`: the backend's own SPI connection (production)
//! - `query`: validity query text built from a trusted column list
//! - `memory`: row-vector fake with error injection (tests only)

pub mod query;
pub mod spi;
#[cfg(any(test, feature = "pg_test"))]
pub mod memory;

pub use spi::SpiSource;

use crate::discovery::Candidate;
use crate::error::{FdError, FdResult};

/// A table as resolved by the data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Name as rendered by the source, safe to embed in query text
    pub relation: String,
    /// Columns in declaration order
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Check a candidate against the trusted column list
    pub fn check_candidate(&self, candidate: &Candidate) -> FdResult<()> {
        if candidate.lhs.is_empty() {
            return Err(FdError::InvalidCandidate {
                reason: "left-hand side must name at least one column".to_string(),
            });
        }
        if candidate.lhs.contains(&candidate.rhs) {
            return Err(FdError::InvalidCandidate {
                reason: format!("'{}' appears on both sides", candidate.rhs),
            });
        }

        for column in candidate.lhs.iter().chain(std::iter::once(&candidate.rhs)) {
            if !self.contains(column) {
                return Err(FdError::UnknownColumn {
                    column: column.clone(),
                    table: self.relation.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Read-only access to one table's schema and grouped distinct counts
pub trait DataSource {
    /// Resolve `table` and list its columns in declaration order
    ///
    /// Missing table or unreadable catalog is a fatal schema error.
    /// A table with no columns yields an empty list.
    fn list_columns(&mut self, table: &str) -> FdResult<TableSchema>;

    /// Whether the table holds at least one row
    ///
    /// Failures are fatal schema errors.
    fn has_rows(&mut self, schema: &TableSchema) -> FdResult<bool>;

    /// Whether some group of rows sharing `candidate.lhs` values has more
    /// than one distinct `candidate.rhs` value
    ///
    /// Errors are `FdError::Query` for a failed test.
    fn has_violating_group(&mut self, schema: &TableSchema, candidate: &Candidate) -> FdResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema {
            relation: "items".to_string(),
            columns: vec!["id".to_string(), "category".to_string(), "price".to_string()],
        }
    }

    #[test]
    fn test_check_candidate_accepts_known_columns() {
        let c = Candidate::new(vec!["category".to_string()], "price");
        assert!(schema().check_candidate(&c).is_ok());
    }

    #[test]
    fn test_check_candidate_rejects_unknown_column() {
        let c = Candidate::new(vec!["category\"; DROP TABLE items; --".to_string()], "price");
        crate::error::testing::assert_error_sqlstate(schema().check_candidate(&c), "42703");
    }

    #[test]
    fn test_check_candidate_rejects_trivial_and_empty() {
        let trivial = Candidate::new(vec!["id".to_string()], "id");
        crate::error::testing::assert_error_contains(schema().check_candidate(&trivial), "both sides");

        let empty = Candidate::new(vec![], "id");
        crate::error::testing::assert_error_contains(schema().check_candidate(&empty), "at least one");
    }
}
