//! In-memory data source for tests.
//!
//! Rows are vectors of optional text values; `None` is SQL NULL. The
//! validity test reproduces the SPI source's grouping semantics, including
//! the NULL policy, and any candidate can be made to fail on demand.

use std::collections::{HashMap, HashSet};
use crate::config::NullPolicy;
use crate::discovery::Candidate;
use crate::error::{FdError, FdResult};
use super::{DataSource, TableSchema};

type Row = Vec<Option<String>>;

#[derive(Debug, Clone)]
pub struct MemorySource {
    table: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    null_policy: NullPolicy,
    failing: HashSet<Candidate>,
    fail_schema: bool,
    calls: Vec<Candidate>,
}

impl MemorySource {
    pub fn new(table: &str, columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            null_policy: NullPolicy::AsValue,
            failing: HashSet::new(),
            fail_schema: false,
            calls: Vec::new(),
        }
    }

    /// Append a row; `None` cells are NULL
    pub fn row(mut self, values: &[Option<&str>]) -> Self {
        assert_eq!(values.len(), self.columns.len(), "row width must match column count");
        self.rows.push(values.iter().map(|v| v.map(str::to_string)).collect());
        self
    }

    pub fn push_row(&mut self, values: &[Option<&str>]) {
        assert_eq!(values.len(), self.columns.len(), "row width must match column count");
        self.rows.push(values.iter().map(|v| v.map(str::to_string)).collect());
    }

    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    /// Make the validity test for `lhs -> rhs` fail with a query error
    pub fn fail_on(mut self, lhs: &[&str], rhs: &str) -> Self {
        self.failing.insert(Candidate::new(lhs.iter().map(|s| s.to_string()).collect(), rhs));
        self
    }

    /// Make `list_columns` fail as if the catalog were unreadable
    pub fn fail_schema(mut self) -> Self {
        self.fail_schema = true;
        self
    }

    /// Every candidate tested so far, in call order
    pub fn calls(&self) -> &[Candidate] {
        &self.calls
    }

    fn position(&self, column: &str) -> usize {
        self.columns
            .iter()
            .position(|c| c == column)
            .unwrap_or_else(|| panic!("unknown column {column}"))
    }
}

impl DataSource for MemorySource {
    fn list_columns(&mut self, table: &str) -> FdResult<TableSchema> {
        if self.fail_schema {
            return Err(FdError::SchemaUnreadable {
                table: table.to_string(),
                reason: "injected catalog failure".to_string(),
            });
        }
        if table != self.table {
            return Err(FdError::TableNotFound { table: table.to_string() });
        }

        Ok(TableSchema {
            relation: self.table.clone(),
            columns: self.columns.clone(),
        })
    }

    fn has_rows(&mut self, _schema: &TableSchema) -> FdResult<bool> {
        Ok(!self.rows.is_empty())
    }

    fn has_violating_group(&mut self, schema: &TableSchema, candidate: &Candidate) -> FdResult<bool> {
        schema.check_candidate(candidate)?;
        self.calls.push(candidate.clone());

        if self.failing.contains(candidate) {
            return Err(FdError::Query {
                query: format!("injected failure for {candidate}"),
                error: "simulated connection loss".to_string(),
            });
        }

        let lhs: Vec<usize> = candidate.lhs.iter().map(|c| self.position(c)).collect();
        let rhs = self.position(&candidate.rhs);

        // GROUP BY treats NULLs as equal, so Option<String> keys match SQL
        let mut groups: HashMap<Vec<Option<&str>>, HashSet<Option<&str>>> = HashMap::new();
        for row in &self.rows {
            let key = lhs.iter().map(|&i| row[i].as_deref()).collect();
            groups.entry(key).or_default().insert(row[rhs].as_deref());
        }

        let null_policy = self.null_policy;
        Ok(groups.values().any(|values| {
            let distinct = match null_policy {
                NullPolicy::AsValue => values.len(),
                NullPolicy::Ignore => values.iter().filter(|v| v.is_some()).count(),
            };
            distinct > 1
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fd(lhs: &[&str], rhs: &str) -> Candidate {
        Candidate::new(lhs.iter().map(|s| s.to_string()).collect(), rhs)
    }

    #[test]
    fn test_grouping_matches_sql() {
        let mut source = MemorySource::new("items", &["id", "category", "price"])
            .row(&[Some("1"), Some("A"), Some("10")])
            .row(&[Some("2"), Some("A"), Some("10")])
            .row(&[Some("3"), Some("B"), Some("20")]);
        let schema = source.list_columns("items").unwrap();

        assert_eq!(source.has_violating_group(&schema, &fd(&["category"], "price")), Ok(false));
        assert_eq!(source.has_violating_group(&schema, &fd(&["category"], "id")), Ok(true));
    }

    #[test]
    fn test_null_policies() {
        let rows = |s: MemorySource| {
            s.row(&[Some("s1"), Some("10")])
                .row(&[Some("s1"), None])
                .row(&[Some("s2"), None])
                .row(&[Some("s2"), None])
        };
        let candidate = fd(&["sensor"], "value");

        let mut as_value = rows(MemorySource::new("readings", &["sensor", "value"]));
        let schema = as_value.list_columns("readings").unwrap();
        assert_eq!(as_value.has_violating_group(&schema, &candidate), Ok(true));

        let mut ignore =
            rows(MemorySource::new("readings", &["sensor", "value"]).null_policy(NullPolicy::Ignore));
        assert_eq!(ignore.has_violating_group(&schema, &candidate), Ok(false));
    }

    #[test]
    fn test_null_lhs_values_group_together() {
        let mut source = MemorySource::new("t", &["k", "v"])
            .row(&[None, Some("1")])
            .row(&[None, Some("2")]);
        let schema = source.list_columns("t").unwrap();
        assert_eq!(source.has_violating_group(&schema, &fd(&["k"], "v")), Ok(true));
    }

    #[test]
    fn test_injected_failures() {
        let mut source = MemorySource::new("t", &["a", "b"]).fail_on(&["a"], "b");
        let schema = source.list_columns("t").unwrap();

        let err = source.has_violating_group(&schema, &fd(&["a"], "b")).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(source.has_violating_group(&schema, &fd(&["b"], "a")), Ok(false));
        assert_eq!(source.calls().len(), 2);

        let mut broken = MemorySource::new("t", &["a"]).fail_schema();
        crate::error::testing::assert_fatal(broken.list_columns("t"));
    }

    #[test]
    fn test_unknown_table() {
        let mut source = MemorySource::new("t", &["a"]);
        crate::error::testing::assert_error_sqlstate(source.list_columns("other"), "42P01");
    }
}
