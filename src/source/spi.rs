use pgrx::prelude::*;
use crate::config::NullPolicy;
use crate::discovery::Candidate;
use crate::error::{FdError, FdResult};
use crate::utils::run_guarded;
use crate::validation::validate_table_name;
use super::query::{list_columns_query, resolve_relation_query, row_exists_query, violation_query};
use super::{DataSource, TableSchema};

/// Data source backed by the current backend's SPI connection
///
/// Every statement runs in its own internal subtransaction, so a failing
/// validity query leaves the calling transaction intact.
#[derive(Debug, Clone, Copy)]
pub struct SpiSource {
    null_policy: NullPolicy,
}

impl SpiSource {
    pub fn new(null_policy: NullPolicy) -> Self {
        Self { null_policy }
    }

    fn resolve_relation(table: &str) -> FdResult<String> {
        let query = resolve_relation_query(table);
        let resolved = run_guarded(|| Spi::get_one::<String>(&query))
            .map_err(|reason| FdError::SchemaUnreadable {
                table: table.to_string(),
                reason,
            })?
            .map_err(|e| FdError::SchemaUnreadable {
                table: table.to_string(),
                reason: e.to_string(),
            })?;

        resolved.ok_or_else(|| FdError::TableNotFound {
            table: table.to_string(),
        })
    }

    fn read_columns(relation: &str) -> FdResult<Vec<String>> {
        let query = list_columns_query(relation);
        let columns = run_guarded(|| {
            Spi::connect(|client| {
                let rows = client.select(query.as_str(), None, None)?;
                let mut columns = Vec::new();
                for row in rows {
                    if let Some(name) = row.get::<String>(1)? {
                        columns.push(name);
                    }
                }
                Ok::<_, spi::Error>(columns)
            })
        });

        columns
            .map_err(|reason| FdError::SchemaUnreadable {
                table: relation.to_string(),
                reason,
            })?
            .map_err(|e| FdError::SchemaUnreadable {
                table: relation.to_string(),
                reason: e.to_string(),
            })
    }

    /// Run a boolean probe, mapping any failure to `FdError::Query`
    fn probe(query: &str) -> FdResult<bool> {
        let answer = run_guarded(|| Spi::get_one::<bool>(query))
            .map_err(|error| FdError::Query {
                query: query.to_string(),
                error,
            })?
            .map_err(|e| FdError::Query {
                query: query.to_string(),
                error: e.to_string(),
            })?;

        Ok(answer.unwrap_or(false))
    }
}

impl DataSource for SpiSource {
    fn list_columns(&mut self, table: &str) -> FdResult<TableSchema> {
        validate_table_name(table)?;

        let relation = Self::resolve_relation(table)?;
        let columns = Self::read_columns(&relation)?;

        debug1!("pg_fdep: resolved '{}' to {} with {} columns", table, relation, columns.len());

        Ok(TableSchema { relation, columns })
    }

    fn has_rows(&mut self, schema: &TableSchema) -> FdResult<bool> {
        Self::probe(&row_exists_query(&schema.relation)).map_err(|e| FdError::SchemaUnreadable {
            table: schema.relation.clone(),
            reason: e.to_string(),
        })
    }

    fn has_violating_group(&mut self, schema: &TableSchema, candidate: &Candidate) -> FdResult<bool> {
        pgrx::check_for_interrupts!();

        let query = violation_query(schema, candidate, self.null_policy)?;
        Self::probe(&query)
    }
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;
    use super::*;

    fn items_table() {
        Spi::run(
            "CREATE TABLE items (id INT, category TEXT, price INT);
             INSERT INTO items VALUES (1, 'A', 10), (2, 'A', 10), (3, 'B', 20);",
        )
        .unwrap();
    }

    fn fd(lhs: &[&str], rhs: &str) -> Candidate {
        Candidate::new(lhs.iter().map(|s| s.to_string()).collect(), rhs)
    }

    #[pg_test]
    fn test_list_columns_in_declaration_order() {
        items_table();
        Spi::run("ALTER TABLE items DROP COLUMN category").unwrap();
        Spi::run("ALTER TABLE items ADD COLUMN label TEXT").unwrap();

        let schema = SpiSource::new(NullPolicy::AsValue).list_columns("items").unwrap();
        assert_eq!(schema.columns, vec!["id", "price", "label"]);
        assert_eq!(schema.relation, "items");
    }

    #[pg_test]
    fn test_list_columns_schema_qualified() {
        Spi::run("CREATE SCHEMA fd_sales").unwrap();
        Spi::run("CREATE TABLE fd_sales.\"Orders\" (\"OrderId\" INT, total INT)").unwrap();

        let mut source = SpiSource::new(NullPolicy::AsValue);
        crate::error::testing::assert_error_sqlstate(source.list_columns("fd_sales.orders"), "42P01");

        Spi::run("CREATE TABLE fd_sales.orders (a INT)").unwrap();
        let schema = source.list_columns("fd_sales.orders").unwrap();
        assert_eq!(schema.relation, "fd_sales.orders");
        assert_eq!(schema.columns, vec!["a"]);
    }

    #[pg_test]
    fn test_list_columns_missing_table() {
        let result = SpiSource::new(NullPolicy::AsValue).list_columns("no_such_table");
        crate::error::testing::assert_error_sqlstate(result, "42P01");
    }

    #[pg_test]
    fn test_list_columns_rejects_injection() {
        let result = SpiSource::new(NullPolicy::AsValue).list_columns("items'); DROP TABLE x; --");
        crate::error::testing::assert_error_sqlstate(result, "42501");
    }

    #[pg_test]
    fn test_zero_column_table() {
        Spi::run("CREATE TABLE no_columns ()").unwrap();
        let schema = SpiSource::new(NullPolicy::AsValue).list_columns("no_columns").unwrap();
        assert!(schema.columns.is_empty());
    }

    #[pg_test]
    fn test_has_violating_group() {
        items_table();
        let mut source = SpiSource::new(NullPolicy::AsValue);
        let schema = source.list_columns("items").unwrap();

        assert_eq!(source.has_violating_group(&schema, &fd(&["category"], "price")), Ok(false));
        assert_eq!(source.has_violating_group(&schema, &fd(&["price"], "id")), Ok(true));

        Spi::run("INSERT INTO items VALUES (4, 'A', 99)").unwrap();
        assert_eq!(source.has_violating_group(&schema, &fd(&["category"], "price")), Ok(true));
        assert_eq!(source.has_violating_group(&schema, &fd(&["id"], "category")), Ok(false));
    }

    #[pg_test]
    fn test_has_rows() {
        items_table();
        let mut source = SpiSource::new(NullPolicy::AsValue);
        let schema = source.list_columns("items").unwrap();
        assert_eq!(source.has_rows(&schema), Ok(true));

        Spi::run("DELETE FROM items").unwrap();
        assert_eq!(source.has_rows(&schema), Ok(false));
    }

    #[pg_test]
    fn test_null_policy() {
        Spi::run(
            "CREATE TABLE readings (sensor TEXT, value INT);
             INSERT INTO readings VALUES ('s1', 10), ('s1', NULL), ('s2', NULL), ('s2', NULL);",
        )
        .unwrap();
        let candidate = fd(&["sensor"], "value");

        let mut as_value = SpiSource::new(NullPolicy::AsValue);
        let schema = as_value.list_columns("readings").unwrap();
        assert_eq!(as_value.has_violating_group(&schema, &candidate), Ok(true));

        let mut ignore = SpiSource::new(NullPolicy::Ignore);
        assert_eq!(ignore.has_violating_group(&schema, &candidate), Ok(false));
    }

    #[pg_test]
    fn test_failing_query_is_query_error() {
        Spi::run(
            "CREATE TABLE docs (id INT, body JSON);
             INSERT INTO docs VALUES (1, '{}'), (2, '[]');",
        )
        .unwrap();
        let mut source = SpiSource::new(NullPolicy::AsValue);
        let schema = source.list_columns("docs").unwrap();

        let result = source.has_violating_group(&schema, &fd(&["id"], "body"));
        crate::error::testing::assert_error_sqlstate(result, "XX000");

        // The transaction survives and later probes still work
        assert!(source.has_violating_group(&schema, &fd(&["body"], "id")).is_err());
        assert_eq!(Spi::get_one::<i64>("SELECT COUNT(*) FROM docs"), Ok(Some(2)));
    }
}
