use pgrx::prelude::*;
use pgrx::JsonB;

mod report;
mod setup;
mod utils;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod source;
pub mod validation;

pub use error::{FdError, FdResult};

use config::DiscoveryConfig;
use discovery::{Candidate, DiscoveryReport};
use source::{DataSource, SpiSource};

pg_module_magic!();

/// Get the version of the pg_fdep extension
#[pg_extern]
fn pg_fdep_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Initialize the extension
/// Registers the pg_fdep.* GUCs
#[pg_guard]
extern "C" fn _PG_init() {
    config::register_gucs();
    pgrx::log!("pg_fdep: _PG_init() called, GUCs registered");
}

/// Columns of a table in declaration order
#[pg_extern]
fn pg_fdep_columns(table_name: &str) -> Result<Vec<String>, FdError> {
    let schema = SpiSource::new(DiscoveryConfig::from_gucs().null_policy).list_columns(table_name)?;
    Ok(schema.columns)
}

/// Test a single candidate `lhs -> rhs` against the current table contents
///
/// Unlike a discovery run, a failing validity query is raised as an error.
#[pg_extern]
fn pg_fdep_check(table_name: &str, lhs: Vec<String>, rhs: &str) -> Result<bool, FdError> {
    let mut source = SpiSource::new(DiscoveryConfig::from_gucs().null_policy);
    let schema = source.list_columns(table_name)?;
    let candidate = Candidate::new(lhs, rhs);
    schema.check_candidate(&candidate)?;

    let violated = source.has_violating_group(&schema, &candidate)?;
    Ok(!violated)
}

/// Run discovery over `table_name` with the current settings
fn run_discovery(table_name: &str, max_lhs_size: Option<i32>) -> FdResult<DiscoveryReport> {
    let config = DiscoveryConfig::from_gucs().with_max_lhs_size(max_lhs_size)?;
    let mut source = SpiSource::new(config.null_policy);

    let report = discovery::discover(&mut source, table_name, &config)?;
    report::emit(&report);
    Ok(report)
}

/// Discover functional dependencies, one row per dependency in discovery order
#[pg_extern]
fn pg_fdep_discover(
    table_name: &str,
    max_lhs_size: default!(Option<i32>, "NULL"),
) -> Result<
    TableIterator<'static, (name!(lhs, Vec<String>), name!(rhs, String), name!(lhs_size, i32))>,
    FdError,
> {
    let report = run_discovery(table_name, max_lhs_size)?;

    let mut rows = Vec::with_capacity(report.dependencies.len());
    for fd in report.dependencies {
        let lhs_size = i32::try_from(fd.lhs.len())
            .map_err(|_| crate::internal_error!("lhs of {} columns does not fit in int", fd.lhs.len()))?;
        rows.push((fd.lhs, fd.rhs, lhs_size));
    }

    Ok(TableIterator::new(rows))
}

/// Discover functional dependencies and return the full report as JSONB
#[pg_extern]
fn pg_fdep_report(
    table_name: &str,
    max_lhs_size: default!(Option<i32>, "NULL"),
) -> Result<JsonB, FdError> {
    let report = run_discovery(table_name, max_lhs_size)?;
    Ok(JsonB(report::to_json(&report)?))
}

/// Recreate `table_name` from a seed script
#[pg_extern]
fn pg_fdep_prepare(table_name: &str, seed_sql: &str) -> Result<String, FdError> {
    let relation = setup::prepare(table_name, seed_sql)?;
    Ok(format!("Table '{}' prepared", relation))
}

/// Statistics of the last discovery run in this backend
#[pg_extern]
fn pg_fdep_last_run() -> Result<Option<JsonB>, FdError> {
    match metrics::metrics_api::last_run() {
        Some(stats) => Ok(Some(JsonB(serde_json::to_value(stats)?))),
        None => Ok(None),
    }
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;

    fn items_table() {
        Spi::run(
            "CREATE TABLE items (id INT, category TEXT, price INT);
             INSERT INTO items VALUES (1, 'A', 10), (2, 'A', 10), (3, 'B', 20);",
        )
        .unwrap();
    }

    #[pg_test]
    fn test_version_callable_from_sql() {
        let version = Spi::get_one::<String>("SELECT pg_fdep_version()");
        assert_eq!(version, Ok(Some(env!("CARGO_PKG_VERSION").to_string())));
    }

    #[pg_test]
    #[should_panic(expected = "Table 'missing' does not exist")]
    fn test_error_propagates_to_postgres() {
        Spi::run("SELECT pg_fdep_columns('missing')").unwrap();
    }

    #[pg_test]
    fn test_columns_from_sql() {
        items_table();
        let columns = Spi::get_one::<Vec<String>>("SELECT pg_fdep_columns('items')");
        assert_eq!(
            columns,
            Ok(Some(vec!["id".to_string(), "category".to_string(), "price".to_string()]))
        );
    }

    #[pg_test]
    fn test_discover_items_from_sql() {
        items_table();

        let count = Spi::get_one::<i64>("SELECT COUNT(*) FROM pg_fdep_discover('items')");
        assert_eq!(count, Ok(Some(6)));

        let holds = Spi::get_one::<bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_fdep_discover('items') \
             WHERE lhs = ARRAY['category'] AND rhs = 'price')",
        );
        assert_eq!(holds, Ok(Some(true)));

        let first = Spi::get_one::<String>(
            "SELECT lhs[1] || '->' || rhs FROM pg_fdep_discover('items') LIMIT 1",
        );
        assert_eq!(first, Ok(Some("id->category".to_string())));
    }

    #[pg_test]
    fn test_discover_after_new_row() {
        items_table();
        Spi::run("INSERT INTO items VALUES (4, 'A', 99)").unwrap();

        let category_price = Spi::get_one::<bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_fdep_discover('items') \
             WHERE lhs = ARRAY['category'] AND rhs = 'price')",
        );
        assert_eq!(category_price, Ok(Some(false)));

        let id_category = Spi::get_one::<bool>("SELECT pg_fdep_check('items', ARRAY['id'], 'category')");
        assert_eq!(id_category, Ok(Some(true)));
    }

    #[pg_test]
    fn test_max_lhs_size_argument_and_guc() {
        items_table();

        let singles = Spi::get_one::<i64>("SELECT COUNT(*) FROM pg_fdep_discover('items', 1)");
        assert_eq!(singles, Ok(Some(4)));

        Spi::run("SET pg_fdep.max_lhs_size = 1").unwrap();
        let max_size = Spi::get_one::<i32>("SELECT MAX(lhs_size) FROM pg_fdep_discover('items')");
        assert_eq!(max_size, Ok(Some(1)));
    }

    #[pg_test]
    #[should_panic(expected = "must be between 1 and 16")]
    fn test_max_lhs_size_out_of_range() {
        items_table();
        Spi::run("SELECT * FROM pg_fdep_discover('items', 0)").unwrap();
    }

    #[pg_test]
    fn test_failing_candidates_do_not_abort_run() {
        Spi::run(
            "CREATE TABLE docs (id INT, body JSON, kind TEXT);
             INSERT INTO docs VALUES (1, '{}', 'a'), (2, '[]', 'a');",
        )
        .unwrap();

        // id -> kind still holds although every candidate touching body fails
        let holds = Spi::get_one::<bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_fdep_discover('docs', 1) \
             WHERE lhs = ARRAY['id'] AND rhs = 'kind')",
        );
        assert_eq!(holds, Ok(Some(true)));

        let errors = Spi::get_one::<i64>("SELECT (pg_fdep_last_run()->>'query_errors')::bigint");
        assert_eq!(errors, Ok(Some(4)));
    }

    #[pg_test]
    #[should_panic(expected = "Validity query failed")]
    fn test_check_raises_query_error() {
        Spi::run("CREATE TABLE docs (id INT, body JSON); INSERT INTO docs VALUES (1, '{}');").unwrap();
        Spi::run("SELECT pg_fdep_check('docs', ARRAY['body'], 'id')").unwrap();
    }

    #[pg_test]
    #[should_panic(expected = "is not a column of")]
    fn test_check_rejects_unknown_column() {
        items_table();
        Spi::run("SELECT pg_fdep_check('items', ARRAY['colour'], 'price')").unwrap();
    }

    #[pg_test]
    fn test_null_policy_guc() {
        Spi::run(
            "CREATE TABLE readings (sensor TEXT, value INT);
             INSERT INTO readings VALUES ('s1', 10), ('s1', NULL), ('s2', NULL);",
        )
        .unwrap();
        let check = "SELECT pg_fdep_check('readings', ARRAY['sensor'], 'value')";

        assert_eq!(Spi::get_one::<bool>(check), Ok(Some(false)));
        Spi::run("SET pg_fdep.null_as_value = off").unwrap();
        assert_eq!(Spi::get_one::<bool>(check), Ok(Some(true)));
    }

    #[pg_test]
    fn test_report_json() {
        items_table();
        let report = Spi::get_one::<pgrx::JsonB>("SELECT pg_fdep_report('items')")
            .unwrap()
            .unwrap()
            .0;

        assert_eq!(report["table"], "items");
        assert_eq!(report["max_lhs_size"], 3);
        assert_eq!(report["stats"]["dependencies_found"], 6);
        assert_eq!(report["lines"][2], "Total functional dependencies found: 6");
    }

    #[pg_test]
    fn test_prepare_then_discover() {
        let message = Spi::get_one::<String>(
            "SELECT pg_fdep_prepare('items', \
             'CREATE TABLE items (id INT, category TEXT, price INT); \
              INSERT INTO items VALUES (1, ''A'', 10), (2, ''A'', 10), (3, ''B'', 20);')",
        );
        assert_eq!(message, Ok(Some("Table 'items' prepared".to_string())));

        let count = Spi::get_one::<i64>("SELECT COUNT(*) FROM pg_fdep_discover('items')");
        assert_eq!(count, Ok(Some(6)));
    }

    #[pg_test]
    fn test_empty_table_yields_nothing() {
        Spi::run("CREATE TABLE empty_items (id INT, category TEXT)").unwrap();
        let count = Spi::get_one::<i64>("SELECT COUNT(*) FROM pg_fdep_discover('empty_items')");
        assert_eq!(count, Ok(Some(0)));
    }
}
