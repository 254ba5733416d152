use pgrx::prelude::*;
use crate::error::{FdError, FdResult};
use crate::require;
use crate::source::query::resolve_relation_query;
use crate::utils::{run_guarded, spi_get_string};
use crate::validation::validate_table_name;

/// Drop `table` if present, run `seed_sql`, and confirm the table exists.
///
/// Returns the relation name as the catalog renders it. Any failure is an
/// `FdError::Setup`; the seed's partial effects are rolled back with it.
pub fn prepare(table: &str, seed_sql: &str) -> FdResult<String> {
    validate_table_name(table)?;

    let setup_error = |reason: String| FdError::Setup {
        table: table.to_string(),
        reason,
    };

    info!("pg_fdep: preparing table {}", table);

    // validated above: identifier characters only, so unquoted is safe and
    // folds case the same way to_regclass does
    let drop_sql = format!("DROP TABLE IF EXISTS {}", table);
    run_guarded(|| {
        Spi::run(&drop_sql)?;
        Spi::run(seed_sql)
    })
    .map_err(setup_error)?
    .map_err(|e| setup_error(e.to_string()))?;

    let relation = run_guarded(|| spi_get_string(&resolve_relation_query(table)))
        .map_err(setup_error)?
        .map_err(|e| setup_error(e.to_string()))?;
    let relation = require!(
        relation,
        setup_error("seed script did not create the table".to_string())
    );

    info!("pg_fdep: table {} ready", relation);
    Ok(relation)
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;
    use super::*;

    const ITEMS_SEED: &str = "CREATE TABLE items (id INT, category TEXT, price INT);
         INSERT INTO items VALUES (1, 'A', 10), (2, 'A', 10), (3, 'B', 20);";

    #[pg_test]
    fn test_prepare_creates_and_seeds() {
        assert_eq!(prepare("items", ITEMS_SEED), Ok("items".to_string()));
        assert_eq!(Spi::get_one::<i64>("SELECT COUNT(*) FROM items"), Ok(Some(3)));
    }

    #[pg_test]
    fn test_prepare_replaces_existing_table() {
        Spi::run("CREATE TABLE items (legacy TEXT); INSERT INTO items VALUES ('old');").unwrap();

        prepare("items", ITEMS_SEED).unwrap();
        let columns = Spi::get_one::<i64>(
            "SELECT COUNT(*) FROM information_schema.columns WHERE table_name = 'items'",
        );
        assert_eq!(columns, Ok(Some(3)));
    }

    #[pg_test]
    fn test_failing_seed_is_setup_error() {
        let result = prepare("items", "CREATE TABLE items (id INT); INSERT INTO items VALUES ('x');");
        crate::error::testing::assert_error_sqlstate(result, "55000");

        // Rolled back with the failed seed
        let exists = Spi::get_one::<bool>("SELECT to_regclass('items') IS NOT NULL");
        assert_eq!(exists, Ok(Some(false)));
    }

    #[pg_test]
    fn test_seed_without_table_is_setup_error() {
        let result = prepare("items", "SELECT 1");
        crate::error::testing::assert_error_contains(result, "did not create the table");
    }

    #[pg_test]
    fn test_prepare_rejects_unsafe_name() {
        let result = prepare("items; DROP TABLE pg_class", ITEMS_SEED);
        crate::error::testing::assert_error_sqlstate(result, "42501");
    }
}
