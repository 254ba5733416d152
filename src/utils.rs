use std::panic::AssertUnwindSafe;
use pgrx::prelude::*;
use pgrx::pg_sys::errcodes::PgSqlErrorCode;
use pgrx::pg_sys::panic::CaughtError;

/// Run `f` inside an internal subtransaction, turning a PostgreSQL ERROR
/// raised inside it into `Err(message)`.
///
/// On error the subtransaction is rolled back, so the surrounding
/// transaction stays usable and the caller can continue with the next
/// query. Query cancellation is re-thrown, never swallowed.
pub fn run_guarded<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    // SAFETY: plain reads of backend globals; we are on the backend thread
    let old_context = unsafe { pg_sys::CurrentMemoryContext };
    let old_owner = unsafe { pg_sys::CurrentResourceOwner };

    // SAFETY: BeginInternalSubTransaction switches into the subtransaction's
    // memory context; results must outlive it, so switch straight back
    unsafe {
        pg_sys::BeginInternalSubTransaction(std::ptr::null());
        pg_sys::CurrentMemoryContext = old_context;
    }

    let outcome = PgTryBuilder::new(AssertUnwindSafe(|| Ok(f())))
        .catch_when(PgSqlErrorCode::ERRCODE_QUERY_CANCELED, |e| e.rethrow())
        .catch_others(|e| Err(caught_message(&e)))
        .execute();

    // SAFETY: the subtransaction opened above is still the current one
    unsafe {
        if outcome.is_ok() {
            pg_sys::ReleaseCurrentSubTransaction();
        } else {
            pg_sys::FlushErrorState();
            pg_sys::RollbackAndReleaseCurrentSubTransaction();
        }
        pg_sys::CurrentMemoryContext = old_context;
        pg_sys::CurrentResourceOwner = old_owner;
    }

    outcome
}

fn caught_message(error: &CaughtError) -> String {
    match error {
        CaughtError::PostgresError(report) | CaughtError::ErrorReport(report) => {
            report.message().to_string()
        }
        CaughtError::RustPanic { ereport, .. } => ereport.message().to_string(),
    }
}

/// Run a query returning a single text value
pub fn spi_get_string(query: &str) -> spi::Result<Option<String>> {
    Spi::get_one::<String>(query)
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;
    use super::*;

    #[pg_test]
    fn test_run_guarded_passes_value_through() {
        let result = run_guarded(|| Spi::get_one::<i32>("SELECT 41 + 1"));
        assert_eq!(result, Ok(Ok(Some(42))));
    }

    #[pg_test]
    fn test_run_guarded_catches_error_and_keeps_transaction() {
        Spi::run("CREATE TABLE guarded_probe (v json)").unwrap();
        Spi::run("INSERT INTO guarded_probe VALUES ('{}'), ('[]')").unwrap();

        // json has no equality operator, so DISTINCT fails
        let result = run_guarded(|| Spi::get_one::<i64>("SELECT COUNT(DISTINCT v) FROM guarded_probe"));
        let message = result.expect_err("DISTINCT on json must fail");
        assert!(message.contains("equality operator"), "{message}");

        // The outer transaction is still usable
        let count = Spi::get_one::<i64>("SELECT COUNT(*) FROM guarded_probe").unwrap();
        assert_eq!(count, Some(2));
    }

    #[pg_test]
    fn test_run_guarded_rolls_back_failed_writes() {
        Spi::run("CREATE TABLE guarded_writes (id int)").unwrap();

        let result = run_guarded(|| {
            Spi::run("INSERT INTO guarded_writes VALUES (1)")?;
            Spi::run("SELECT 1 / 0")
        });
        assert!(result.is_err());

        let count = Spi::get_one::<i64>("SELECT COUNT(*) FROM guarded_writes").unwrap();
        assert_eq!(count, Some(0));
    }

    #[pg_test]
    fn test_spi_get_string() {
        assert_eq!(spi_get_string("SELECT 'fd'::text"), Ok(Some("fd".to_string())));
    }
}
