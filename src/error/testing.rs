//! Assertion helpers shared by unit tests and `#[pg_test]` tests.

use crate::{FdError, FdResult};

/// # Panics
/// Panics if the result is `Ok` or carries a different SQLSTATE.
pub fn assert_error_sqlstate<T>(result: FdResult<T>, expected_sqlstate: &str) {
    match result {
        Err(e) => assert_eq!(
            e.sqlstate(),
            expected_sqlstate,
            "Expected SQLSTATE {expected_sqlstate}, got {}: {e}",
            e.sqlstate()
        ),
        Ok(_) => panic!("Expected error with SQLSTATE {expected_sqlstate}, but operation succeeded"),
    }
}

/// # Panics
/// Panics if the result is `Ok` or its message lacks `expected_substring`.
pub fn assert_error_contains<T>(result: FdResult<T>, expected_substring: &str) {
    match result {
        Err(e) => {
            let message = e.to_string();
            assert!(
                message.contains(expected_substring),
                "Error message '{message}' does not contain '{expected_substring}'"
            );
        }
        Ok(_) => panic!("Expected error containing '{expected_substring}', but operation succeeded"),
    }
}

/// # Panics
/// Panics unless the result is an error that aborts a discovery run.
pub fn assert_fatal<T>(result: FdResult<T>) -> FdError {
    match result {
        Err(e) => {
            assert!(e.is_fatal(), "Expected a fatal error, got non-fatal: {e}");
            e
        }
        Ok(_) => panic!("Expected a fatal error, but operation succeeded"),
    }
}
