//! Discovery configuration: compile-time limits plus the `pg_fdep.*` GUCs.
//!
//! GUCs are registered once from `_PG_init`. A discovery run snapshots them
//! into a [`DiscoveryConfig`] so the engine never reads global state mid-run.

use pgrx::guc::{GucContext, GucFlags, GucRegistry, GucSetting};
use crate::error::{FdError, FdResult};

/// Default maximum left-hand-side size (K)
pub const DEFAULT_MAX_LHS_SIZE: usize = 3;

/// Upper bound accepted for K. Candidate count grows as C(n, K).
pub const MAX_LHS_SIZE_LIMIT: usize = 16;

pub static MAX_LHS_SIZE: GucSetting<i32> = GucSetting::<i32>::new(DEFAULT_MAX_LHS_SIZE as i32);
pub static NULL_AS_VALUE: GucSetting<bool> = GucSetting::<bool>::new(true);
pub static LOG_CANDIDATES: GucSetting<bool> = GucSetting::<bool>::new(false);

/// Register the extension GUCs. Called from `_PG_init`.
pub fn register_gucs() {
    GucRegistry::define_int_guc(
        "pg_fdep.max_lhs_size",
        "Maximum number of columns on the left-hand side of a candidate.",
        "Discovery enumerates left-hand sides of size 1 up to this value.",
        &MAX_LHS_SIZE,
        1,
        MAX_LHS_SIZE_LIMIT as i32,
        GucContext::Userset,
        GucFlags::default(),
    );

    GucRegistry::define_bool_guc(
        "pg_fdep.null_as_value",
        "Count NULL in the right-hand column as a distinct value.",
        "When off, COUNT(DISTINCT ...) semantics apply and NULLs are ignored.",
        &NULL_AS_VALUE,
        GucContext::Userset,
        GucFlags::default(),
    );

    GucRegistry::define_bool_guc(
        "pg_fdep.log_candidates",
        "Log every tested candidate at DEBUG1.",
        "",
        &LOG_CANDIDATES,
        GucContext::Userset,
        GucFlags::default(),
    );
}

/// How NULLs in the right-hand column take part in the distinct count
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// NULL is one more distinct value
    AsValue,
    /// Native `COUNT(DISTINCT ...)`: NULLs are skipped
    Ignore,
}

/// Settings for one discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub max_lhs_size: usize,
    pub null_policy: NullPolicy,
    pub log_candidates: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_lhs_size: DEFAULT_MAX_LHS_SIZE,
            null_policy: NullPolicy::AsValue,
            log_candidates: false,
        }
    }
}

impl DiscoveryConfig {
    /// Snapshot the current GUC values
    pub fn from_gucs() -> Self {
        Self {
            max_lhs_size: MAX_LHS_SIZE.get().max(1) as usize,
            null_policy: if NULL_AS_VALUE.get() {
                NullPolicy::AsValue
            } else {
                NullPolicy::Ignore
            },
            log_candidates: LOG_CANDIDATES.get(),
        }
    }

    /// Apply a per-call K override (`None` keeps the current value)
    pub fn with_max_lhs_size(mut self, max_lhs_size: Option<i32>) -> FdResult<Self> {
        if let Some(k) = max_lhs_size {
            if k < 1 || k as usize > MAX_LHS_SIZE_LIMIT {
                return Err(FdError::ConfigError {
                    setting: "max_lhs_size".to_string(),
                    value: k.to_string(),
                    reason: format!("must be between 1 and {}", MAX_LHS_SIZE_LIMIT),
                });
            }
            self.max_lhs_size = k as usize;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.max_lhs_size, 3);
        assert_eq!(config.null_policy, NullPolicy::AsValue);
        assert!(!config.log_candidates);
    }

    #[test]
    fn test_override_max_lhs_size() {
        let config = DiscoveryConfig::default().with_max_lhs_size(Some(1)).unwrap();
        assert_eq!(config.max_lhs_size, 1);

        let unchanged = DiscoveryConfig::default().with_max_lhs_size(None).unwrap();
        assert_eq!(unchanged.max_lhs_size, DEFAULT_MAX_LHS_SIZE);
    }

    #[test]
    fn test_override_out_of_range() {
        crate::error::testing::assert_error_sqlstate(
            DiscoveryConfig::default().with_max_lhs_size(Some(0)),
            "F0000",
        );
        crate::error::testing::assert_error_contains(
            DiscoveryConfig::default().with_max_lhs_size(Some(17)),
            "between 1 and 16",
        );
    }
}
