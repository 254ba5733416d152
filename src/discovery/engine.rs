use pgrx::prelude::*;
use serde::Serialize;
use crate::config::{DiscoveryConfig, NullPolicy};
use crate::error::FdResult;
use crate::metrics::{metrics_api, RunStats};
use crate::source::DataSource;
use super::{binomial, candidates, ResultSet};

/// Outcome of one discovery run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryReport {
    /// Relation name as resolved by the data source
    pub table: String,
    pub columns: Vec<String>,
    pub max_lhs_size: usize,
    pub null_policy: NullPolicy,
    pub dependencies: ResultSet,
    pub stats: RunStats,
}

/// Discover every non-trivial functional dependency `L -> R` with
/// `1 <= |L| <= config.max_lhs_size` that holds in `table`.
///
/// Schema errors abort the run. A failed validity test only marks that
/// candidate as "not a dependency"; enumeration goes on with the next one.
/// An empty table yields no dependencies.
pub fn discover<S: DataSource>(
    source: &mut S,
    table: &str,
    config: &DiscoveryConfig,
) -> FdResult<DiscoveryReport> {
    let timer = metrics_api::record_run_start();
    let schema = source.list_columns(table)?;
    info!(
        "pg_fdep: discovering dependencies in {} ({} columns, max_lhs_size {}, up to {} candidates)",
        schema.relation,
        schema.columns.len(),
        config.max_lhs_size,
        planned_candidates(schema.columns.len(), config.max_lhs_size)
    );

    let mut stats = RunStats::default();
    let mut dependencies = ResultSet::new();

    if schema.columns.is_empty() {
        debug1!("pg_fdep: {} has no columns, nothing to test", schema.relation);
    } else if !source.has_rows(&schema)? {
        debug1!("pg_fdep: {} is empty, nothing to test", schema.relation);
    } else {
        let mut stream = candidates(&schema.columns, config.max_lhs_size);

        for candidate in stream.by_ref() {
            stats.candidates_tested += 1;

            match source.has_violating_group(&schema, &candidate) {
                Ok(false) => {
                    if config.log_candidates {
                        debug1!("pg_fdep: {} holds", candidate);
                    }
                    dependencies.push(candidate.into());
                }
                Ok(true) => {
                    if config.log_candidates {
                        debug1!("pg_fdep: {} violated", candidate);
                    }
                }
                Err(e) if !e.is_fatal() => {
                    warning!("pg_fdep: could not test {}: {}", candidate, e);
                    stats.query_errors += 1;
                }
                Err(e) => return Err(e),
            }
        }

        stats.trivial_skipped = stream.skipped();
    }

    stats.dependencies_found = dependencies.len() as u64;
    let stats = metrics_api::record_run_complete(stats, timer);

    info!(
        "pg_fdep: {} tested {} candidates, found {} dependencies ({} query errors) in {:.3} ms",
        schema.relation,
        stats.candidates_tested,
        stats.dependencies_found,
        stats.query_errors,
        stats.elapsed_ms()
    );

    Ok(DiscoveryReport {
        table: schema.relation,
        columns: schema.columns,
        max_lhs_size: config.max_lhs_size,
        null_policy: config.null_policy,
        dependencies,
        stats,
    })
}

/// Number of `(L, R)` pairs a run over `columns` columns will test
fn planned_candidates(columns: usize, max_lhs_size: usize) -> u64 {
    (1..=max_lhs_size.min(columns))
        .map(|k| binomial(columns, k).saturating_mul((columns - k) as u64))
        .fold(0, u64::saturating_add)
}

#[cfg(any(test, feature = "pg_test"))]
#[pg_schema]
mod tests {
    use pgrx::prelude::*;
    use super::*;
    use crate::discovery::Candidate;
    use crate::source::memory::MemorySource;

    fn items() -> MemorySource {
        MemorySource::new("items", &["id", "category", "price"])
            .row(&[Some("1"), Some("A"), Some("10")])
            .row(&[Some("2"), Some("A"), Some("10")])
            .row(&[Some("3"), Some("B"), Some("20")])
    }

    #[pg_test]
    fn test_items_dependencies() {
        let report = discover(&mut items(), "items", &DiscoveryConfig::default()).unwrap();
        let fds = &report.dependencies;

        assert!(fds.holds(&["category"], "price"));
        assert!(fds.holds(&["price"], "category"));
        assert!(fds.holds(&["id"], "category"));
        assert!(fds.holds(&["id"], "price"));
        assert!(!fds.holds(&["category"], "id"));
        assert!(!fds.holds(&["price"], "id"));
        assert!(fds.holds(&["id", "category"], "price"));
        assert!(fds.holds(&["id", "price"], "category"));
        assert!(!fds.holds(&["category", "price"], "id"));
        assert_eq!(fds.len(), 6);

        assert_eq!(report.stats.candidates_tested, 9);
        assert_eq!(report.stats.trivial_skipped, 12);
        assert_eq!(report.stats.dependencies_found, 6);
        assert_eq!(report.stats.query_errors, 0);
    }

    #[pg_test]
    fn test_new_row_breaks_dependency() {
        let mut source = items();
        source.push_row(&[Some("4"), Some("A"), Some("99")]);

        let report = discover(&mut source, "items", &DiscoveryConfig::default()).unwrap();
        assert!(!report.dependencies.holds(&["category"], "price"));
        assert!(report.dependencies.holds(&["id"], "category"));
        assert!(report.dependencies.holds(&["price"], "category"));
        assert_eq!(report.dependencies.len(), 5);
    }

    #[pg_test]
    fn test_single_row_every_candidate_holds() {
        let mut source = MemorySource::new("one", &["a", "b", "c", "d"])
            .row(&[Some("1"), Some("2"), None, Some("4")]);
        let report = discover(&mut source, "one", &DiscoveryConfig::default()).unwrap();

        let expected: u64 = (1..=3).map(|k| binomial(4, k) * (4 - k as u64)).sum();
        assert_eq!(expected, planned_candidates(4, 3));
        assert_eq!(report.stats.candidates_tested, expected);
        assert_eq!(report.dependencies.len() as u64, expected);
    }

    #[pg_test]
    fn test_empty_table_and_no_columns() {
        let mut empty = MemorySource::new("empty", &["a", "b"]);
        let report = discover(&mut empty, "empty", &DiscoveryConfig::default()).unwrap();
        assert!(report.dependencies.is_empty());
        assert_eq!(report.stats.candidates_tested, 0);
        assert!(empty.calls().is_empty());

        let mut bare = MemorySource::new("bare", &[]);
        let report = discover(&mut bare, "bare", &DiscoveryConfig::default()).unwrap();
        assert!(report.dependencies.is_empty());
        assert!(report.columns.is_empty());
    }

    #[pg_test]
    fn test_runs_are_deterministic() {
        let mut source = items();
        let first = discover(&mut source, "items", &DiscoveryConfig::default()).unwrap();
        let first_calls = source.calls().to_vec();
        let second = discover(&mut source, "items", &DiscoveryConfig::default()).unwrap();

        assert_eq!(first.dependencies, second.dependencies);
        assert_eq!(&source.calls()[first_calls.len()..], first_calls.as_slice());
        assert_eq!(first_calls[0], Candidate::new(vec!["id".to_string()], "category"));
    }

    #[pg_test]
    fn test_supersets_of_a_dependency_hold() {
        let mut source = MemorySource::new("t", &["a", "b", "c", "d"])
            .row(&[Some("1"), Some("x"), Some("p"), Some("7")])
            .row(&[Some("1"), Some("y"), Some("p"), Some("8")])
            .row(&[Some("2"), Some("x"), Some("q"), Some("7")])
            .row(&[Some("2"), Some("y"), Some("q"), Some("9")]);
        let report = discover(&mut source, "t", &DiscoveryConfig::default()).unwrap();
        let fds = &report.dependencies;
        assert!(fds.holds(&["a"], "c"));

        for fd in fds {
            for extra in &report.columns {
                if *extra == fd.rhs || fd.lhs.contains(extra) || fd.lhs.len() == 3 {
                    continue;
                }
                let mut lhs: Vec<&str> = fd.lhs.iter().map(String::as_str).collect();
                lhs.push(extra);
                assert!(fds.holds(&lhs, &fd.rhs), "{fd} holds but superset with {extra} does not");
            }
        }
    }

    #[pg_test]
    fn test_query_error_skips_only_that_candidate() {
        let mut source = items().fail_on(&["category"], "price");
        let report = discover(&mut source, "items", &DiscoveryConfig::default()).unwrap();

        assert!(!report.dependencies.holds(&["category"], "price"));
        assert!(report.dependencies.holds(&["price"], "category"));
        assert!(report.dependencies.holds(&["id", "category"], "price"));
        assert_eq!(report.dependencies.len(), 5);
        assert_eq!(report.stats.query_errors, 1);
        assert_eq!(report.stats.candidates_tested, 9);
    }

    #[pg_test]
    fn test_schema_error_aborts_run() {
        let mut broken = items().fail_schema();
        let err = crate::error::testing::assert_fatal(discover(&mut broken, "items", &DiscoveryConfig::default()));
        assert_eq!(err.sqlstate(), "58030");
        assert!(broken.calls().is_empty());

        crate::error::testing::assert_error_sqlstate(
            discover(&mut items(), "missing", &DiscoveryConfig::default()),
            "42P01",
        );
    }

    #[pg_test]
    fn test_max_lhs_size_bounds_enumeration() {
        let single = DiscoveryConfig::default().with_max_lhs_size(Some(1)).unwrap();
        let report = discover(&mut items(), "items", &single).unwrap();
        assert_eq!(report.stats.candidates_tested, 6);
        assert_eq!(report.stats.trivial_skipped, 3);
        assert_eq!(report.dependencies.len(), 4);
        assert!(report.dependencies.iter().all(|fd| fd.lhs.len() == 1));

        // K larger than the column count is clamped
        let wide = DiscoveryConfig::default().with_max_lhs_size(Some(16)).unwrap();
        let report = discover(&mut items(), "items", &wide).unwrap();
        assert_eq!(report.stats.candidates_tested, 9);
    }

    #[pg_test]
    fn test_run_recorded_as_last_run() {
        let report = discover(&mut items(), "items", &DiscoveryConfig::default()).unwrap();
        assert_eq!(metrics_api::last_run(), Some(report.stats));
    }
}
