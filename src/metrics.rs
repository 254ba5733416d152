use serde::Serialize;

// Stats of the most recent discovery run in this backend
// Thread-local: a backend runs one statement at a time
thread_local! {
    static LAST_RUN: std::cell::RefCell<Option<RunStats>> = const { std::cell::RefCell::new(None) };
}

/// Counters for one discovery run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Candidates whose validity test was issued
    pub candidates_tested: u64,
    /// `(L, R)` pairs passed over because `R ∈ L`
    pub trivial_skipped: u64,
    /// Candidates confirmed as dependencies
    pub dependencies_found: u64,
    /// Validity tests that failed and were treated as "not a dependency"
    pub query_errors: u64,
    /// Wall time of the run (nanoseconds)
    pub elapsed_ns: u64,
}

impl RunStats {
    /// Convert timing to milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ns as f64 / 1_000_000.0
    }
}

/// Public interface for run statistics
pub mod metrics_api {
    use super::*;

    /// Record the start of a discovery run
    pub fn record_run_start() -> RunTimer {
        RunTimer::new()
    }

    /// Stamp the elapsed time onto `stats` and keep them as the last run
    pub fn record_run_complete(mut stats: RunStats, timer: RunTimer) -> RunStats {
        stats.elapsed_ns = u64::try_from(timer.elapsed_ns()).unwrap_or(u64::MAX);
        LAST_RUN.with(|last| {
            *last.borrow_mut() = Some(stats.clone());
        });
        stats
    }

    /// Stats of the last completed run in this backend, if any
    pub fn last_run() -> Option<RunStats> {
        LAST_RUN.with(|last| last.borrow().clone())
    }

    pub fn reset_metrics() {
        LAST_RUN.with(|last| {
            *last.borrow_mut() = None;
        });
    }
}

/// Timer for measuring a discovery run
pub struct RunTimer {
    start: std::time::Instant,
}

impl RunTimer {
    fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ns(&self) -> u128 {
        self.start.elapsed().as_nanos()
    }
}

#[cfg(test)]
mod tests {
    use super::metrics_api::*;
    use super::*;

    #[test]
    fn test_record_and_read_last_run() {
        reset_metrics();
        assert_eq!(last_run(), None);

        let timer = record_run_start();
        let stats = RunStats {
            candidates_tested: 9,
            trivial_skipped: 3,
            dependencies_found: 4,
            ..RunStats::default()
        };
        let recorded = record_run_complete(stats, timer);

        let last = last_run().unwrap();
        assert_eq!(last, recorded);
        assert_eq!(last.candidates_tested, 9);
    }

    #[test]
    fn test_elapsed_ms() {
        let stats = RunStats {
            elapsed_ns: 1_500_000,
            ..RunStats::default()
        };
        assert!((stats.elapsed_ms() - 1.5).abs() < f64::EPSILON);
    }
}
