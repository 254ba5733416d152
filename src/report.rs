//! Report rendering for a finished discovery run.
//!
//! The text form goes to the log sink at INFO; the JSON form backs
//! `pg_fdep_report()`.

use pgrx::prelude::*;
use serde_json::json;
use crate::discovery::DiscoveryReport;
use crate::error::FdResult;

/// Human-readable report lines in discovery order
pub fn render_lines(report: &DiscoveryReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.dependencies.len() + 3);
    lines.push(format!("Table: {}", report.table));
    lines.push(format!("Columns: {}", report.columns.join(", ")));
    lines.push(format!(
        "Total functional dependencies found: {}",
        report.dependencies.len()
    ));
    lines.extend(report.dependencies.iter().map(ToString::to_string));
    lines
}

/// Write the text report to the log sink
pub fn emit(report: &DiscoveryReport) {
    for line in render_lines(report) {
        info!("{}", line);
    }
}

pub fn to_json(report: &DiscoveryReport) -> FdResult<serde_json::Value> {
    let mut value = serde_json::to_value(report)?;

    if let Some(object) = value.as_object_mut() {
        object.insert("lines".to_string(), json!(render_lines(report)));
        object.insert(
            "generated_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NullPolicy;
    use crate::discovery::{Candidate, ResultSet};
    use crate::metrics::RunStats;

    fn report() -> DiscoveryReport {
        let mut dependencies = ResultSet::new();
        dependencies.push(Candidate::new(vec!["category".to_string()], "price").into());
        dependencies.push(Candidate::new(vec!["id".to_string(), "category".to_string()], "price").into());

        DiscoveryReport {
            table: "items".to_string(),
            columns: vec!["id".to_string(), "category".to_string(), "price".to_string()],
            max_lhs_size: 3,
            null_policy: NullPolicy::AsValue,
            dependencies,
            stats: RunStats {
                candidates_tested: 9,
                dependencies_found: 2,
                ..RunStats::default()
            },
        }
    }

    #[test]
    fn test_render_lines() {
        assert_eq!(
            render_lines(&report()),
            vec![
                "Table: items",
                "Columns: id, category, price",
                "Total functional dependencies found: 2",
                "[category] -> [price]",
                "[id, category] -> [price]",
            ]
        );
    }

    #[test]
    fn test_render_empty_report() {
        let mut empty = report();
        empty.dependencies = ResultSet::new();
        let lines = render_lines(&empty);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "Total functional dependencies found: 0");
    }

    #[test]
    fn test_json_report() {
        let value = to_json(&report()).unwrap();

        assert_eq!(value["table"], "items");
        assert_eq!(value["null_policy"], "as_value");
        assert_eq!(value["dependencies"][1]["lhs"], json!(["id", "category"]));
        assert_eq!(value["stats"]["candidates_tested"], 9);
        assert_eq!(value["lines"][3], "[category] -> [price]");
        assert!(value["generated_at"].as_str().is_some());
    }
}
