//! Functional Dependency Discovery
//!
//! Enumerates candidates `(L, R)` over a table's columns and keeps the ones
//! the data source confirms:
//! - **Combinations**: lazy k-subsets of the column list (`combinations`)
//! - **Candidates**: every `(L, R)` with `1 <= |L| <= K` and `R ∉ L` (`candidates`)
//! - **Engine**: drives the validity test per candidate and builds the report (`engine`)
//!
//! ## Ordering
//!
//! Candidates come out by increasing `|L|`, then lexicographic position of
//! `L` in the column list, then schema order of `R`. Results keep that order,
//! so two runs over an unchanged table produce identical output.

pub mod candidates;
pub mod combinations;
pub mod engine;

pub use candidates::{candidates, CandidateStream};
pub use combinations::{binomial, combinations};
pub use engine::{discover, DiscoveryReport};

use std::fmt;
use serde::Serialize;

/// An `(L, R)` pair under test
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub lhs: Vec<String>,
    pub rhs: String,
}

impl Candidate {
    pub fn new(lhs: Vec<String>, rhs: impl Into<String>) -> Self {
        Self { lhs, rhs: rhs.into() }
    }

    /// Non-empty left side and a right side not contained in it
    pub fn is_well_formed(&self) -> bool {
        !self.lhs.is_empty() && !self.lhs.contains(&self.rhs)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] -> [{}]", self.lhs.join(", "), self.rhs)
    }
}

/// A candidate the data confirmed: `lhs` determines `rhs`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionalDependency {
    pub lhs: Vec<String>,
    pub rhs: String,
}

impl From<Candidate> for FunctionalDependency {
    fn from(candidate: Candidate) -> Self {
        Self {
            lhs: candidate.lhs,
            rhs: candidate.rhs,
        }
    }
}

impl fmt::Display for FunctionalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] -> [{}]", self.lhs.join(", "), self.rhs)
    }
}

/// Confirmed dependencies of one run, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    dependencies: Vec<FunctionalDependency>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confirmed dependency
    pub fn push(&mut self, dependency: FunctionalDependency) {
        debug_assert!(
            !dependency.lhs.contains(&dependency.rhs),
            "trivial dependency {dependency} reached the result set"
        );
        self.dependencies.push(dependency);
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FunctionalDependency> {
        self.dependencies.iter()
    }

    /// Whether `lhs -> rhs` was confirmed (`lhs` compared as a set)
    pub fn holds(&self, lhs: &[&str], rhs: &str) -> bool {
        self.dependencies.iter().any(|fd| {
            fd.rhs == rhs
                && fd.lhs.len() == lhs.len()
                && lhs.iter().all(|c| fd.lhs.iter().any(|l| l == c))
        })
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a FunctionalDependency;
    type IntoIter = std::slice::Iter<'a, FunctionalDependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.dependencies.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = FunctionalDependency;
    type IntoIter = std::vec::IntoIter<FunctionalDependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.dependencies.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_display() {
        let fd = FunctionalDependency {
            lhs: vec!["marca".to_string(), "modelo".to_string()],
            rhs: "preco".to_string(),
        };
        assert_eq!(fd.to_string(), "[marca, modelo] -> [preco]");
    }

    #[test]
    fn test_candidate_well_formed() {
        assert!(Candidate::new(vec!["a".to_string()], "b").is_well_formed());
        assert!(!Candidate::new(vec!["a".to_string()], "a").is_well_formed());
        assert!(!Candidate::new(vec![], "a").is_well_formed());
    }

    #[test]
    fn test_result_set_holds_ignores_lhs_order() {
        let mut results = ResultSet::new();
        results.push(Candidate::new(vec!["a".to_string(), "b".to_string()], "c").into());

        assert!(results.holds(&["b", "a"], "c"));
        assert!(!results.holds(&["a"], "c"));
        assert!(!results.holds(&["a", "b"], "d"));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_result_set_serializes_as_list() {
        let mut results = ResultSet::new();
        results.push(Candidate::new(vec!["id".to_string()], "price").into());

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[0]["lhs"][0], "id");
        assert_eq!(json[0]["rhs"], "price");
    }
}
