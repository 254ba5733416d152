use super::combinations::{combinations, Combinations};
use super::Candidate;

/// Lazy stream of every eligible `(L, R)` pair over `columns`
///
/// Sizes run from 1 to `min(max_lhs_size, columns.len())`. For each `L`,
/// right-hand columns follow schema order and members of `L` are skipped.
pub struct CandidateStream<'a> {
    columns: &'a [String],
    max_size: usize,
    size: usize,
    subsets: Combinations<'a, String>,
    current_lhs: Option<Vec<&'a String>>,
    rhs_pos: usize,
    skipped: u64,
}

pub fn candidates(columns: &[String], max_lhs_size: usize) -> CandidateStream<'_> {
    let max_size = max_lhs_size.min(columns.len());
    CandidateStream {
        columns,
        max_size,
        size: 1,
        subsets: combinations(columns, 1),
        current_lhs: None,
        rhs_pos: 0,
        skipped: 0,
    }
}

impl CandidateStream<'_> {
    /// Pairs passed over so far because `R ∈ L`
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Iterator for CandidateStream<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.max_size == 0 {
            return None;
        }

        loop {
            if let Some(lhs) = &self.current_lhs {
                while self.rhs_pos < self.columns.len() {
                    let rhs = &self.columns[self.rhs_pos];
                    self.rhs_pos += 1;

                    if lhs.contains(&rhs) {
                        self.skipped += 1;
                        continue;
                    }

                    let candidate = Candidate {
                        lhs: lhs.iter().map(|c| (*c).clone()).collect(),
                        rhs: rhs.clone(),
                    };
                    debug_assert!(candidate.is_well_formed());
                    return Some(candidate);
                }
            }

            match self.subsets.next() {
                Some(lhs) => {
                    self.current_lhs = Some(lhs);
                    self.rhs_pos = 0;
                }
                None if self.size < self.max_size => {
                    self.size += 1;
                    self.subsets = combinations(self.columns, self.size);
                    self.current_lhs = None;
                }
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::binomial;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_order_for_items_table() {
        let columns = cols(&["id", "category", "price"]);
        let got: Vec<String> = candidates(&columns, 3).map(|c| c.to_string()).collect();

        assert_eq!(
            got,
            vec![
                "[id] -> [category]",
                "[id] -> [price]",
                "[category] -> [id]",
                "[category] -> [price]",
                "[price] -> [id]",
                "[price] -> [category]",
                "[id, category] -> [price]",
                "[id, price] -> [category]",
                "[category, price] -> [id]",
            ]
        );
    }

    #[test]
    fn test_rhs_never_in_lhs() {
        let columns = cols(&["a", "b", "c", "d", "e"]);
        for candidate in candidates(&columns, 4) {
            assert!(candidate.is_well_formed(), "{candidate}");
        }
    }

    #[test]
    fn test_candidate_count_and_skips() {
        let columns = cols(&["a", "b", "c", "d", "e"]);
        let n = columns.len();
        let k = 3;

        let mut stream = candidates(&columns, k);
        let count = stream.by_ref().count() as u64;

        // Each L of size s pairs with n - s right-hand columns and skips s
        let expected: u64 = (1..=k).map(|s| binomial(n, s) * (n - s) as u64).sum();
        let expected_skips: u64 = (1..=k).map(|s| binomial(n, s) * s as u64).sum();
        assert_eq!(count, expected);
        assert_eq!(stream.skipped(), expected_skips);
    }

    #[test]
    fn test_k_larger_than_columns_is_clamped() {
        let columns = cols(&["a", "b"]);
        let got: Vec<String> = candidates(&columns, 5).map(|c| c.to_string()).collect();
        assert_eq!(got, vec!["[a] -> [b]", "[b] -> [a]"]);
    }

    #[test]
    fn test_no_columns_or_zero_k() {
        let empty: Vec<String> = vec![];
        assert_eq!(candidates(&empty, 3).count(), 0);

        let columns = cols(&["a", "b"]);
        assert_eq!(candidates(&columns, 0).count(), 0);
    }

    #[test]
    fn test_single_column_has_no_candidates() {
        let columns = cols(&["only"]);
        assert_eq!(candidates(&columns, 3).count(), 0);
    }
}
