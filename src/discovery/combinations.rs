//! Lazy k-subsets of an ordered slice.
//!
//! Subsets are produced in lexicographic order of source positions, each
//! subset preserving source order. The iterator keeps the chosen positions
//! and backtracks by bumping the rightmost position that still has room,
//! so nothing beyond the current subset is ever held in memory.

/// Iterator over all `size`-element subsets of `items`
#[derive(Debug, Clone)]
pub struct Combinations<'a, T> {
    items: &'a [T],
    indices: Vec<usize>,
    first: bool,
    done: bool,
}

/// All subsets of `items` with exactly `size` elements
///
/// Yields C(items.len(), size) subsets. A `size` larger than the slice
/// yields nothing; `size == 0` yields the single empty subset.
pub fn combinations<T>(items: &[T], size: usize) -> Combinations<'_, T> {
    Combinations {
        items,
        indices: (0..size).collect(),
        first: true,
        done: size > items.len(),
    }
}

impl<T> Combinations<'_, T> {
    /// Move `indices` to the next subset; false once exhausted
    fn advance(&mut self) -> bool {
        let n = self.items.len();
        let k = self.indices.len();

        // Rightmost position i whose index can still grow: indices[i] < n - k + i
        let Some(i) = (0..k).rev().find(|&i| self.indices[i] < n - k + i) else {
            return false;
        };

        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        true
    }
}

impl<'a, T> Iterator for Combinations<'a, T> {
    type Item = Vec<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.first {
            self.first = false;
        } else if !self.advance() {
            self.done = true;
            return None;
        }

        let items = self.items;
        Some(self.indices.iter().map(|&i| &items[i]).collect())
    }
}

/// C(n, k), saturating at `u64::MAX`
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k) as u64;
    let n = n as u64;
    let mut acc: u64 = 1;
    for i in 0..k {
        // acc * (n - i) / (i + 1) stays integral at every step
        acc = match acc.checked_mul(n - i) {
            Some(v) => v / (i + 1),
            None => return u64::MAX,
        };
    }
    acc
}
