use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

use crate::types::{Index, PROB_PRECISION};

/// Row-major sparse probability matrix that never stores entries in
/// `[0, PROB_PRECISION]`. Negative and NaN values are kept so validation
/// can report them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    rows: Vec<BTreeMap<Index, f64>>,
}

impl SparseMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        SparseMatrix {
            nrows,
            ncols,
            rows: vec![BTreeMap::new(); nrows],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Stored value, zero when absent.
    ///
    /// # Panics
    /// Panics if `row` is out of range.
    pub fn get(&self, row: Index, col: Index) -> f64 {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    /// Stores `p`, or removes the entry when `0 <= p <= PROB_PRECISION`.
    ///
    /// # Panics
    /// Panics if `row` is out of range.
    pub fn set(&mut self, row: Index, col: Index, p: f64) {
        if (0.0..=PROB_PRECISION).contains(&p) {
            self.rows[row].remove(&col);
        } else {
            self.rows[row].insert(col, p);
        }
    }

    /// Stored entries of one row in increasing column order.
    pub fn row(&self, row: Index) -> impl Iterator<Item = (Index, f64)> + '_ {
        self.rows[row].iter().map(|(&c, &p)| (c, p))
    }

    pub(crate) fn row_map(&self, row: Index) -> &BTreeMap<Index, f64> {
        &self.rows[row]
    }

    /// All stored entries as `(row, col, value)`, row-major.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (Index, Index, f64)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, entries)| entries.iter().map(move |(&c, &p)| (r, c, p)))
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    pub fn row_sum(&self, row: Index) -> f64 {
        self.rows[row].values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_zero_is_never_stored() {
        let mut m = SparseMatrix::new(2, 3);
        m.set(0, 1, 0.5);
        m.set(0, 2, PROB_PRECISION);
        m.set(1, 0, 1e-15);
        assert_eq!(m.nnz(), 1);
        assert_eq!(m.get(0, 2), 0.0);

        m.set(0, 1, 0.0);
        assert_eq!(m.nnz(), 0);
        assert_eq!(m.get(0, 1), 0.0);
    }

    #[test]
    fn test_row_iteration_is_ordered() {
        let mut m = SparseMatrix::new(1, 5);
        m.set(0, 4, 0.25);
        m.set(0, 0, 0.5);
        m.set(0, 2, 0.25);
        let row: Vec<_> = m.row(0).collect();
        assert_eq!(row, vec![(0, 0.5), (2, 0.25), (4, 0.25)]);
        assert_eq!(m.row_sum(0), 1.0);
        assert_eq!(m.iter_nonzero().count(), 3);
    }

    #[test]
    fn test_negative_values_are_kept() {
        let mut m = SparseMatrix::new(1, 3);
        m.set(0, 2, -0.3);
        m.set(0, 1, -1e-15);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(0, 2), -0.3);
        assert_eq!(m.get(0, 1), -1e-15);

        m.set(0, 2, 0.0);
        assert_eq!(m.nnz(), 1);
    }
}
