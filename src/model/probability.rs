use ndarray::{Array1, Array2};
use serde::{Serialize, Deserialize};
use std::collections::btree_map;
use std::fmt;

use crate::error::{MadpError, Result};
use crate::model::sparse::SparseMatrix;
use crate::types::{Index, PROB_PRECISION};

/// One 2D slice of a probability table: dense or sparse storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ProbabilityMatrix {
    Dense(Array2<f64>),
    Sparse(SparseMatrix),
}

impl ProbabilityMatrix {
    pub fn zeros(nrows: usize, ncols: usize, sparse: bool) -> Self {
        if sparse {
            ProbabilityMatrix::Sparse(SparseMatrix::new(nrows, ncols))
        } else {
            ProbabilityMatrix::Dense(Array2::zeros((nrows, ncols)))
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            ProbabilityMatrix::Dense(m) => m.nrows(),
            ProbabilityMatrix::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            ProbabilityMatrix::Dense(m) => m.ncols(),
            ProbabilityMatrix::Sparse(m) => m.ncols(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, ProbabilityMatrix::Sparse(_))
    }

    #[inline]
    pub fn get(&self, row: Index, col: Index) -> f64 {
        match self {
            ProbabilityMatrix::Dense(m) => m[[row, col]],
            ProbabilityMatrix::Sparse(m) => m.get(row, col),
        }
    }

    /// Dense storage overwrites unconditionally; sparse storage skips
    /// values in `[0, PROB_PRECISION]`.
    #[inline]
    pub fn set(&mut self, row: Index, col: Index, p: f64) {
        match self {
            ProbabilityMatrix::Dense(m) => m[[row, col]] = p,
            ProbabilityMatrix::Sparse(m) => m.set(row, col, p),
        }
    }

    /// Non-zero entries of a row in increasing column order.
    pub fn nonzero_row(&self, row: Index) -> RowIter<'_> {
        match self {
            ProbabilityMatrix::Dense(m) => RowIter::Dense {
                row: m.row(row),
                col: 0,
            },
            ProbabilityMatrix::Sparse(m) => RowIter::Sparse(m.row_map(row).iter()),
        }
    }

    pub fn row_sum(&self, row: Index) -> f64 {
        match self {
            ProbabilityMatrix::Dense(m) => m.row(row).sum(),
            ProbabilityMatrix::Sparse(m) => m.row_sum(row),
        }
    }

    /// `Σ_col P(row, col) · v[col]`; sparse storage visits stored entries only.
    #[inline]
    pub fn row_dot(&self, row: Index, v: &Array1<f64>) -> f64 {
        match self {
            ProbabilityMatrix::Dense(m) => m.row(row).dot(v),
            ProbabilityMatrix::Sparse(m) => m.row(row).map(|(col, p)| p * v[col]).sum(),
        }
    }

    /// Draws a column of `row` with inverse-CDF sampling for uniform `r`.
    pub fn sample_row(&self, row: Index, r: f64) -> Index {
        sample_inverse_cdf(self.nonzero_row(row), self.ncols(), r)
    }

    /// Checks that every row is a distribution. `label` names a row for the
    /// error message.
    pub fn sanity_check<F>(&self, label: F) -> Result<()>
    where
        F: Fn(Index) -> String,
    {
        for row in 0..self.nrows() {
            let mut sum = 0.0;
            for col in 0..self.ncols() {
                let p = self.get(row, col);
                if p.is_nan() || p < 0.0 {
                    return Err(MadpError::InvalidProbability {
                        location: format!("{}, column {}", label(row), col),
                        value: p,
                    });
                }
                sum += p;
            }
            if (sum - 1.0).abs() > PROB_PRECISION / 2.0 {
                return Err(MadpError::InvalidDistribution { row: label(row), sum });
            }
        }
        Ok(())
    }
}

/// Iterator over the non-zero `(column, probability)` pairs of one row.
pub enum RowIter<'a> {
    Dense {
        row: ndarray::ArrayView1<'a, f64>,
        col: usize,
    },
    Sparse(btree_map::Iter<'a, Index, f64>),
}

impl<'a> Iterator for RowIter<'a> {
    type Item = (Index, f64);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RowIter::Dense { row, col } => {
                while *col < row.len() {
                    let c = *col;
                    *col += 1;
                    let p = row[c];
                    if p != 0.0 {
                        return Some((c, p));
                    }
                }
                None
            }
            RowIter::Sparse(iter) => iter.next().map(|(&c, &p)| (c, p)),
        }
    }
}

/// Inverse-CDF sampling over `(index, probability)` pairs given in increasing
/// index order: returns the first index with positive mass at which the
/// cumulative sum reaches `r`. When rounding keeps the total below `r` the
/// last index with positive mass is returned (or `n - 1` if there is none).
pub fn sample_inverse_cdf<I>(entries: I, n: usize, r: f64) -> Index
where
    I: IntoIterator<Item = (Index, f64)>,
{
    let mut cumulative = 0.0;
    let mut last = None;
    for (index, p) in entries {
        if p <= 0.0 {
            continue;
        }
        cumulative += p;
        last = Some(index);
        if cumulative >= r {
            return index;
        }
    }
    last.unwrap_or(n.saturating_sub(1))
}

/// Writes the non-zero entries as `prefix row col p` lines.
pub(crate) fn write_nonzero(
    f: &mut fmt::Formatter<'_>,
    matrix: &ProbabilityMatrix,
    prefix: &str,
) -> fmt::Result {
    for row in 0..matrix.nrows() {
        for (col, p) in matrix.nonzero_row(row) {
            writeln!(f, "{}{}\t{}\t{}", prefix, row, col, p)?;
        }
    }
    Ok(())
}
