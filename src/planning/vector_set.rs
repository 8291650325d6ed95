use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use serde::{Serialize, Deserialize};

use crate::error::{MadpError, Result};
use crate::planning::alpha_vector::AlphaVector;
use crate::types::Index;

/// A set of vectors over the state space, one per row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VectorSet {
    rows: Array2<f64>,
}

impl VectorSet {
    pub fn new(rows: Array2<f64>) -> Self {
        VectorSet { rows }
    }

    pub fn zeros(nr_vectors: usize, size: usize) -> Self {
        VectorSet {
            rows: Array2::zeros((nr_vectors, size)),
        }
    }

    /// Rows taken from the coefficients of `vf`; all vectors must have
    /// `size` entries.
    pub fn from_value_function(vf: &[AlphaVector], size: usize) -> Result<Self> {
        let mut rows = Array2::zeros((vf.len(), size));
        for (i, alpha) in vf.iter().enumerate() {
            if alpha.size() != size {
                return Err(MadpError::dimension_mismatch(
                    format!("vectors of size {}", size),
                    format!("vector {} of size {}", i, alpha.size()),
                ));
            }
            rows.row_mut(i).assign(&alpha.values);
        }
        Ok(VectorSet { rows })
    }

    pub fn nr_vectors(&self) -> usize {
        self.rows.nrows()
    }

    /// Number of states
    pub fn size(&self) -> usize {
        self.rows.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    pub fn row(&self, i: Index) -> ArrayView1<'_, f64> {
        self.rows.row(i)
    }

    pub fn rows(&self) -> &Array2<f64> {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Array2<f64> {
        &mut self.rows
    }

    pub fn push_row(&mut self, row: ArrayView1<'_, f64>) -> Result<()> {
        self.rows.push(Axis(0), row)?;
        Ok(())
    }

    /// The subset of rows at `indices`, in that order.
    pub fn select(&self, indices: &[Index]) -> VectorSet {
        VectorSet {
            rows: self.rows.select(Axis(0), indices),
        }
    }

    /// `Σ_s b(s) · row_i(s)` for the best row and its index.
    pub fn best_at(&self, belief: &Array1<f64>) -> Option<(Index, f64)> {
        let values = self.rows.dot(belief);
        let mut best: Option<(Index, f64)> = None;
        for (i, &v) in values.iter().enumerate() {
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((i, v));
            }
        }
        best
    }

    /// Adds `v` to every row.
    pub fn add_vector(&mut self, v: &Array1<f64>) {
        for mut row in self.rows.axis_iter_mut(Axis(0)) {
            row += v;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.rows *= factor;
    }
}

/// All pairwise sums: row `i * |B| + j` is `a_i + b_j`.
pub fn cross_sum(a: &VectorSet, b: &VectorSet) -> Result<VectorSet> {
    if a.size() != b.size() {
        return Err(MadpError::dimension_mismatch(
            format!("vectors of size {}", a.size()),
            format!("vectors of size {}", b.size()),
        ));
    }
    let nb = b.nr_vectors();
    let mut rows = Array2::zeros((a.nr_vectors() * nb, a.size()));
    for i in 0..a.nr_vectors() {
        let mut block = rows.slice_mut(s![i * nb..(i + 1) * nb, ..]);
        block.assign(&b.rows);
        block += &a.row(i);
    }
    Ok(VectorSet { rows })
}

/// Back-projected vector sets, indexed `[joint action][joint observation]`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GaoVectorSet {
    sets: Vec<Vec<VectorSet>>,
}

impl GaoVectorSet {
    pub fn new(sets: Vec<Vec<VectorSet>>) -> Self {
        GaoVectorSet { sets }
    }

    pub fn nr_joint_actions(&self) -> usize {
        self.sets.len()
    }

    pub fn nr_joint_observations(&self) -> usize {
        self.sets.first().map_or(0, |per_action| per_action.len())
    }

    pub fn get(&self, ja: Index, jo: Index) -> &VectorSet {
        &self.sets[ja][jo]
    }

    pub fn for_action(&self, ja: Index) -> &[VectorSet] {
        &self.sets[ja]
    }
}
