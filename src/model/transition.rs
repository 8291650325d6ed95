use ndarray::Array1;
use rand::{Rng, RngCore};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::error::Result;
use crate::model::probability::{write_nonzero, ProbabilityMatrix, RowIter};
use crate::types::Index;

/// `P(s' | s, ja)`, stored as one `|S| x |S|` matrix per joint action with
/// rows indexed by `s` and columns by `s'`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransitionModel {
    nr_states: usize,
    matrices: Vec<ProbabilityMatrix>,
}

impl TransitionModel {
    pub fn new(nr_states: usize, nr_joint_actions: usize, sparse: bool) -> Self {
        TransitionModel {
            nr_states,
            matrices: (0..nr_joint_actions)
                .map(|_| ProbabilityMatrix::zeros(nr_states, nr_states, sparse))
                .collect(),
        }
    }

    pub fn nr_states(&self) -> usize {
        self.nr_states
    }

    pub fn nr_joint_actions(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_sparse(&self) -> bool {
        self.matrices.first().map_or(false, |m| m.is_sparse())
    }

    pub fn get(&self, s: Index, ja: Index, s_next: Index) -> f64 {
        self.matrices[ja].get(s, s_next)
    }

    pub fn set(&mut self, s: Index, ja: Index, s_next: Index, p: f64) {
        self.matrices[ja].set(s, s_next, p);
    }

    pub fn matrix(&self, ja: Index) -> &ProbabilityMatrix {
        &self.matrices[ja]
    }

    pub fn sample(&self, s: Index, ja: Index, rng: &mut dyn RngCore) -> Index {
        self.matrices[ja].sample_row(s, rng.gen::<f64>())
    }

    pub fn sanity_check(&self) -> Result<()> {
        for (ja, matrix) in self.matrices.iter().enumerate() {
            matrix.sanity_check(|s| format!("transition row (s={}, ja={})", s, ja))?;
        }
        Ok(())
    }

    /// Direct access handle for hot loops.
    pub fn handle(&self) -> TGet<'_> {
        TGet {
            matrices: &self.matrices,
        }
    }
}

impl fmt::Display for TransitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ja\ts\ts'\tP")?;
        for (ja, matrix) in self.matrices.iter().enumerate() {
            write_nonzero(f, matrix, &format!("{}\t", ja))?;
        }
        Ok(())
    }
}

/// Borrowed view on a transition table. Holding one keeps the model from
/// being mutated.
#[derive(Clone, Copy, Debug)]
pub struct TGet<'a> {
    matrices: &'a [ProbabilityMatrix],
}

impl<'a> TGet<'a> {
    #[inline]
    pub fn get(&self, s: Index, ja: Index, s_next: Index) -> f64 {
        self.matrices[ja].get(s, s_next)
    }

    /// Successor states with non-zero probability from `s` under `ja`.
    #[inline]
    pub fn nonzero_row(&self, s: Index, ja: Index) -> RowIter<'a> {
        self.matrices[ja].nonzero_row(s)
    }

    pub fn matrix(&self, ja: Index) -> &'a ProbabilityMatrix {
        &self.matrices[ja]
    }

    /// Expected value of `v` over the successors of `s` under `ja`.
    #[inline]
    pub fn expectation(&self, s: Index, ja: Index, v: &Array1<f64>) -> f64 {
        self.matrices[ja].row_dot(s, v)
    }

    pub fn is_sparse(&self) -> bool {
        self.matrices.first().map_or(false, |m| m.is_sparse())
    }
}
