use rand::{Rng, RngCore};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::error::Result;
use crate::model::probability::{write_nonzero, ProbabilityMatrix, RowIter};
use crate::types::Index;

/// `P(jo | ja, s')`, stored as one `|S| x |JO|` matrix per joint action with
/// rows indexed by the successor state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObservationModel {
    nr_states: usize,
    nr_joint_observations: usize,
    matrices: Vec<ProbabilityMatrix>,
}

impl ObservationModel {
    pub fn new(nr_states: usize, nr_joint_actions: usize, nr_joint_observations: usize, sparse: bool) -> Self {
        ObservationModel {
            nr_states,
            nr_joint_observations,
            matrices: (0..nr_joint_actions)
                .map(|_| ProbabilityMatrix::zeros(nr_states, nr_joint_observations, sparse))
                .collect(),
        }
    }

    pub fn nr_states(&self) -> usize {
        self.nr_states
    }

    pub fn nr_joint_actions(&self) -> usize {
        self.matrices.len()
    }

    pub fn nr_joint_observations(&self) -> usize {
        self.nr_joint_observations
    }

    pub fn is_sparse(&self) -> bool {
        self.matrices.first().map_or(false, |m| m.is_sparse())
    }

    pub fn get(&self, ja: Index, s_next: Index, jo: Index) -> f64 {
        self.matrices[ja].get(s_next, jo)
    }

    pub fn set(&mut self, ja: Index, s_next: Index, jo: Index, p: f64) {
        self.matrices[ja].set(s_next, jo, p);
    }

    pub fn matrix(&self, ja: Index) -> &ProbabilityMatrix {
        &self.matrices[ja]
    }

    pub fn sample(&self, ja: Index, s_next: Index, rng: &mut dyn RngCore) -> Index {
        self.matrices[ja].sample_row(s_next, rng.gen::<f64>())
    }

    pub fn sanity_check(&self) -> Result<()> {
        for (ja, matrix) in self.matrices.iter().enumerate() {
            matrix.sanity_check(|s| format!("observation row (ja={}, s'={})", ja, s))?;
        }
        Ok(())
    }

    pub fn handle(&self) -> OGet<'_> {
        OGet {
            matrices: &self.matrices,
        }
    }
}

impl fmt::Display for ObservationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ja\ts'\tjo\tP")?;
        for (ja, matrix) in self.matrices.iter().enumerate() {
            write_nonzero(f, matrix, &format!("{}\t", ja))?;
        }
        Ok(())
    }
}

/// Borrowed view on an observation table.
#[derive(Clone, Copy, Debug)]
pub struct OGet<'a> {
    matrices: &'a [ProbabilityMatrix],
}

impl<'a> OGet<'a> {
    #[inline]
    pub fn get(&self, ja: Index, s_next: Index, jo: Index) -> f64 {
        self.matrices[ja].get(s_next, jo)
    }

    /// Joint observations with non-zero probability after reaching `s_next`.
    #[inline]
    pub fn nonzero_row(&self, ja: Index, s_next: Index) -> RowIter<'a> {
        self.matrices[ja].nonzero_row(s_next)
    }

    pub fn matrix(&self, ja: Index) -> &'a ProbabilityMatrix {
        &self.matrices[ja]
    }
}
