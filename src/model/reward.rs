use ndarray::{Array1, Array2};
use serde::{Serialize, Deserialize};
use std::collections::HashMap;

use crate::error::{check_index, Result};
use crate::types::{Index, REWARD_PRECISION};

/// `R(s, ja)` in dense or sparse storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum RewardModel {
    Dense(Array2<f64>),
    Sparse {
        nr_states: usize,
        nr_joint_actions: usize,
        entries: HashMap<(Index, Index), f64>,
    },
}

impl RewardModel {
    pub fn new(nr_states: usize, nr_joint_actions: usize, sparse: bool) -> Self {
        if sparse {
            RewardModel::Sparse {
                nr_states,
                nr_joint_actions,
                entries: HashMap::new(),
            }
        } else {
            RewardModel::Dense(Array2::zeros((nr_states, nr_joint_actions)))
        }
    }

    pub fn nr_states(&self) -> usize {
        match self {
            RewardModel::Dense(r) => r.nrows(),
            RewardModel::Sparse { nr_states, .. } => *nr_states,
        }
    }

    pub fn nr_joint_actions(&self) -> usize {
        match self {
            RewardModel::Dense(r) => r.ncols(),
            RewardModel::Sparse { nr_joint_actions, .. } => *nr_joint_actions,
        }
    }

    #[inline]
    pub fn get(&self, s: Index, ja: Index) -> f64 {
        match self {
            RewardModel::Dense(r) => r[[s, ja]],
            RewardModel::Sparse { entries, .. } => entries.get(&(s, ja)).copied().unwrap_or(0.0),
        }
    }

    /// Stores a reward; sparse storage drops magnitudes below `REWARD_PRECISION`.
    pub fn set(&mut self, s: Index, ja: Index, r: f64) -> Result<()> {
        check_index("state", s, self.nr_states())?;
        check_index("joint action", ja, self.nr_joint_actions())?;
        match self {
            RewardModel::Dense(table) => table[[s, ja]] = r,
            RewardModel::Sparse { entries, .. } => {
                if r.abs() < REWARD_PRECISION {
                    entries.remove(&(s, ja));
                } else {
                    entries.insert((s, ja), r);
                }
            }
        }
        Ok(())
    }

    /// `R(., ja)` over all states.
    pub fn reward_vector(&self, ja: Index) -> Array1<f64> {
        Array1::from_shape_fn(self.nr_states(), |s| self.get(s, ja))
    }

    pub fn min(&self) -> f64 {
        self.fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.fold(f64::NEG_INFINITY, f64::max)
    }

    fn fold(&self, init: f64, f: fn(f64, f64) -> f64) -> f64 {
        match self {
            RewardModel::Dense(r) => r.iter().copied().fold(init, f),
            RewardModel::Sparse {
                nr_states,
                nr_joint_actions,
                entries,
            } => {
                let acc = entries.values().copied().fold(init, f);
                // absent entries are zero rewards
                if entries.len() < nr_states * nr_joint_actions {
                    f(acc, 0.0)
                } else {
                    acc
                }
            }
        }
    }
}
