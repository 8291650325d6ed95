//! # Beliefs Module
//!
//! Probability distributions over the (joint) state space and their Bayes
//! update after a joint action and joint observation.
//!
//! ## Core Concepts
//!
//! - **Belief**: a distribution `b(s)` over states
//! - **Belief update**: `b'(s') ∝ O(a, s', o) · Σ_s T(s, a, s') · b(s)`
//! - **Likelihood**: the normaliser `P(o | b, a)`; a value `<= 0` signals an
//!   observation that is impossible under the belief and action
//!
//! ## Available Components
//!
//! - `BeliefInterface` trait: shared interface of both representations
//! - `Belief`: dense vector, one entry per state
//! - `BeliefSparse`: ordered map over the support only
//! - `BeliefSet`: belief collections for point-based planning
//! - `ModelAccess`: fast table handles or the generic query interface

use ndarray::Array1;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::Result;
use crate::model::{OGet, ProblemModel, TGet};
use crate::types::Index;

pub mod dense;
pub mod set;
pub mod sparse;

pub use dense::Belief;
pub use set::BeliefSet;
pub use sparse::BeliefSparse;

/// Core trait of belief representations
pub trait BeliefInterface: Debug {
    /// Number of states the belief ranges over
    fn size(&self) -> usize;

    fn get(&self, s: Index) -> f64;

    fn set(&mut self, s: Index, p: f64);

    /// Entries with non-zero probability in increasing state order
    fn iter(&self) -> Box<dyn Iterator<Item = (Index, f64)> + '_>;

    fn to_vec(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.size()];
        for (s, p) in self.iter() {
            values[s] = p;
        }
        values
    }

    /// Validates entries and total mass
    fn sanity_check(&self) -> Result<()>;

    /// Replaces the belief by its Bayes update and returns `P(jo | b, ja)`.
    ///
    /// When that likelihood is at most `PROB_PRECISION` the belief is left
    /// un-normalised and 0 is returned.
    fn update(&mut self, model: ModelAccess<'_>, ja: Index, jo: Index) -> f64;

    /// `Σ_s b(s) · v(s)` over the support
    fn inner_product(&self, v: &Array1<f64>) -> f64 {
        self.iter().map(|(s, p)| p * v[s]).sum()
    }

    /// Shannon entropy in nats
    fn entropy(&self) -> f64 {
        self.iter().filter(|&(_, p)| p > 0.0).map(|(_, p)| -p * p.ln()).sum()
    }
}

/// Source distribution for building a belief, dispatched by variant.
#[derive(Clone, Copy)]
pub enum StateDistribution<'a> {
    Dense(&'a [f64]),
    Sparse {
        size: usize,
        entries: &'a BTreeMap<Index, f64>,
    },
    Generic {
        size: usize,
        probability: &'a dyn Fn(Index) -> f64,
    },
}

impl<'a> StateDistribution<'a> {
    pub fn size(&self) -> usize {
        match self {
            StateDistribution::Dense(values) => values.len(),
            StateDistribution::Sparse { size, .. } | StateDistribution::Generic { size, .. } => *size,
        }
    }

    pub fn probability(&self, s: Index) -> f64 {
        match self {
            StateDistribution::Dense(values) => values[s],
            StateDistribution::Sparse { entries, .. } => entries.get(&s).copied().unwrap_or(0.0),
            StateDistribution::Generic { probability, .. } => probability(s),
        }
    }
}

/// How a belief update reads the model: borrowed table handles when the
/// model has materialised joint tables, the generic queries otherwise. Both
/// give identical results.
#[derive(Clone, Copy)]
pub enum ModelAccess<'a> {
    Handles {
        transition: TGet<'a>,
        observation: OGet<'a>,
    },
    Generic(&'a dyn ProblemModel),
}

impl<'a> ModelAccess<'a> {
    /// Prefers the fast handles when both exist.
    pub fn for_model(model: &'a dyn ProblemModel) -> Self {
        match (model.transition_handle(), model.observation_handle()) {
            (Some(transition), Some(observation)) => ModelAccess::Handles { transition, observation },
            _ => ModelAccess::Generic(model),
        }
    }

    #[inline]
    pub fn transition(&self, s: Index, ja: Index, s_next: Index) -> f64 {
        match self {
            ModelAccess::Handles { transition, .. } => transition.get(s, ja, s_next),
            ModelAccess::Generic(model) => model.get_transition_probability(s, ja, s_next),
        }
    }

    #[inline]
    pub fn observation(&self, ja: Index, s_next: Index, jo: Index) -> f64 {
        match self {
            ModelAccess::Handles { observation, .. } => observation.get(ja, s_next, jo),
            ModelAccess::Generic(model) => model.get_observation_probability(ja, s_next, jo),
        }
    }

    pub fn is_handles(&self) -> bool {
        matches!(self, ModelAccess::Handles { .. })
    }
}

/// Unnormalised successor mass `O(ja, s', jo) · Σ_s T(s, ja, s') b(s)` for
/// every `s'`, and the normaliser. Both belief types share this pass.
pub(crate) fn predict_and_correct(
    model: ModelAccess<'_>,
    nr_states: usize,
    support: &[(Index, f64)],
    ja: Index,
    jo: Index,
) -> (Vec<f64>, f64) {
    let mut mass = vec![0.0; nr_states];
    let mut normalizer = 0.0;
    for (s_next, slot) in mass.iter_mut().enumerate() {
        let p_obs = model.observation(ja, s_next, jo);
        if p_obs == 0.0 {
            continue;
        }
        let mut p_next = 0.0;
        for &(s, b) in support {
            p_next += model.transition(s, ja, s_next) * b;
        }
        *slot = p_obs * p_next;
        normalizer += *slot;
    }
    (mass, normalizer)
}
