use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

use crate::belief::{predict_and_correct, BeliefInterface, ModelAccess, StateDistribution};
use crate::error::{MadpError, Result};
use crate::types::{Index, ValidationMode, NORMALIZATION_TOLERANCE, PROB_PRECISION};

/// Sparse belief storing only states with probability above
/// `PROB_PRECISION`. Updates iterate the support only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BeliefSparse {
    size: usize,
    entries: BTreeMap<Index, f64>,
}

impl BeliefSparse {
    pub fn zeros(size: usize) -> Self {
        BeliefSparse {
            size,
            entries: BTreeMap::new(),
        }
    }

    /// Uniform belief over `size` states; empty when `size` is zero.
    pub fn uniform(size: usize) -> Self {
        if size == 0 {
            return BeliefSparse::zeros(0);
        }
        let p = 1.0 / size as f64;
        BeliefSparse {
            size,
            entries: (0..size).map(|s| (s, p)).collect(),
        }
    }

    pub fn from_vec(values: Vec<f64>, validation: ValidationMode) -> Result<Self> {
        let mut belief = Self::zeros(values.len());
        for (s, p) in values.into_iter().enumerate() {
            if validation.is_strict() && (p.is_nan() || p < 0.0) {
                return Err(MadpError::InvalidProbability {
                    location: format!("belief entry {}", s),
                    value: p,
                });
            }
            belief.set(s, p);
        }
        if validation.is_strict() {
            belief.sanity_check()?;
        }
        Ok(belief)
    }

    pub fn from_distribution(distribution: StateDistribution<'_>) -> Self {
        let entries = match distribution {
            StateDistribution::Sparse { entries, .. } => entries
                .iter()
                .filter(|&(_, &p)| p > PROB_PRECISION)
                .map(|(&s, &p)| (s, p))
                .collect(),
            other => (0..other.size())
                .map(|s| (s, other.probability(s)))
                .filter(|&(_, p)| p > PROB_PRECISION)
                .collect(),
        };
        BeliefSparse {
            size: distribution.size(),
            entries,
        }
    }

    pub fn as_distribution(&self) -> StateDistribution<'_> {
        StateDistribution::Sparse {
            size: self.size,
            entries: &self.entries,
        }
    }

    /// Number of stored states.
    pub fn support_size(&self) -> usize {
        self.entries.len()
    }
}

impl BeliefInterface for BeliefSparse {
    fn size(&self) -> usize {
        self.size
    }

    fn get(&self, s: Index) -> f64 {
        self.entries.get(&s).copied().unwrap_or(0.0)
    }

    /// Values at or below `PROB_PRECISION` remove the entry.
    fn set(&mut self, s: Index, p: f64) {
        if p <= PROB_PRECISION {
            self.entries.remove(&s);
        } else {
            self.entries.insert(s, p);
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (Index, f64)> + '_> {
        Box::new(self.entries.iter().map(|(&s, &p)| (s, p)))
    }

    fn sanity_check(&self) -> Result<()> {
        for (&s, &p) in &self.entries {
            if s >= self.size {
                return Err(MadpError::index_out_of_bounds("belief state", s, self.size));
            }
            if p.is_nan() || p < 0.0 || p > 1.0 + NORMALIZATION_TOLERANCE {
                return Err(MadpError::InvalidProbability {
                    location: format!("belief entry {}", s),
                    value: p,
                });
            }
        }
        let sum: f64 = self.entries.values().sum();
        if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
            return Err(MadpError::InvalidDistribution {
                row: "belief".to_string(),
                sum,
            });
        }
        Ok(())
    }

    fn update(&mut self, model: ModelAccess<'_>, ja: Index, jo: Index) -> f64 {
        let support: Vec<(Index, f64)> = self.iter().collect();
        let (mass, normalizer) = predict_and_correct(model, self.size, &support, ja, jo);
        let degenerate = normalizer <= PROB_PRECISION;
        let scale = if degenerate { 1.0 } else { normalizer };
        self.entries = mass
            .into_iter()
            .enumerate()
            .map(|(s, m)| (s, m / scale))
            .filter(|&(_, p)| p > PROB_PRECISION)
            .collect();
        if degenerate {
            log::trace!("impossible observation {} after joint action {}", jo, ja);
            return 0.0;
        }
        normalizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::Belief;
    use crate::tests::fixtures;

    #[test]
    fn test_toy_update_matches_dense() {
        for sparse_model in [false, true] {
            let model = fixtures::toy_model(sparse_model);
            let mut sparse = BeliefSparse::uniform(2);
            let mut dense = Belief::uniform(2);
            let p_sparse = sparse.update(ModelAccess::for_model(&model), 0, 0);
            let p_dense = dense.update(ModelAccess::for_model(&model), 0, 0);
            assert_eq!(p_sparse, p_dense);
            for s in 0..2 {
                assert!((sparse.get(s) - dense.get(s)).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_update_drops_vanishing_mass() {
        let model = fixtures::deterministic_model();
        let mut b = BeliefSparse::from_vec(vec![0.5, 0.5], ValidationMode::Strict).unwrap();
        let likelihood = b.update(ModelAccess::for_model(&model), 0, 1);
        assert!((likelihood - 0.5).abs() < 1e-12);
        assert_eq!(b.support_size(), 1);
        assert_eq!(b.get(1), 1.0);
        assert_eq!(b.get(0), 0.0);
    }

    #[test]
    fn test_set_never_stores_near_zero() {
        let mut b = BeliefSparse::zeros(3);
        b.set(2, 1e-13);
        b.set(1, 1.0);
        assert_eq!(b.support_size(), 1);
        b.set(1, 0.0);
        assert_eq!(b.iter().count(), 0);
    }

    #[test]
    fn test_uniform_over_no_states_is_empty() {
        let b = BeliefSparse::uniform(0);
        assert_eq!(b.size(), 0);
        assert_eq!(b.support_size(), 0);
    }

    #[test]
    fn test_conversions() {
        let dense = Belief::from_vec(vec![0.0, 0.4, 0.6], ValidationMode::Strict).unwrap();
        let values = dense.to_vec();
        let sparse = BeliefSparse::from_distribution(StateDistribution::Dense(&values));
        assert_eq!(sparse.support_size(), 2);
        let back = Belief::from_distribution(sparse.as_distribution());
        assert_eq!(back, dense);
        assert!(BeliefSparse::from_vec(vec![0.5, -0.5, 1.0], ValidationMode::Strict).is_err());
    }
}
