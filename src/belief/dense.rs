use ndarray::Array1;
use rand::{Rng, RngCore};
use serde::{Serialize, Deserialize};

use crate::belief::{predict_and_correct, BeliefInterface, ModelAccess, StateDistribution};
use crate::error::{MadpError, Result};
use crate::model::components::check_distribution;
use crate::model::probability::sample_inverse_cdf;
use crate::model::ProblemModel;
use crate::types::{Index, ValidationMode, PROB_PRECISION};

/// Dense belief: one probability per state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Belief {
    values: Array1<f64>,
}

impl Belief {
    /// All-zero (not yet valid) belief over `size` states.
    pub fn zeros(size: usize) -> Self {
        Belief {
            values: Array1::zeros(size),
        }
    }

    /// Uniform belief over `size` states; empty when `size` is zero.
    pub fn uniform(size: usize) -> Self {
        if size == 0 {
            return Belief::zeros(0);
        }
        Belief {
            values: Array1::from_elem(size, 1.0 / size as f64),
        }
    }

    pub fn from_vec(values: Vec<f64>, validation: ValidationMode) -> Result<Self> {
        let belief = Belief {
            values: Array1::from_vec(values),
        };
        if validation.is_strict() {
            belief.sanity_check()?;
        }
        Ok(belief)
    }

    pub fn from_distribution(distribution: StateDistribution<'_>) -> Self {
        let values = match distribution {
            StateDistribution::Dense(values) => Array1::from_vec(values.to_vec()),
            other => Array1::from_shape_fn(other.size(), |s| other.probability(s)),
        };
        Belief { values }
    }

    /// The model's initial state distribution.
    pub fn initial(model: &dyn ProblemModel) -> Result<Self> {
        let isd = model
            .initial_state_distribution()
            .ok_or_else(|| MadpError::not_initialized("joint initial state distribution"))?;
        Ok(Belief { values: isd.clone() })
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Draws a state from the belief.
    pub fn sample_state(&self, rng: &mut dyn RngCore) -> Index {
        sample_inverse_cdf(self.iter(), self.values.len(), rng.gen::<f64>())
    }
}

impl BeliefInterface for Belief {
    fn size(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn get(&self, s: Index) -> f64 {
        self.values[s]
    }

    fn set(&mut self, s: Index, p: f64) {
        self.values[s] = p;
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (Index, f64)> + '_> {
        Box::new(self.values.iter().copied().enumerate().filter(|&(_, p)| p != 0.0))
    }

    fn to_vec(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    fn sanity_check(&self) -> Result<()> {
        check_distribution(&self.values, "belief")
    }

    fn update(&mut self, model: ModelAccess<'_>, ja: Index, jo: Index) -> f64 {
        let support: Vec<(Index, f64)> = self.iter().collect();
        let (mass, normalizer) = predict_and_correct(model, self.values.len(), &support, ja, jo);
        self.values = Array1::from_vec(mass);
        if normalizer <= PROB_PRECISION {
            log::trace!("impossible observation {} after joint action {}", jo, ja);
            return 0.0;
        }
        self.values /= normalizer;
        normalizer
    }

    fn inner_product(&self, v: &Array1<f64>) -> f64 {
        self.values.dot(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;

    #[test]
    fn test_toy_update() {
        let model = fixtures::toy_model(false);
        let mut b = Belief::uniform(2);
        let likelihood = b.update(ModelAccess::for_model(&model), 0, 0);
        assert!((likelihood - 0.565).abs() < 1e-12);
        assert!((b.get(0) - 0.385 / 0.565).abs() < 1e-9);
        assert!((b.get(1) - 0.18 / 0.565).abs() < 1e-9);
        assert!(b.sanity_check().is_ok());
    }

    #[test]
    fn test_handles_and_generic_agree() {
        let model = fixtures::toy_model(true);
        let mut fast = Belief::from_vec(vec![0.3, 0.7], ValidationMode::Strict).unwrap();
        let mut slow = fast.clone();
        let p_fast = fast.update(ModelAccess::for_model(&model), 1, 1);
        let p_slow = slow.update(ModelAccess::Generic(&model), 1, 1);
        assert_eq!(p_fast, p_slow);
        assert_eq!(fast, slow);
    }

    #[test]
    fn test_impossible_observation_returns_zero() {
        let model = fixtures::deterministic_model();
        let mut b = Belief::from_vec(vec![1.0, 0.0], ValidationMode::Strict).unwrap();
        // state 0 always emits observation 0
        let likelihood = b.update(ModelAccess::for_model(&model), 0, 1);
        assert_eq!(likelihood, 0.0);
        assert_eq!(b.to_vec(), vec![0.0, 0.0]);
        assert!(b.sanity_check().is_err());
    }

    #[test]
    fn test_validation_mode() {
        assert!(Belief::from_vec(vec![0.6, 0.6], ValidationMode::Strict).is_err());
        assert!(Belief::from_vec(vec![0.6, 0.6], ValidationMode::Skip).is_ok());
        assert!(Belief::from_vec(vec![-0.1, 1.1], ValidationMode::Strict).is_err());
    }

    #[test]
    fn test_entropy_and_inner_product() {
        let b = Belief::uniform(4);
        assert!((b.entropy() - 4f64.ln()).abs() < 1e-12);
        let v = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        assert!((b.inner_product(&v) - 2.5).abs() < 1e-12);
        let point = Belief::from_vec(vec![0.0, 1.0, 0.0, 0.0], ValidationMode::Strict).unwrap();
        assert_eq!(point.entropy(), 0.0);
    }

    #[test]
    fn test_uniform_over_no_states_is_empty() {
        let b = Belief::uniform(0);
        assert_eq!(b.size(), 0);
        assert!(b.values().iter().all(|p| !p.is_nan()));
    }
}
