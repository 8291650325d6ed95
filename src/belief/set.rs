use rand::{Rng, RngCore};
use rand_distr::{Dirichlet, Distribution};
use serde::{Serialize, Deserialize};

use crate::belief::{Belief, BeliefInterface, ModelAccess};
use crate::error::{MadpError, Result};
use crate::model::ProblemModel;
use crate::types::ValidationMode;

/// An ordered collection of dense beliefs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BeliefSet {
    beliefs: Vec<Belief>,
}

impl BeliefSet {
    pub fn new(beliefs: Vec<Belief>) -> Self {
        BeliefSet { beliefs }
    }

    /// Collects `n` beliefs reached by simulating uniformly random joint
    /// actions from the initial state distribution. A trajectory restarts
    /// after `depth` steps or when an update is degenerate.
    pub fn sample_by_simulation(
        model: &dyn ProblemModel,
        n: usize,
        depth: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        if depth == 0 {
            return Err(MadpError::invalid_parameter("depth", "must be at least 1"));
        }
        let initial = Belief::initial(model)?;
        let access = ModelAccess::for_model(model);
        let nr_ja = model.nr_joint_actions();
        let mut beliefs = Vec::with_capacity(n);

        'trajectories: while beliefs.len() < n {
            let mut belief = initial.clone();
            let mut s = model.sample_initial_state(rng)?;
            for _ in 0..depth {
                beliefs.push(belief.clone());
                if beliefs.len() == n {
                    break 'trajectories;
                }
                let ja = rng.gen_range(0..nr_ja);
                let s_next = model.sample_successor_state(s, ja, rng)?;
                let jo = model.sample_joint_observation(ja, s_next, rng)?;
                if belief.update(access, ja, jo) <= 0.0 {
                    continue 'trajectories;
                }
                s = s_next;
            }
        }
        log::debug!("sampled {} beliefs by simulation", beliefs.len());
        Ok(BeliefSet { beliefs })
    }

    /// `n` beliefs drawn uniformly from the simplex over `size` states.
    pub fn sample_uniform(size: usize, n: usize, rng: &mut dyn RngCore) -> Result<Self> {
        if size == 0 {
            return Err(MadpError::invalid_parameter("size", "must be at least 1"));
        }
        if size == 1 {
            return Ok(BeliefSet {
                beliefs: vec![Belief::uniform(1); n],
            });
        }
        let dirichlet = Dirichlet::new(&vec![1.0; size])
            .map_err(|e| MadpError::invalid_parameter("size", e.to_string()))?;
        let beliefs = (0..n)
            .map(|_| Belief::from_vec(dirichlet.sample(rng), ValidationMode::Skip))
            .collect::<Result<Vec<_>>>()?;
        Ok(BeliefSet { beliefs })
    }

    pub fn push(&mut self, belief: Belief) {
        self.beliefs.push(belief);
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Belief> {
        self.beliefs.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Belief> {
        self.beliefs.iter()
    }

    pub fn as_slice(&self) -> &[Belief] {
        &self.beliefs
    }
}

impl<'a> IntoIterator for &'a BeliefSet {
    type Item = &'a Belief;
    type IntoIter = std::slice::Iter<'a, Belief>;

    fn into_iter(self) -> Self::IntoIter {
        self.beliefs.iter()
    }
}
