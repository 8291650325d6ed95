use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::belief::{Belief, BeliefSet};
use crate::error::{MadpError, Result};
use crate::metrics::Timing;
use crate::model::PlanningProblem;
use crate::planning::alpha_vector::{self, AlphaVector, ValueFunction};
use crate::planning::alpha_vector_planning::AlphaVectorPlanning;
use crate::planning::config::PlannerConfig;
use crate::planning::prune;
use crate::planning::q_function::Qav;
use crate::planning::vector_set::VectorSet;
use crate::types::{Horizon, REWARD_PRECISION};

/// Randomized point-based value iteration over a sampled belief set.
///
/// Infinite horizons start from the lower bound `R_min / (1 - γ)` and run
/// improvement stages until the value on the belief set stops changing.
/// Finite horizons run exactly `h` stages of backups at every belief,
/// starting from zero.
pub struct Perseus<'a, P: PlanningProblem + ?Sized> {
    planning: AlphaVectorPlanning<'a, P>,
    config: PlannerConfig,
    rng: StdRng,
    beliefs: BeliefSet,
    vf: ValueFunction,
    stage_values: Vec<f64>,
    timing: Timing,
    initialized: bool,
}

impl<'a, P: PlanningProblem + ?Sized> Perseus<'a, P> {
    pub fn new(problem: &'a P, config: PlannerConfig) -> Self {
        Perseus {
            planning: AlphaVectorPlanning::new(problem, config.clone()),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            beliefs: BeliefSet::default(),
            vf: ValueFunction::new(),
            stage_values: Vec::new(),
            timing: Timing::new(),
            initialized: false,
        }
    }

    /// Samples the belief set and sets up the initial value function.
    pub fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        let problem = self.planning.problem();
        if problem.horizon().is_infinite() && problem.discount() >= 1.0 {
            return Err(MadpError::invalid_parameter(
                "discount",
                "an infinite horizon needs a discount below 1",
            ));
        }
        self.timing.start("Initialize");
        let result = self.sample_initial();
        let elapsed = self.timing.stop("Initialize")?;
        let initial = result?;
        log::info!(
            "perseus initialized: {} beliefs, initial value {:.4} ({:.3}s)",
            self.beliefs.len(),
            initial,
            elapsed
        );
        Ok(())
    }

    fn sample_initial(&mut self) -> Result<f64> {
        self.planning.initialize()?;
        let problem = self.planning.problem();
        let model = problem.model();
        self.beliefs = BeliefSet::sample_by_simulation(
            model,
            self.config.nr_beliefs,
            self.config.belief_depth,
            &mut self.rng,
        )?;
        self.planning.set_beliefs(self.beliefs.clone());

        let initial = match problem.horizon() {
            Horizon::Infinite => problem.reward_bounds().0 / (1.0 - problem.discount()),
            Horizon::Finite(_) => 0.0,
        };
        self.vf = vec![AlphaVector::new(Array1::from_elem(model.nr_states(), initial), 0)];
        self.stage_values = vec![self.mean_value()];
        self.initialized = true;
        Ok(initial)
    }

    /// Runs backup stages and returns how many were run.
    pub fn plan(&mut self) -> Result<usize> {
        if !self.initialized {
            self.initialize()?;
        }
        self.timing.start("Plan");
        let result = match self.planning.problem().horizon() {
            Horizon::Finite(h) => self.plan_finite(h),
            Horizon::Infinite => self.plan_infinite(),
        };
        self.timing.stop("Plan")?;
        let stages = result?;
        log::info!(
            "perseus finished after {} stages with {} vectors",
            stages,
            self.vf.len()
        );
        Ok(stages)
    }

    fn plan_finite(&mut self, horizon: usize) -> Result<usize> {
        for stage in 0..horizon {
            self.timing.start("BackupStage");
            let backed_up = self.full_backup_stage();
            self.timing.stop("BackupStage")?;
            self.vf = backed_up?;
            self.stage_values.push(self.mean_value());
            log::debug!("perseus stage {}: {} vectors", stage, self.vf.len());
        }
        Ok(horizon)
    }

    fn plan_infinite(&mut self) -> Result<usize> {
        for stage in 1..=self.config.max_iterations {
            let before: Vec<f64> = self.belief_values();
            self.timing.start("BackupStage");
            let backed_up = self.randomized_backup_stage();
            self.timing.stop("BackupStage")?;
            self.vf = backed_up?;
            let after = self.belief_values();
            let change = before
                .iter()
                .zip(&after)
                .fold(0.0f64, |m, (b, a)| m.max((a - b).abs()));
            self.stage_values.push(self.mean_value());
            log::debug!(
                "perseus stage {}: {} vectors, max change {:.3e}",
                stage,
                self.vf.len(),
                change
            );
            if change < self.config.tolerance {
                return Ok(stage);
            }
        }
        log::warn!(
            "perseus stopped at the stage limit of {} before converging",
            self.config.max_iterations
        );
        Ok(self.config.max_iterations)
    }

    fn belief_values(&self) -> Vec<f64> {
        self.beliefs
            .iter()
            .map(|b| alpha_vector::value_at(&self.vf, b))
            .collect()
    }

    fn mean_value(&self) -> f64 {
        let values = self.belief_values();
        values.iter().sum::<f64>() / values.len().max(1) as f64
    }

    /// Backs up randomly chosen beliefs until every belief's value has at
    /// least kept its previous level.
    fn randomized_backup_stage(&mut self) -> Result<ValueFunction> {
        let gao = self.planning.back_project(&self.vf)?;
        let beliefs = self.beliefs.as_slice();
        let old: Vec<f64> = beliefs.iter().map(|b| alpha_vector::value_at(&self.vf, b)).collect();
        let mut next = ValueFunction::new();
        let mut pending: Vec<usize> = (0..beliefs.len()).collect();
        while !pending.is_empty() {
            let i = pending[self.rng.gen_range(0..pending.len())];
            let candidate = self.planning.backup_at_belief(&beliefs[i], &gao)?;
            let chosen = if candidate.value_at(&beliefs[i]) >= old[i] - REWARD_PRECISION {
                candidate
            } else {
                let k = alpha_vector::best_vector(&self.vf, &beliefs[i])
                    .ok_or_else(|| MadpError::not_initialized("perseus value function"))?;
                self.vf[k].clone()
            };
            pending.retain(|&j| chosen.value_at(&beliefs[j]) < old[j] - REWARD_PRECISION);
            next.push(chosen);
        }
        Ok(next)
    }

    fn full_backup_stage(&self) -> Result<ValueFunction> {
        let gao = self.planning.back_project(&self.vf)?;
        let backed_up = self
            .beliefs
            .iter()
            .map(|b| self.planning.backup_at_belief(b, &gao))
            .collect::<Result<ValueFunction>>()?;
        let nr_states = self.planning.problem().model().nr_states();
        let set = VectorSet::from_value_function(&backed_up, nr_states)?;
        let unique = prune::prune_duplicates(&set);
        Ok(unique.into_iter().map(|i| backed_up[i].clone()).collect())
    }

    pub fn value_function(&self) -> &ValueFunction {
        &self.vf
    }

    /// Mean value over the belief set after initialization and after every
    /// stage.
    pub fn stage_values(&self) -> &[f64] {
        &self.stage_values
    }

    pub fn beliefs(&self) -> &BeliefSet {
        &self.beliefs
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn value_at(&self, belief: &Belief) -> f64 {
        alpha_vector::value_at(&self.vf, belief)
    }

    pub fn qav(&self) -> Qav {
        Qav::new(self.vf.clone(), self.planning.problem().model().nr_joint_actions())
    }
}
