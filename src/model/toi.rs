//! Transition- and observation-independent models: each agent has its own
//! local state, transition and observation model, and the joint model is
//! their product.

use ndarray::Array1;
use rand::{Rng, RngCore};
use serde::{Serialize, Deserialize};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{check_index, MadpError, Result};
use crate::index_tools;
use crate::model::decision_process::{DecisionProcess, ProblemModel};
use crate::model::observation::OGet;
use crate::model::probability::sample_inverse_cdf;
use crate::model::problem::{check_discount, PlanningProblem};
use crate::model::reward::RewardModel;
use crate::model::transition::TGet;
use crate::types::{Horizon, Index};

/// Memoised decomposition of joint indices into per-agent indices.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct DecompositionCache {
    cardinalities: Vec<usize>,
    steps: Vec<usize>,
    nr_joint: usize,
    #[serde(skip)]
    individual: RefCell<HashMap<Index, Vec<Index>>>,
}

impl DecompositionCache {
    fn new(cardinalities: Vec<usize>) -> Result<Self> {
        let nr_joint = index_tools::joint_cardinality(&cardinalities)?;
        Ok(DecompositionCache {
            steps: index_tools::calculate_step_size(&cardinalities),
            cardinalities,
            nr_joint,
            individual: RefCell::new(HashMap::new()),
        })
    }

    fn ensure(&self, joint: Index) {
        let mut cache = self.individual.borrow_mut();
        if !cache.contains_key(&joint) {
            cache.insert(joint, index_tools::joint_to_individual_with_steps(joint, &self.steps));
        }
    }

    fn individual(&self, joint: Index) -> Vec<Index> {
        self.ensure(joint);
        self.individual.borrow()[&joint].clone()
    }

    fn compose(&self, individual: &[Index]) -> Index {
        index_tools::individual_to_joint_with_steps(individual, &self.steps)
    }

    fn len(&self) -> usize {
        self.individual.borrow().len()
    }

    fn clear(&self) {
        self.individual.borrow_mut().clear();
    }
}

/// Joint model whose probabilities are products of independent per-agent
/// models.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToiDecisionProcess {
    name: String,
    locals: Vec<DecisionProcess>,
    joint_state_limit: usize,
    states: DecompositionCache,
    actions: DecompositionCache,
    observations: DecompositionCache,
    isd: Option<Array1<f64>>,
    initialized: bool,
}

impl ToiDecisionProcess {
    /// `joint_state_limit` bounds the joint state count for which the joint
    /// initial state distribution is materialised.
    pub fn new<S: Into<String>>(name: S, joint_state_limit: usize) -> Self {
        ToiDecisionProcess {
            name: name.into(),
            locals: Vec::new(),
            joint_state_limit,
            states: DecompositionCache::default(),
            actions: DecompositionCache::default(),
            observations: DecompositionCache::default(),
            isd: None,
            initialized: false,
        }
    }

    /// Builds and finalizes a model from initialized single-agent processes.
    pub fn from_locals<S: Into<String>>(
        name: S,
        locals: Vec<DecisionProcess>,
        joint_state_limit: usize,
    ) -> Result<Self> {
        let mut toi = Self::new(name, joint_state_limit);
        for local in locals {
            toi.add_agent(local)?;
        }
        toi.set_initialized(true)?;
        Ok(toi)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends the local model of the next agent. Invalidates the joint model.
    pub fn add_agent(&mut self, local: DecisionProcess) -> Result<Index> {
        if local.nr_agents() != 1 {
            return Err(MadpError::invalid_parameter(
                "local model",
                format!("'{}' has {} agents, expected 1", local.name(), local.nr_agents()),
            ));
        }
        self.initialized = false;
        self.clear_caches();
        self.isd = None;
        self.locals.push(local);
        Ok(self.locals.len() - 1)
    }

    pub fn local(&self, agent: Index) -> Result<&DecisionProcess> {
        check_index("agent", agent, self.locals.len())?;
        Ok(&self.locals[agent])
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Finalizes the joint model. Every local model must be initialized and
    /// the joint sets must not overflow an index.
    pub fn set_initialized(&mut self, initialized: bool) -> Result<()> {
        if !initialized {
            self.initialized = false;
            return Ok(());
        }
        if self.locals.is_empty() {
            return Err(MadpError::Construction(format!("'{}' has no agents", self.name)));
        }
        if let Some(agent) = self.locals.iter().position(|l| !l.is_initialized()) {
            return Err(MadpError::not_initialized(format!("local model of agent {}", agent)));
        }
        self.states = DecompositionCache::new(self.locals.iter().map(|l| l.nr_states()).collect())?;
        self.actions = DecompositionCache::new(self.locals.iter().map(|l| l.nr_joint_actions()).collect())?;
        self.observations =
            DecompositionCache::new(self.locals.iter().map(|l| l.nr_joint_observations()).collect())?;

        self.isd = if self.states.nr_joint <= self.joint_state_limit {
            self.joint_isd()
        } else {
            log::info!(
                "'{}': {} joint states exceed {}; joint ISD not materialised",
                self.name,
                self.states.nr_joint,
                self.joint_state_limit
            );
            None
        };
        self.initialized = true;
        log::debug!(
            "ToI model '{}' initialized: {} joint states, {} joint actions, {} joint observations",
            self.name,
            self.states.nr_joint,
            self.actions.nr_joint,
            self.observations.nr_joint
        );
        Ok(())
    }

    /// Product of the local initial state distributions, if all exist.
    fn joint_isd(&self) -> Option<Array1<f64>> {
        let locals: Option<Vec<&Array1<f64>>> =
            self.locals.iter().map(|l| l.initial_state_distribution()).collect();
        let locals = locals?;
        let mut isd = Array1::zeros(self.states.nr_joint);
        let mut individual = vec![0; locals.len()];
        let mut s = 0;
        loop {
            isd[s] = individual
                .iter()
                .zip(&locals)
                .map(|(&si, local)| local[si])
                .product::<f64>();
            s += 1;
            if index_tools::increment(&mut individual, &self.states.cardinalities) {
                break;
            }
        }
        Some(isd)
    }

    pub fn joint_state_index(&self, individual: &[Index]) -> Result<Index> {
        index_tools::individual_to_joint(individual, &self.states.cardinalities)
    }

    pub fn individual_states(&self, s: Index) -> Result<Vec<Index>> {
        check_index("joint state", s, self.states.nr_joint)?;
        Ok(self.states.individual(s))
    }

    /// Number of memoised joint state decompositions.
    pub fn cached_state_decompositions(&self) -> usize {
        self.states.len()
    }

    pub fn clear_caches(&self) {
        self.states.clear();
        self.actions.clear();
        self.observations.clear();
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(MadpError::not_initialized(format!("ToI model '{}'", self.name)))
        }
    }
}

impl ProblemModel for ToiDecisionProcess {
    fn nr_agents(&self) -> usize {
        self.locals.len()
    }

    fn nr_states(&self) -> usize {
        self.states.nr_joint
    }

    fn nr_actions(&self, agent: Index) -> Result<usize> {
        self.local(agent)?.nr_actions(0)
    }

    fn nr_observations(&self, agent: Index) -> Result<usize> {
        self.local(agent)?.nr_observations(0)
    }

    fn nr_joint_actions(&self) -> usize {
        self.actions.nr_joint
    }

    fn nr_joint_observations(&self) -> usize {
        self.observations.nr_joint
    }

    fn joint_action_index(&self, individual: &[Index]) -> Result<Index> {
        self.ensure_initialized()?;
        index_tools::individual_to_joint(individual, &self.actions.cardinalities)
    }

    fn individual_actions(&self, ja: Index) -> Result<Vec<Index>> {
        self.ensure_initialized()?;
        check_index("joint action", ja, self.actions.nr_joint)?;
        Ok(self.actions.individual(ja))
    }

    fn joint_observation_index(&self, individual: &[Index]) -> Result<Index> {
        self.ensure_initialized()?;
        index_tools::individual_to_joint(individual, &self.observations.cardinalities)
    }

    fn individual_observations(&self, jo: Index) -> Result<Vec<Index>> {
        self.ensure_initialized()?;
        check_index("joint observation", jo, self.observations.nr_joint)?;
        Ok(self.observations.individual(jo))
    }

    fn get_transition_probability(&self, s: Index, ja: Index, s_next: Index) -> f64 {
        self.states.ensure(s);
        self.states.ensure(s_next);
        self.actions.ensure(ja);
        let states = self.states.individual.borrow();
        let actions = self.actions.individual.borrow();
        let (from, to, acts) = (&states[&s], &states[&s_next], &actions[&ja]);
        let mut p = 1.0;
        for (agent, local) in self.locals.iter().enumerate() {
            p *= local.get_transition_probability(from[agent], acts[agent], to[agent]);
            if p == 0.0 {
                return 0.0;
            }
        }
        p
    }

    fn get_observation_probability(&self, ja: Index, s_next: Index, jo: Index) -> f64 {
        self.actions.ensure(ja);
        self.states.ensure(s_next);
        self.observations.ensure(jo);
        let actions = self.actions.individual.borrow();
        let states = self.states.individual.borrow();
        let observations = self.observations.individual.borrow();
        let (acts, to, obs) = (&actions[&ja], &states[&s_next], &observations[&jo]);
        let mut p = 1.0;
        for (agent, local) in self.locals.iter().enumerate() {
            p *= local.get_observation_probability(acts[agent], to[agent], obs[agent]);
            if p == 0.0 {
                return 0.0;
            }
        }
        p
    }

    fn transition_handle(&self) -> Option<TGet<'_>> {
        None
    }

    fn observation_handle(&self) -> Option<OGet<'_>> {
        None
    }

    fn initial_state_distribution(&self) -> Option<&Array1<f64>> {
        self.isd.as_ref()
    }

    /// Samples from the joint ISD when materialised, otherwise samples every
    /// agent's local state and composes them.
    fn sample_initial_state(&self, rng: &mut dyn RngCore) -> Result<Index> {
        self.ensure_initialized()?;
        if let Some(isd) = &self.isd {
            return Ok(sample_inverse_cdf(isd.iter().copied().enumerate(), isd.len(), rng.gen::<f64>()));
        }
        let individual = self
            .locals
            .iter()
            .map(|l| l.sample_initial_state(rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.states.compose(&individual))
    }

    fn sample_successor_state(&self, s: Index, ja: Index, rng: &mut dyn RngCore) -> Result<Index> {
        let from = self.individual_states(s)?;
        let acts = self.individual_actions(ja)?;
        let mut to = Vec::with_capacity(self.locals.len());
        for (agent, local) in self.locals.iter().enumerate() {
            to.push(local.sample_successor_state(from[agent], acts[agent], rng)?);
        }
        Ok(self.states.compose(&to))
    }

    fn sample_joint_observation(&self, ja: Index, s_next: Index, rng: &mut dyn RngCore) -> Result<Index> {
        let acts = self.individual_actions(ja)?;
        let to = self.individual_states(s_next)?;
        let mut obs = Vec::with_capacity(self.locals.len());
        for (agent, local) in self.locals.iter().enumerate() {
            obs.push(local.sample_joint_observation(acts[agent], to[agent], rng)?);
        }
        Ok(self.observations.compose(&obs))
    }
}

/// A transition- and observation-independent Dec-POMDP with a joint reward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToiDecPomdp {
    process: ToiDecisionProcess,
    rewards: RewardModel,
    discount: f64,
    horizon: Horizon,
}

impl ToiDecPomdp {
    /// Joint rewards are stored sparsely when the joint state space is too
    /// large to materialise.
    pub fn new(process: ToiDecisionProcess) -> Result<Self> {
        process.ensure_initialized()?;
        let sparse = process.nr_states() > process.joint_state_limit;
        let rewards = RewardModel::new(process.nr_states(), process.nr_joint_actions(), sparse);
        Ok(ToiDecPomdp {
            process,
            rewards,
            discount: 1.0,
            horizon: Horizon::Infinite,
        })
    }

    pub fn process(&self) -> &ToiDecisionProcess {
        &self.process
    }

    pub fn set_reward(&mut self, s: Index, ja: Index, r: f64) -> Result<()> {
        self.rewards.set(s, ja, r)
    }

    /// Reward addressed by per-agent states and actions.
    pub fn set_reward_individual(&mut self, states: &[Index], actions: &[Index], r: f64) -> Result<()> {
        let s = self.process.joint_state_index(states)?;
        let ja = self.process.joint_action_index(actions)?;
        self.rewards.set(s, ja, r)
    }

    pub fn set_discount(&mut self, discount: f64) -> Result<()> {
        check_discount(discount)?;
        self.discount = discount;
        Ok(())
    }

    pub fn set_horizon(&mut self, horizon: Horizon) {
        self.horizon = horizon;
    }
}

impl PlanningProblem for ToiDecPomdp {
    fn model(&self) -> &dyn ProblemModel {
        &self.process
    }

    fn get_reward(&self, s: Index, ja: Index) -> f64 {
        self.rewards.get(s, ja)
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn horizon(&self) -> Horizon {
        self.horizon
    }
}
