use ndarray::Array1;
use rand::{Rng, RngCore};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::error::{check_index, MadpError, Result};
use crate::model::components::{AgentComponent, DiscreteActions, DiscreteObservations, DiscreteStates};
use crate::model::observation::{OGet, ObservationModel};
use crate::model::probability::sample_inverse_cdf;
use crate::model::transition::{TGet, TransitionModel};
use crate::types::{DiscreteEntity, Index, ValidationMode};

/// Query interface of a finalized discrete multi-agent model.
///
/// The probability accessors are unchecked: they assume the model was
/// initialized and the indices are in range, and panic otherwise.
pub trait ProblemModel {
    fn nr_agents(&self) -> usize;
    fn nr_states(&self) -> usize;
    fn nr_actions(&self, agent: Index) -> Result<usize>;
    fn nr_observations(&self, agent: Index) -> Result<usize>;
    fn nr_joint_actions(&self) -> usize;
    fn nr_joint_observations(&self) -> usize;

    fn joint_action_index(&self, individual: &[Index]) -> Result<Index>;
    fn individual_actions(&self, ja: Index) -> Result<Vec<Index>>;
    fn joint_observation_index(&self, individual: &[Index]) -> Result<Index>;
    fn individual_observations(&self, jo: Index) -> Result<Vec<Index>>;

    fn get_transition_probability(&self, s: Index, ja: Index, s_next: Index) -> f64;
    fn get_observation_probability(&self, ja: Index, s_next: Index, jo: Index) -> f64;

    /// Fast table access, `None` when no joint table is materialised.
    fn transition_handle(&self) -> Option<TGet<'_>>;
    fn observation_handle(&self) -> Option<OGet<'_>>;

    /// Joint initial state distribution, `None` when not materialised.
    fn initial_state_distribution(&self) -> Option<&Array1<f64>>;

    fn sample_initial_state(&self, rng: &mut dyn RngCore) -> Result<Index>;

    fn sample_successor_state(&self, s: Index, ja: Index, rng: &mut dyn RngCore) -> Result<Index> {
        let n = self.nr_states();
        let entries = (0..n).map(|s_next| (s_next, self.get_transition_probability(s, ja, s_next)));
        Ok(sample_inverse_cdf(entries, n, rng.gen::<f64>()))
    }

    fn sample_joint_observation(&self, ja: Index, s_next: Index, rng: &mut dyn RngCore) -> Result<Index> {
        let n = self.nr_joint_observations();
        let entries = (0..n).map(|jo| (jo, self.get_observation_probability(ja, s_next, jo)));
        Ok(sample_inverse_cdf(entries, n, rng.gen::<f64>()))
    }
}

/// Storage and validation options of a model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Store transition and observation tables sparsely
    pub sparse: bool,
    /// Run sanity checks when finalizing
    pub validation: ValidationMode,
    /// Largest joint set enumerated eagerly
    pub eager_joint_limit: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            sparse: false,
            validation: ValidationMode::Strict,
            eager_joint_limit: 1 << 16,
        }
    }
}

impl ModelConfig {
    pub fn sparse() -> Self {
        ModelConfig {
            sparse: true,
            ..Self::default()
        }
    }

    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_eager_joint_limit(mut self, limit: usize) -> Self {
        self.eager_joint_limit = limit;
        self
    }
}

/// A complete discrete multi-agent model: states, per-agent actions and
/// observations, and the transition and observation tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionProcess {
    name: String,
    description: String,
    config: ModelConfig,
    states: DiscreteStates,
    actions: DiscreteActions,
    observations: DiscreteObservations,
    transition: Option<TransitionModel>,
    observation: Option<ObservationModel>,
    nr_joint_actions: usize,
    nr_joint_observations: usize,
    initialized: bool,
}

/// Historical name of [`DecisionProcess`].
pub type MultiAgentDecisionProcessDiscrete = DecisionProcess;

impl DecisionProcess {
    pub fn new<S: Into<String>>(name: S, nr_agents: usize, config: ModelConfig) -> Result<Self> {
        if nr_agents == 0 {
            return Err(MadpError::invalid_parameter("nr_agents", "must be at least 1"));
        }
        let limit = config.eager_joint_limit;
        Ok(DecisionProcess {
            name: name.into(),
            description: String::new(),
            config,
            states: DiscreteStates::new(),
            actions: AgentComponent::actions(nr_agents, limit),
            observations: AgentComponent::observations(nr_agents, limit),
            transition: None,
            observation: None,
            nr_joint_actions: 0,
            nr_joint_observations: 0,
            initialized: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description<S: Into<String>>(&mut self, description: S) {
        self.description = description.into();
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_sparse(&self) -> bool {
        self.config.sparse
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(MadpError::not_initialized(format!("model '{}'", self.name)))
        }
    }

    // --- construction -----------------------------------------------------

    pub fn set_nr_states(&mut self, n: usize) -> Result<()> {
        self.invalidate();
        self.transition = None;
        self.observation = None;
        self.states.set_nr(n)
    }

    pub fn add_state<S: AsRef<str>>(&mut self, name: S, description: S) -> Result<Index> {
        self.invalidate();
        self.transition = None;
        self.observation = None;
        self.states.add(name, description)
    }

    pub fn set_isd(&mut self, isd: Vec<f64>) -> Result<()> {
        self.invalidate();
        self.states.set_isd(isd)
    }

    pub fn set_uniform_isd(&mut self) -> Result<()> {
        self.invalidate();
        self.states.set_uniform_isd()
    }

    pub fn set_nr_actions(&mut self, agent: Index, n: usize) -> Result<()> {
        self.invalidate();
        self.transition = None;
        self.observation = None;
        self.actions.set_nr(agent, n)
    }

    pub fn add_action<S: AsRef<str>>(&mut self, agent: Index, name: S, description: S) -> Result<Index> {
        self.invalidate();
        self.transition = None;
        self.observation = None;
        self.actions.add(agent, name, description)
    }

    pub fn set_nr_observations(&mut self, agent: Index, n: usize) -> Result<()> {
        self.invalidate();
        self.observation = None;
        self.observations.set_nr(agent, n)
    }

    pub fn add_observation<S: AsRef<str>>(&mut self, agent: Index, name: S, description: S) -> Result<Index> {
        self.invalidate();
        self.observation = None;
        self.observations.add(agent, name, description)
    }

    pub fn construct_joint_actions(&mut self) -> Result<usize> {
        self.actions.set_initialized(true)?;
        self.actions.nr_joint()
    }

    pub fn construct_joint_observations(&mut self) -> Result<usize> {
        self.observations.set_initialized(true)?;
        self.observations.nr_joint()
    }

    /// Allocates an all-zero transition table in the configured storage.
    pub fn create_new_transition_model(&mut self) -> Result<()> {
        self.states.set_initialized(true)?;
        let nr_ja = self.construct_joint_actions()?;
        self.invalidate();
        self.transition = Some(TransitionModel::new(self.states.nr(), nr_ja, self.config.sparse));
        Ok(())
    }

    /// Allocates an all-zero observation table in the configured storage.
    pub fn create_new_observation_model(&mut self) -> Result<()> {
        self.states.set_initialized(true)?;
        let nr_ja = self.construct_joint_actions()?;
        let nr_jo = self.construct_joint_observations()?;
        self.invalidate();
        self.observation = Some(ObservationModel::new(self.states.nr(), nr_ja, nr_jo, self.config.sparse));
        Ok(())
    }

    pub fn set_transition_probability(&mut self, s: Index, ja: Index, s_next: Index, p: f64) -> Result<()> {
        let nr_states = self.states.nr();
        let transition = self
            .transition
            .as_mut()
            .ok_or_else(|| MadpError::not_initialized("transition model"))?;
        check_index("state", s, nr_states)?;
        check_index("joint action", ja, transition.nr_joint_actions())?;
        check_index("successor state", s_next, nr_states)?;
        transition.set(s, ja, s_next, p);
        self.initialized = false;
        Ok(())
    }

    pub fn set_observation_probability(&mut self, ja: Index, s_next: Index, jo: Index, p: f64) -> Result<()> {
        let observation = self
            .observation
            .as_mut()
            .ok_or_else(|| MadpError::not_initialized("observation model"))?;
        check_index("joint action", ja, observation.nr_joint_actions())?;
        check_index("successor state", s_next, observation.nr_states())?;
        check_index("joint observation", jo, observation.nr_joint_observations())?;
        observation.set(ja, s_next, jo, p);
        self.initialized = false;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.initialized = false;
    }

    /// Finalizes the model: initializes all components, checks that the
    /// tables match them and, in strict validation mode, that every row is a
    /// distribution. Any later mutation requires finalizing again.
    pub fn set_initialized(&mut self, initialized: bool) -> Result<()> {
        if !initialized {
            self.initialized = false;
            return Ok(());
        }
        self.states.set_initialized(true)?;
        let nr_ja = self.construct_joint_actions()?;
        let nr_jo = self.construct_joint_observations()?;
        let nr_states = self.states.nr();

        let transition = self
            .transition
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized("transition model"))?;
        let observation = self
            .observation
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized("observation model"))?;
        if transition.nr_states() != nr_states || transition.nr_joint_actions() != nr_ja {
            return Err(MadpError::dimension_mismatch(
                format!("transition table {}x{}", nr_states, nr_ja),
                format!("{}x{}", transition.nr_states(), transition.nr_joint_actions()),
            ));
        }
        if observation.nr_states() != nr_states
            || observation.nr_joint_actions() != nr_ja
            || observation.nr_joint_observations() != nr_jo
        {
            return Err(MadpError::dimension_mismatch(
                format!("observation table {}x{}x{}", nr_ja, nr_states, nr_jo),
                format!(
                    "{}x{}x{}",
                    observation.nr_joint_actions(),
                    observation.nr_states(),
                    observation.nr_joint_observations()
                ),
            ));
        }
        if self.config.validation.is_strict() {
            if self.states.isd().is_none() {
                return Err(MadpError::not_initialized("initial state distribution"));
            }
            transition.sanity_check()?;
            observation.sanity_check()?;
        }
        self.nr_joint_actions = nr_ja;
        self.nr_joint_observations = nr_jo;
        self.initialized = true;
        log::debug!(
            "model '{}' initialized: {} states, {} joint actions, {} joint observations",
            self.name,
            nr_states,
            nr_ja,
            nr_jo
        );
        Ok(())
    }

    // --- queries ----------------------------------------------------------

    pub fn states(&self) -> &DiscreteStates {
        &self.states
    }

    pub fn actions(&self) -> &DiscreteActions {
        &self.actions
    }

    pub fn observations(&self) -> &DiscreteObservations {
        &self.observations
    }

    pub fn state(&self, s: Index) -> Result<&DiscreteEntity> {
        self.states.get(s)
    }

    pub fn action(&self, agent: Index, a: Index) -> Result<&DiscreteEntity> {
        self.actions.get(agent, a)
    }

    pub fn observation(&self, agent: Index, o: Index) -> Result<&DiscreteEntity> {
        self.observations.get(agent, o)
    }

    pub fn state_index_by_name(&self, name: &str) -> Result<Index> {
        self.states.index_by_name(name)
    }

    pub fn action_index_by_name(&self, name: &str, agent: Index) -> Result<Index> {
        self.actions.index_by_name(name, agent)
    }

    pub fn observation_index_by_name(&self, name: &str, agent: Index) -> Result<Index> {
        self.observations.index_by_name(name, agent)
    }

    pub fn transition_model(&self) -> Option<&TransitionModel> {
        self.transition.as_ref()
    }

    pub fn observation_model(&self) -> Option<&ObservationModel> {
        self.observation.as_ref()
    }

    /// Checked transition probability lookup.
    pub fn transition_probability(&self, s: Index, ja: Index, s_next: Index) -> Result<f64> {
        self.ensure_initialized()?;
        check_index("state", s, self.nr_states())?;
        check_index("joint action", ja, self.nr_joint_actions)?;
        check_index("successor state", s_next, self.nr_states())?;
        Ok(self.get_transition_probability(s, ja, s_next))
    }

    /// Checked observation probability lookup.
    pub fn observation_probability(&self, ja: Index, s_next: Index, jo: Index) -> Result<f64> {
        self.ensure_initialized()?;
        check_index("joint action", ja, self.nr_joint_actions)?;
        check_index("successor state", s_next, self.nr_states())?;
        check_index("joint observation", jo, self.nr_joint_observations)?;
        Ok(self.get_observation_probability(ja, s_next, jo))
    }

    pub fn tget(&self) -> Result<TGet<'_>> {
        self.ensure_initialized()?;
        self.transition_handle()
            .ok_or_else(|| MadpError::not_initialized("transition model"))
    }

    pub fn oget(&self) -> Result<OGet<'_>> {
        self.ensure_initialized()?;
        self.observation_handle()
            .ok_or_else(|| MadpError::not_initialized("observation model"))
    }
}

impl ProblemModel for DecisionProcess {
    fn nr_agents(&self) -> usize {
        self.actions.nr_agents()
    }

    fn nr_states(&self) -> usize {
        self.states.nr()
    }

    fn nr_actions(&self, agent: Index) -> Result<usize> {
        self.actions.nr(agent)
    }

    fn nr_observations(&self, agent: Index) -> Result<usize> {
        self.observations.nr(agent)
    }

    fn nr_joint_actions(&self) -> usize {
        self.nr_joint_actions
    }

    fn nr_joint_observations(&self) -> usize {
        self.nr_joint_observations
    }

    fn joint_action_index(&self, individual: &[Index]) -> Result<Index> {
        self.actions.individual_to_joint(individual)
    }

    fn individual_actions(&self, ja: Index) -> Result<Vec<Index>> {
        self.actions.joint_to_individual(ja)
    }

    fn joint_observation_index(&self, individual: &[Index]) -> Result<Index> {
        self.observations.individual_to_joint(individual)
    }

    fn individual_observations(&self, jo: Index) -> Result<Vec<Index>> {
        self.observations.joint_to_individual(jo)
    }

    fn get_transition_probability(&self, s: Index, ja: Index, s_next: Index) -> f64 {
        match &self.transition {
            Some(t) => t.get(s, ja, s_next),
            None => panic!("model '{}' has no transition table", self.name),
        }
    }

    fn get_observation_probability(&self, ja: Index, s_next: Index, jo: Index) -> f64 {
        match &self.observation {
            Some(o) => o.get(ja, s_next, jo),
            None => panic!("model '{}' has no observation table", self.name),
        }
    }

    fn transition_handle(&self) -> Option<TGet<'_>> {
        self.transition.as_ref().map(|t| t.handle())
    }

    fn observation_handle(&self) -> Option<OGet<'_>> {
        self.observation.as_ref().map(|o| o.handle())
    }

    fn initial_state_distribution(&self) -> Option<&Array1<f64>> {
        self.states.isd()
    }

    fn sample_initial_state(&self, rng: &mut dyn RngCore) -> Result<Index> {
        self.states.sample_initial_state(rng)
    }

    fn sample_successor_state(&self, s: Index, ja: Index, rng: &mut dyn RngCore) -> Result<Index> {
        self.ensure_initialized()?;
        check_index("state", s, self.nr_states())?;
        check_index("joint action", ja, self.nr_joint_actions)?;
        let transition = self
            .transition
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized("transition model"))?;
        Ok(transition.sample(s, ja, rng))
    }

    fn sample_joint_observation(&self, ja: Index, s_next: Index, rng: &mut dyn RngCore) -> Result<Index> {
        self.ensure_initialized()?;
        check_index("joint action", ja, self.nr_joint_actions)?;
        check_index("successor state", s_next, self.nr_states())?;
        let observation = self
            .observation
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized("observation model"))?;
        Ok(observation.sample(ja, s_next, rng))
    }
}

impl fmt::Display for DecisionProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem: {}", self.name)?;
        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }
        writeln!(f, "agents: {}, states: {}", self.nr_agents(), self.nr_states())?;
        for agent in 0..self.nr_agents() {
            writeln!(
                f,
                "agent {}: {} actions, {} observations",
                agent,
                self.actions.nr(agent).unwrap_or(0),
                self.observations.nr(agent).unwrap_or(0)
            )?;
        }
        if let Some(t) = &self.transition {
            write!(f, "{}", t)?;
        }
        if let Some(o) = &self.observation {
            write!(f, "{}", o)?;
        }
        Ok(())
    }
}
