use crate::error::{MadpError, Result};
use crate::model::{DecPomdp, DecisionProcess, ModelConfig, ProblemModel, RewardType};
use crate::types::{Horizon, Index, ValidationMode};

type TransitionFn = Box<dyn Fn(Index, &[Index], Index) -> f64>;
type ObservationFn = Box<dyn Fn(&[Index], Index, &[Index]) -> f64>;
type RewardFn = Box<dyn Fn(Index, &[Index]) -> f64>;

/// Builder for Dec-POMDPs with a fluent API.
///
/// Tables can be given entry by entry or as closures over individual
/// actions and observations; explicit entries are applied after closures.
pub struct DecPomdpBuilder {
    name: String,
    description: String,
    config: ModelConfig,
    states: Vec<String>,
    agents: Vec<(Vec<String>, Vec<String>)>,
    isd: Option<Vec<f64>>,
    transition_fn: Option<TransitionFn>,
    observation_fn: Option<ObservationFn>,
    reward_fn: Option<RewardFn>,
    transitions: Vec<(Index, Index, Index, f64)>,
    observations: Vec<(Index, Index, Index, f64)>,
    rewards: Vec<(Index, Index, f64)>,
    reward_type: RewardType,
    discount: f64,
    horizon: Horizon,
}

impl DecPomdpBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        DecPomdpBuilder {
            name: name.into(),
            description: String::new(),
            config: ModelConfig::default(),
            states: Vec::new(),
            agents: Vec::new(),
            isd: None,
            transition_fn: None,
            observation_fn: None,
            reward_fn: None,
            transitions: Vec::new(),
            observations: Vec::new(),
            rewards: Vec::new(),
            reward_type: RewardType::Reward,
            discount: 1.0,
            horizon: Horizon::Infinite,
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.config.sparse = sparse;
        self
    }

    pub fn validation(mut self, validation: ValidationMode) -> Self {
        self.config.validation = validation;
        self
    }

    /// Named states, in index order
    pub fn states(mut self, names: &[&str]) -> Self {
        self.states = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// `n` states named `s0 .. s{n-1}`
    pub fn nr_states(mut self, n: usize) -> Self {
        self.states = (0..n).map(|s| format!("s{}", s)).collect();
        self
    }

    /// Adds the next agent with its named actions and observations
    pub fn agent(mut self, actions: &[&str], observations: &[&str]) -> Self {
        self.agents.push((
            actions.iter().map(|a| a.to_string()).collect(),
            observations.iter().map(|o| o.to_string()).collect(),
        ));
        self
    }

    /// Defaults to uniform when not given
    pub fn initial_state_distribution(mut self, isd: Vec<f64>) -> Self {
        self.isd = Some(isd);
        self
    }

    pub fn transition(mut self, s: Index, ja: Index, s_next: Index, p: f64) -> Self {
        self.transitions.push((s, ja, s_next, p));
        self
    }

    /// `P(s' | s, a)` with `a` given as individual actions
    pub fn transition_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Index, &[Index], Index) -> f64 + 'static,
    {
        self.transition_fn = Some(Box::new(f));
        self
    }

    pub fn observation(mut self, ja: Index, s_next: Index, jo: Index, p: f64) -> Self {
        self.observations.push((ja, s_next, jo, p));
        self
    }

    /// `P(o | a, s')` with `a` and `o` given as individual indices
    pub fn observation_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Index], Index, &[Index]) -> f64 + 'static,
    {
        self.observation_fn = Some(Box::new(f));
        self
    }

    pub fn reward(mut self, s: Index, ja: Index, r: f64) -> Self {
        self.rewards.push((s, ja, r));
        self
    }

    pub fn reward_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(Index, &[Index]) -> f64 + 'static,
    {
        self.reward_fn = Some(Box::new(f));
        self
    }

    pub fn reward_type(mut self, reward_type: RewardType) -> Self {
        self.reward_type = reward_type;
        self
    }

    pub fn discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn horizon(mut self, horizon: Horizon) -> Self {
        self.horizon = horizon;
        self
    }

    /// Builds and finalizes the decision process without rewards.
    pub fn build_process(&self) -> Result<DecisionProcess> {
        if self.states.is_empty() {
            return Err(MadpError::invalid_parameter("states", "at least one state is required"));
        }
        if self.agents.is_empty() {
            return Err(MadpError::invalid_parameter("agents", "at least one agent is required"));
        }
        let mut process = DecisionProcess::new(self.name.clone(), self.agents.len(), self.config.clone())?;
        process.set_description(self.description.clone());
        for state in &self.states {
            process.add_state(state.as_str(), "")?;
        }
        for (agent, (actions, observations)) in self.agents.iter().enumerate() {
            for action in actions {
                process.add_action(agent, action.as_str(), "")?;
            }
            for observation in observations {
                process.add_observation(agent, observation.as_str(), "")?;
            }
        }
        match &self.isd {
            Some(isd) => process.set_isd(isd.clone())?,
            None => process.set_uniform_isd()?,
        }
        process.create_new_transition_model()?;
        process.create_new_observation_model()?;

        let nr_states = process.states().nr();
        let nr_ja = process.actions().nr_joint()?;
        let nr_jo = process.observations().nr_joint()?;
        if let Some(f) = &self.transition_fn {
            for ja in 0..nr_ja {
                let actions = process.actions().joint_to_individual(ja)?;
                for s in 0..nr_states {
                    for s_next in 0..nr_states {
                        let p = f(s, &actions, s_next);
                        if p != 0.0 {
                            process.set_transition_probability(s, ja, s_next, p)?;
                        }
                    }
                }
            }
        }
        if let Some(f) = &self.observation_fn {
            for ja in 0..nr_ja {
                let actions = process.actions().joint_to_individual(ja)?;
                for jo in 0..nr_jo {
                    let observations = process.observations().joint_to_individual(jo)?;
                    for s_next in 0..nr_states {
                        let p = f(&actions, s_next, &observations);
                        if p != 0.0 {
                            process.set_observation_probability(ja, s_next, jo, p)?;
                        }
                    }
                }
            }
        }
        for &(s, ja, s_next, p) in &self.transitions {
            process.set_transition_probability(s, ja, s_next, p)?;
        }
        for &(ja, s_next, jo, p) in &self.observations {
            process.set_observation_probability(ja, s_next, jo, p)?;
        }
        process.set_initialized(true)?;
        Ok(process)
    }

    /// Build the Dec-POMDP
    pub fn build(self) -> Result<DecPomdp> {
        let process = self.build_process()?;
        let nr_states = process.nr_states();
        let nr_ja = process.nr_joint_actions();
        let individual: Vec<Vec<Index>> = (0..nr_ja)
            .map(|ja| process.individual_actions(ja))
            .collect::<Result<_>>()?;

        let mut problem = DecPomdp::new(process)?;
        if let Some(f) = &self.reward_fn {
            for (ja, actions) in individual.iter().enumerate() {
                for s in 0..nr_states {
                    let r = f(s, actions);
                    if r != 0.0 {
                        problem.set_reward(s, ja, r)?;
                    }
                }
            }
        }
        for &(s, ja, r) in &self.rewards {
            problem.set_reward(s, ja, r)?;
        }
        problem.set_reward_type(self.reward_type);
        problem.set_discount(self.discount)?;
        problem.set_horizon(self.horizon);
        Ok(problem)
    }
}
