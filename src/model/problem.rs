use ndarray::Array1;
use serde::{Serialize, Deserialize};

use crate::error::{check_index, MadpError, Result};
use crate::model::decision_process::{DecisionProcess, ProblemModel};
use crate::model::reward::RewardModel;
use crate::types::{Horizon, Index};

/// Whether stored values are rewards or costs; costs are negated on read.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RewardType {
    #[default]
    Reward,
    Cost,
}

impl RewardType {
    fn sign(&self) -> f64 {
        match self {
            RewardType::Reward => 1.0,
            RewardType::Cost => -1.0,
        }
    }
}

/// A model with a shared reward, a discount and a horizon: what planners
/// consume.
pub trait PlanningProblem {
    fn model(&self) -> &dyn ProblemModel;
    fn get_reward(&self, s: Index, ja: Index) -> f64;
    fn discount(&self) -> f64;
    fn horizon(&self) -> Horizon;

    fn reward_vector(&self, ja: Index) -> Array1<f64> {
        Array1::from_shape_fn(self.model().nr_states(), |s| self.get_reward(s, ja))
    }

    /// Smallest and largest reward over all `(s, ja)`.
    fn reward_bounds(&self) -> (f64, f64) {
        let model = self.model();
        let mut bounds = (f64::INFINITY, f64::NEG_INFINITY);
        for ja in 0..model.nr_joint_actions() {
            for s in 0..model.nr_states() {
                let r = self.get_reward(s, ja);
                bounds.0 = bounds.0.min(r);
                bounds.1 = bounds.1.max(r);
            }
        }
        bounds
    }
}

pub(crate) fn check_discount(discount: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&discount) {
        return Err(MadpError::invalid_parameter(
            "discount",
            format!("{} is outside [0, 1]", discount),
        ));
    }
    Ok(())
}

/// Decentralized POMDP: a decision process with one reward shared by all
/// agents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecPomdp {
    process: DecisionProcess,
    rewards: RewardModel,
    reward_type: RewardType,
    discount: f64,
    horizon: Horizon,
}

impl DecPomdp {
    /// Wraps an initialized process with an all-zero reward, discount 1 and
    /// an infinite horizon.
    pub fn new(process: DecisionProcess) -> Result<Self> {
        if !process.is_initialized() {
            return Err(MadpError::not_initialized(format!("model '{}'", process.name())));
        }
        let rewards = RewardModel::new(process.nr_states(), process.nr_joint_actions(), process.is_sparse());
        Ok(DecPomdp {
            process,
            rewards,
            reward_type: RewardType::Reward,
            discount: 1.0,
            horizon: Horizon::Infinite,
        })
    }

    pub fn process(&self) -> &DecisionProcess {
        &self.process
    }

    pub fn rewards(&self) -> &RewardModel {
        &self.rewards
    }

    pub fn set_reward(&mut self, s: Index, ja: Index, r: f64) -> Result<()> {
        self.rewards.set(s, ja, r)
    }

    pub fn set_reward_individual(&mut self, s: Index, actions: &[Index], r: f64) -> Result<()> {
        let ja = self.process.joint_action_index(actions)?;
        self.set_reward(s, ja, r)
    }

    /// Sets `R(s, ja)` for every state.
    pub fn set_reward_all_states(&mut self, ja: Index, r: f64) -> Result<()> {
        for s in 0..self.process.nr_states() {
            self.rewards.set(s, ja, r)?;
        }
        Ok(())
    }

    pub fn reward_type(&self) -> RewardType {
        self.reward_type
    }

    pub fn set_reward_type(&mut self, reward_type: RewardType) {
        self.reward_type = reward_type;
    }

    pub fn set_discount(&mut self, discount: f64) -> Result<()> {
        check_discount(discount)?;
        self.discount = discount;
        Ok(())
    }

    pub fn set_horizon(&mut self, horizon: Horizon) {
        self.horizon = horizon;
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self> {
        let data = std::fs::read(path)?;
        let problem = bincode::deserialize(&data)?;
        Ok(problem)
    }
}

impl PlanningProblem for DecPomdp {
    fn model(&self) -> &dyn ProblemModel {
        &self.process
    }

    #[inline]
    fn get_reward(&self, s: Index, ja: Index) -> f64 {
        self.reward_type.sign() * self.rewards.get(s, ja)
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn horizon(&self) -> Horizon {
        self.horizon
    }
}

/// Partially observable stochastic game: one reward function per agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Posg {
    process: DecisionProcess,
    rewards: Vec<RewardModel>,
    discount: f64,
    horizon: Horizon,
}

impl Posg {
    pub fn new(process: DecisionProcess) -> Result<Self> {
        if !process.is_initialized() {
            return Err(MadpError::not_initialized(format!("model '{}'", process.name())));
        }
        let rewards = (0..process.nr_agents())
            .map(|_| RewardModel::new(process.nr_states(), process.nr_joint_actions(), process.is_sparse()))
            .collect();
        Ok(Posg {
            process,
            rewards,
            discount: 1.0,
            horizon: Horizon::Infinite,
        })
    }

    pub fn process(&self) -> &DecisionProcess {
        &self.process
    }

    /// A shared reward has no meaning in a game.
    pub fn set_reward(&mut self, _s: Index, _ja: Index, _r: f64) -> Result<()> {
        Err(MadpError::NotImplemented(
            "set_reward without an agent on a POSG; use set_agent_reward".to_string(),
        ))
    }

    pub fn set_agent_reward(&mut self, agent: Index, s: Index, ja: Index, r: f64) -> Result<()> {
        check_index("agent", agent, self.rewards.len())?;
        self.rewards[agent].set(s, ja, r)
    }

    pub fn get_reward(&self, agent: Index, s: Index, ja: Index) -> Result<f64> {
        check_index("agent", agent, self.rewards.len())?;
        check_index("state", s, self.process.nr_states())?;
        check_index("joint action", ja, self.process.nr_joint_actions())?;
        Ok(self.rewards[agent].get(s, ja))
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn set_discount(&mut self, discount: f64) -> Result<()> {
        check_discount(discount)?;
        self.discount = discount;
        Ok(())
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn set_horizon(&mut self, horizon: Horizon) {
        self.horizon = horizon;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::decision_process::ModelConfig;

    fn single_state_process(nr_agents: usize) -> DecisionProcess {
        let mut m = DecisionProcess::new("one", nr_agents, ModelConfig::default()).unwrap();
        m.set_nr_states(1).unwrap();
        m.set_uniform_isd().unwrap();
        for agent in 0..nr_agents {
            m.set_nr_actions(agent, 2).unwrap();
            m.set_nr_observations(agent, 1).unwrap();
        }
        m.create_new_transition_model().unwrap();
        m.create_new_observation_model().unwrap();
        let nr_ja = 1 << nr_agents;
        for ja in 0..nr_ja {
            m.set_transition_probability(0, ja, 0, 1.0).unwrap();
            m.set_observation_probability(ja, 0, 0, 1.0).unwrap();
        }
        m.set_initialized(true).unwrap();
        m
    }

    #[test]
    fn test_requires_initialized_process() {
        let m = DecisionProcess::new("raw", 1, ModelConfig::default()).unwrap();
        assert!(matches!(DecPomdp::new(m), Err(MadpError::NotInitialized(_))));
    }

    #[test]
    fn test_rewards_and_costs() {
        let mut p = DecPomdp::new(single_state_process(2)).unwrap();
        p.set_reward_individual(0, &[1, 0], 4.0).unwrap();
        assert_eq!(p.get_reward(0, 2), 4.0);
        p.set_reward_type(RewardType::Cost);
        assert_eq!(p.get_reward(0, 2), -4.0);
        assert_eq!(p.reward_bounds(), (-4.0, 0.0));
        assert!(p.set_discount(1.5).is_err());
        p.set_discount(0.95).unwrap();
        assert_eq!(p.discount(), 0.95);
    }

    #[test]
    fn test_posg_shared_reward_is_not_implemented() {
        let mut g = Posg::new(single_state_process(2)).unwrap();
        assert!(matches!(g.set_reward(0, 0, 1.0), Err(MadpError::NotImplemented(_))));
        g.set_agent_reward(1, 0, 3, -2.0).unwrap();
        assert_eq!(g.get_reward(1, 0, 3).unwrap(), -2.0);
        assert_eq!(g.get_reward(0, 0, 3).unwrap(), 0.0);
        assert!(g.get_reward(2, 0, 0).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problem.bin");
        let path = path.to_str().unwrap();

        let mut p = DecPomdp::new(single_state_process(1)).unwrap();
        p.set_reward(0, 1, 2.5).unwrap();
        p.set_horizon(Horizon::Finite(3));
        p.save(path).unwrap();

        let loaded = DecPomdp::load(path).unwrap();
        assert_eq!(loaded.get_reward(0, 1), 2.5);
        assert_eq!(loaded.horizon(), Horizon::Finite(3));
        assert_eq!(loaded.model().nr_joint_actions(), 2);
        assert_eq!(loaded.model().get_transition_probability(0, 1, 0), 1.0);
    }
}
