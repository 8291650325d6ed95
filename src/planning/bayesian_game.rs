use ndarray::{Array1, Array2};
use serde::{Serialize, Deserialize};

use crate::belief::{Belief, BeliefInterface, ModelAccess};
use crate::error::{check_index, MadpError, Result};
use crate::index_tools;
use crate::model::PlanningProblem;
use crate::planning::q_function::QFunction;
use crate::types::{Index, PROB_PRECISION};

/// A one-shot game of incomplete information in which all agents share the
/// payoff `u(joint type, joint action)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BayesianGameIdenticalPayoff {
    nr_actions: Vec<usize>,
    nr_types: Vec<usize>,
    type_probabilities: Array1<f64>,
    utilities: Array2<f64>,
}

impl BayesianGameIdenticalPayoff {
    pub fn new(nr_actions: Vec<usize>, nr_types: Vec<usize>) -> Result<Self> {
        if nr_actions.is_empty() || nr_actions.len() != nr_types.len() {
            return Err(MadpError::dimension_mismatch(
                "one action and one type count per agent (at least one agent)",
                format!("{} action counts, {} type counts", nr_actions.len(), nr_types.len()),
            ));
        }
        if nr_actions.iter().chain(&nr_types).any(|&n| n == 0) {
            return Err(MadpError::invalid_parameter("cardinalities", "every agent needs actions and types"));
        }
        let nr_jt = index_tools::joint_cardinality(&nr_types)?;
        let nr_ja = index_tools::joint_cardinality(&nr_actions)?;
        Ok(BayesianGameIdenticalPayoff {
            nr_actions,
            nr_types,
            type_probabilities: Array1::zeros(nr_jt),
            utilities: Array2::zeros((nr_jt, nr_ja)),
        })
    }

    /// The coordination problem of one Dec-POMDP stage: after `previous_ja`
    /// was taken at `belief`, each agent's type is its own observation, the
    /// joint type has probability `P(jo | b, a)` and the payoff of a joint
    /// action is `q` at the updated belief. Impossible joint observations get
    /// probability and payoff 0.
    pub fn for_stage<P: PlanningProblem + ?Sized>(
        problem: &P,
        belief: &Belief,
        previous_ja: Index,
        q: &dyn QFunction,
    ) -> Result<Self> {
        let model = problem.model();
        let nr_agents = model.nr_agents();
        let nr_actions = (0..nr_agents).map(|i| model.nr_actions(i)).collect::<Result<Vec<_>>>()?;
        let nr_types = (0..nr_agents).map(|i| model.nr_observations(i)).collect::<Result<Vec<_>>>()?;
        check_index("joint action", previous_ja, model.nr_joint_actions())?;
        let mut bg = Self::new(nr_actions, nr_types)?;
        let access = ModelAccess::for_model(model);
        for jo in 0..bg.nr_joint_types() {
            let mut next = belief.clone();
            let p = next.update(access, previous_ja, jo);
            if p <= PROB_PRECISION {
                continue;
            }
            bg.type_probabilities[jo] = p;
            for ja in 0..bg.nr_joint_actions() {
                bg.utilities[[jo, ja]] = q.get_q(&next, ja);
            }
        }
        Ok(bg)
    }

    pub fn nr_agents(&self) -> usize {
        self.nr_actions.len()
    }

    pub fn nr_actions(&self) -> &[usize] {
        &self.nr_actions
    }

    pub fn nr_types(&self) -> &[usize] {
        &self.nr_types
    }

    pub fn nr_joint_types(&self) -> usize {
        self.type_probabilities.len()
    }

    pub fn nr_joint_actions(&self) -> usize {
        self.utilities.ncols()
    }

    pub fn joint_type_index(&self, types: &[Index]) -> Result<Index> {
        index_tools::individual_to_joint(types, &self.nr_types)
    }

    pub fn joint_action_index(&self, actions: &[Index]) -> Result<Index> {
        index_tools::individual_to_joint(actions, &self.nr_actions)
    }

    pub fn set_probability(&mut self, jt: Index, p: f64) -> Result<()> {
        check_index("joint type", jt, self.nr_joint_types())?;
        if p.is_nan() || p < 0.0 {
            return Err(MadpError::InvalidProbability {
                location: format!("joint type {}", jt),
                value: p,
            });
        }
        self.type_probabilities[jt] = p;
        Ok(())
    }

    pub fn probability(&self, jt: Index) -> f64 {
        self.type_probabilities[jt]
    }

    pub fn set_utility(&mut self, jt: Index, ja: Index, u: f64) -> Result<()> {
        check_index("joint type", jt, self.nr_joint_types())?;
        check_index("joint action", ja, self.nr_joint_actions())?;
        self.utilities[[jt, ja]] = u;
        Ok(())
    }

    pub fn utility(&self, jt: Index, ja: Index) -> f64 {
        self.utilities[[jt, ja]]
    }

    /// `Σ_jt P(jt) · u(jt, π(jt))`
    pub fn expected_value(&self, policy: &JointPolicyPureVector) -> Result<f64> {
        let mut value = 0.0;
        for jt in 0..self.nr_joint_types() {
            let p = self.type_probabilities[jt];
            if p == 0.0 {
                continue;
            }
            value += p * self.utilities[[jt, policy.joint_action(self, jt)?]];
        }
        Ok(value)
    }
}

/// A deterministic joint policy: for each agent, one action per type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JointPolicyPureVector {
    actions: Vec<Vec<Index>>,
}

impl JointPolicyPureVector {
    /// The policy taking action 0 for every type.
    pub fn new(bg: &BayesianGameIdenticalPayoff) -> Self {
        JointPolicyPureVector {
            actions: bg.nr_types.iter().map(|&n| vec![0; n]).collect(),
        }
    }

    /// Decodes one policy index per agent. An agent's policy index is its
    /// type-to-action vector read as a mixed-radix number.
    pub fn from_indices(bg: &BayesianGameIdenticalPayoff, indices: &[Index]) -> Result<Self> {
        if indices.len() != bg.nr_agents() {
            return Err(MadpError::dimension_mismatch(
                format!("{} policy indices", bg.nr_agents()),
                format!("{} policy indices", indices.len()),
            ));
        }
        let actions = indices
            .iter()
            .enumerate()
            .map(|(agent, &index)| {
                let radix = vec![bg.nr_actions[agent]; bg.nr_types[agent]];
                index_tools::joint_to_individual(index, &radix)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(JointPolicyPureVector { actions })
    }

    pub fn policy_index(&self, bg: &BayesianGameIdenticalPayoff, agent: Index) -> Result<Index> {
        check_index("agent", agent, self.actions.len())?;
        let radix = vec![bg.nr_actions[agent]; bg.nr_types[agent]];
        index_tools::individual_to_joint(&self.actions[agent], &radix)
    }

    pub fn action(&self, agent: Index, agent_type: Index) -> Index {
        self.actions[agent][agent_type]
    }

    pub fn set_action(&mut self, agent: Index, agent_type: Index, action: Index) -> Result<()> {
        check_index("agent", agent, self.actions.len())?;
        check_index("type", agent_type, self.actions[agent].len())?;
        self.actions[agent][agent_type] = action;
        Ok(())
    }

    /// Joint action prescribed for joint type `jt`.
    pub fn joint_action(&self, bg: &BayesianGameIdenticalPayoff, jt: Index) -> Result<Index> {
        let types = index_tools::joint_to_individual(jt, &bg.nr_types)?;
        let actions: Vec<Index> = types
            .iter()
            .enumerate()
            .map(|(agent, &t)| self.actions[agent][t])
            .collect();
        bg.joint_action_index(&actions)
    }
}

/// Evaluates every pure joint policy of a Bayesian game.
#[derive(Clone, Debug, Default)]
pub struct BruteForceSolver {
    nr_evaluated: usize,
}

impl BruteForceSolver {
    pub fn new() -> Self {
        BruteForceSolver::default()
    }

    /// Number of joint policies evaluated by the last call to `solve`.
    pub fn nr_evaluated(&self) -> usize {
        self.nr_evaluated
    }

    /// The best joint policy and its expected payoff; ties keep the policy
    /// enumerated first.
    pub fn solve(&mut self, bg: &BayesianGameIdenticalPayoff) -> Result<(JointPolicyPureVector, f64)> {
        let policies_per_agent = (0..bg.nr_agents())
            .map(|agent| index_tools::joint_cardinality(&vec![bg.nr_actions[agent]; bg.nr_types[agent]]))
            .collect::<Result<Vec<usize>>>()?;
        let total = index_tools::joint_cardinality(&policies_per_agent)?;
        log::debug!("brute force over {} joint policies", total);

        let mut indices = vec![0; bg.nr_agents()];
        let mut best: Option<(JointPolicyPureVector, f64)> = None;
        self.nr_evaluated = 0;
        loop {
            let policy = JointPolicyPureVector::from_indices(bg, &indices)?;
            let value = bg.expected_value(&policy)?;
            self.nr_evaluated += 1;
            if best.as_ref().map_or(true, |(_, v)| value > *v) {
                best = Some((policy, value));
            }
            if index_tools::increment(&mut indices, &policies_per_agent) {
                break;
            }
        }
        best.ok_or_else(|| MadpError::Construction("game has no joint policies".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::alpha_vector::AlphaVector;
    use crate::planning::q_function::Qav;
    use crate::tests::fixtures;
    use ndarray::array;

    /// Two agents with two types each; payoff 1 when both play their own
    /// type, and 0.6 whenever both play action 0.
    fn matching_game() -> BayesianGameIdenticalPayoff {
        let mut bg = BayesianGameIdenticalPayoff::new(vec![2, 2], vec![2, 2]).unwrap();
        for t0 in 0..2 {
            for t1 in 0..2 {
                let jt = bg.joint_type_index(&[t0, t1]).unwrap();
                bg.set_probability(jt, 0.25).unwrap();
                for a0 in 0..2 {
                    for a1 in 0..2 {
                        let ja = bg.joint_action_index(&[a0, a1]).unwrap();
                        let u = if a0 == t0 && a1 == t1 {
                            1.0
                        } else if a0 == 0 && a1 == 0 {
                            0.6
                        } else {
                            0.0
                        };
                        bg.set_utility(jt, ja, u).unwrap();
                    }
                }
            }
        }
        bg
    }

    #[test]
    fn test_brute_force_finds_identity_policy() {
        let bg = matching_game();
        let mut solver = BruteForceSolver::new();
        let (policy, value) = solver.solve(&bg).unwrap();
        assert_eq!(solver.nr_evaluated(), 16);
        assert!((value - 1.0).abs() < 1e-12);
        for agent in 0..2 {
            for t in 0..2 {
                assert_eq!(policy.action(agent, t), t);
            }
        }
        assert_eq!(policy.policy_index(&bg, 0).unwrap(), 1);
    }

    #[test]
    fn test_policy_indices_round_trip() {
        let bg = matching_game();
        let policy = JointPolicyPureVector::from_indices(&bg, &[2, 3]).unwrap();
        assert_eq!(policy.action(0, 0), 1);
        assert_eq!(policy.action(0, 1), 0);
        assert_eq!(policy.policy_index(&bg, 0).unwrap(), 2);
        assert_eq!(policy.policy_index(&bg, 1).unwrap(), 3);
        assert!(JointPolicyPureVector::from_indices(&bg, &[4, 0]).is_err());

        let zero = JointPolicyPureVector::new(&bg);
        assert!((bg.expected_value(&zero).unwrap() - 0.25 * 1.0 - 0.75 * 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_games() {
        assert!(BayesianGameIdenticalPayoff::new(vec![], vec![]).is_err());
        assert!(BayesianGameIdenticalPayoff::new(vec![2], vec![2, 2]).is_err());
        assert!(BayesianGameIdenticalPayoff::new(vec![2, 0], vec![1, 1]).is_err());
        let mut bg = matching_game();
        assert!(bg.set_probability(0, -0.1).is_err());
        assert!(bg.set_utility(4, 0, 1.0).is_err());
    }

    #[test]
    fn test_stage_game_of_dec_tiger() {
        let problem = fixtures::dec_tiger();
        let q = Qav::new(
            vec![
                AlphaVector::new(array![1.0, 0.0], 0),
                AlphaVector::new(array![0.0, 1.0], 1),
            ],
            9,
        );
        let belief = Belief::uniform(2);
        let bg = BayesianGameIdenticalPayoff::for_stage(&problem, &belief, 0, &q).unwrap();
        assert_eq!(bg.nr_joint_types(), 4);
        assert_eq!(bg.nr_joint_actions(), 9);
        let total: f64 = (0..4).map(|jt| bg.probability(jt)).sum();
        assert!((total - 1.0).abs() < 1e-12);
        let both_left = bg.joint_type_index(&[0, 0]).unwrap();
        assert!((bg.probability(both_left) - 0.5 * (0.85 * 0.85 + 0.15 * 0.15)).abs() < 1e-12);
        // After hearing left twice the tiger is most likely left
        assert!(bg.utility(both_left, 0) > bg.utility(both_left, 1));
        assert_eq!(bg.utility(both_left, 2), f64::NEG_INFINITY);

        let (_, value) = BruteForceSolver::new().solve(&bg).unwrap();
        assert!(value.is_finite());
    }
}
