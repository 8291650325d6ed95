use ndarray::Array2;

use crate::belief::BeliefInterface;
use crate::error::Result;
use crate::model::PlanningProblem;
use crate::planning::alpha_vector::ValueFunction;
use crate::planning::mdp_value_iteration::{argmax, MdpValueIteration};
use crate::types::Index;

/// Joint-action values at a belief.
pub trait QFunction {
    fn nr_joint_actions(&self) -> usize;

    fn get_q(&self, belief: &dyn BeliefInterface, ja: Index) -> f64;

    /// First joint action with the highest value.
    fn greedy_action(&self, belief: &dyn BeliefInterface) -> Index {
        argmax((0..self.nr_joint_actions()).map(|ja| self.get_q(belief, ja)))
    }
}

/// `Q(b, a) = Σ_s b(s) · Q_MDP(s, a)`: the underlying MDP's values averaged
/// over the belief.
#[derive(Clone, Debug)]
pub struct Qmdp {
    q: Array2<f64>,
}

impl Qmdp {
    pub fn new(q: Array2<f64>) -> Self {
        Qmdp { q }
    }

    /// Uses stage 0 of a planned value iteration.
    pub fn from_value_iteration<P: PlanningProblem + ?Sized>(vi: &MdpValueIteration<'_, P>) -> Result<Self> {
        Ok(Qmdp {
            q: vi.q_table(0)?.clone(),
        })
    }

    pub fn table(&self) -> &Array2<f64> {
        &self.q
    }
}

impl QFunction for Qmdp {
    fn nr_joint_actions(&self) -> usize {
        self.q.ncols()
    }

    fn get_q(&self, belief: &dyn BeliefInterface, ja: Index) -> f64 {
        belief.iter().map(|(s, p)| p * self.q[[s, ja]]).sum()
    }
}

/// Q-values read off an alpha-vector value function: the best vector tagged
/// with `ja`, or `-∞` when there is none.
#[derive(Clone, Debug)]
pub struct Qav {
    vf: ValueFunction,
    nr_joint_actions: usize,
}

impl Qav {
    pub fn new(vf: ValueFunction, nr_joint_actions: usize) -> Self {
        Qav { vf, nr_joint_actions }
    }

    pub fn value_function(&self) -> &ValueFunction {
        &self.vf
    }
}

impl QFunction for Qav {
    fn nr_joint_actions(&self) -> usize {
        self.nr_joint_actions
    }

    fn get_q(&self, belief: &dyn BeliefInterface, ja: Index) -> f64 {
        self.vf
            .iter()
            .filter(|alpha| alpha.action == ja)
            .map(|alpha| alpha.value_at(belief))
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
