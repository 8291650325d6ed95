use ndarray::{Array1, Array2, ArrayViewMut1, Axis};
#[cfg(feature = "parallel")]
use ndarray::parallel::prelude::*;
use serde::{Serialize, Deserialize};

use crate::error::{check_index, MadpError, Result};
use crate::model::{PlanningProblem, ProblemModel, TGet};
use crate::planning::config::PlannerConfig;
use crate::types::{Horizon, Index};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlannerState {
    Uninitialized,
    Initialized,
    Planned,
}

/// Q-tables as written by [`MdpValueIteration::save`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QTables {
    pub horizon: Horizon,
    pub tables: Vec<Array2<f64>>,
}

/// Value iteration on the fully observable MDP underlying a problem.
///
/// A finite horizon `h` keeps one `|S| x |JA|` table per stage `0..h`;
/// an infinite horizon keeps a single stationary table.
pub struct MdpValueIteration<'a, P: PlanningProblem + ?Sized> {
    problem: &'a P,
    config: PlannerConfig,
    state: PlannerState,
    rewards: Array2<f64>,
    q_tables: Vec<Array2<f64>>,
}

impl<'a, P: PlanningProblem + ?Sized> MdpValueIteration<'a, P> {
    pub fn new(problem: &'a P, config: PlannerConfig) -> Self {
        MdpValueIteration {
            problem,
            config,
            state: PlannerState::Uninitialized,
            rewards: Array2::zeros((0, 0)),
            q_tables: Vec::new(),
        }
    }

    pub fn is_planned(&self) -> bool {
        self.state == PlannerState::Planned
    }

    pub fn horizon(&self) -> Horizon {
        self.problem.horizon()
    }

    /// Allocates zeroed Q-tables and caches the reward table.
    pub fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        let model = self.problem.model();
        let nr_states = model.nr_states();
        let nr_ja = model.nr_joint_actions();
        let nr_tables = match self.problem.horizon() {
            Horizon::Finite(0) => {
                return Err(MadpError::invalid_parameter("horizon", "must be at least 1 stage"));
            }
            Horizon::Finite(h) => h,
            Horizon::Infinite => 1,
        };
        self.rewards = Array2::from_shape_fn((nr_states, nr_ja), |(s, ja)| self.problem.get_reward(s, ja));
        self.q_tables = vec![Array2::zeros((nr_states, nr_ja)); nr_tables];
        self.state = PlannerState::Initialized;
        Ok(())
    }

    /// Computes the Q-tables and returns the number of sweeps. Initializes
    /// first if needed.
    ///
    /// Finite horizons run backward induction
    /// `Q_t(s,a) = R(s,a) + γ Σ_s' P(s'|s,a) max_a' Q_{t+1}(s',a')`.
    /// The discount applies here too, so undiscounted finite-horizon values
    /// need a problem with `γ = 1`.
    pub fn plan(&mut self) -> Result<usize> {
        if self.state == PlannerState::Uninitialized {
            self.initialize()?;
        }
        let sweeps = match self.problem.horizon() {
            Horizon::Finite(h) => {
                self.plan_finite(h);
                h
            }
            Horizon::Infinite => self.plan_infinite()?,
        };
        self.state = PlannerState::Planned;
        Ok(sweeps)
    }

    fn plan_finite(&mut self, horizon: usize) {
        let nr_states = self.rewards.nrows();
        let mut future = Array1::zeros(nr_states);
        for t in (0..horizon).rev() {
            let mut q = Array2::zeros(self.rewards.dim());
            self.sweep(&future, &mut q);
            future = max_over_actions(&q);
            self.q_tables[t] = q;
            log::trace!("value iteration stage {} done", t);
        }
        log::info!("finite-horizon value iteration: {} stages", horizon);
    }

    fn plan_infinite(&mut self) -> Result<usize> {
        let tolerance = self.config.tolerance;
        let mut q = self.q_tables[0].clone();
        for sweep in 1..=self.config.max_iterations {
            let v = max_over_actions(&q);
            let mut next = Array2::zeros(q.dim());
            self.sweep(&v, &mut next);
            let delta = (&next - &q).iter().fold(0.0f64, |m, d| m.max(d.abs()));
            q = next;
            if delta < tolerance {
                log::info!("value iteration converged after {} sweeps (max delta {:.3e})", sweep, delta);
                self.q_tables[0] = q;
                return Ok(sweep);
            }
            if sweep % 100 == 0 {
                log::debug!("value iteration sweep {}: max delta {:.3e}", sweep, delta);
            }
        }
        self.q_tables[0] = q;
        Err(MadpError::NumericalError(format!(
            "value iteration did not converge within {} sweeps",
            self.config.max_iterations
        )))
    }

    /// `q(s, a) = R(s, a) + γ Σ_s' T(s, a, s') v(s')`
    fn sweep(&self, v: &Array1<f64>, q: &mut Array2<f64>) {
        let discount = self.problem.discount();
        let model = self.problem.model();
        match model.transition_handle() {
            Some(t) => sweep_with_handle(t, &self.rewards, discount, v, q),
            None => {
                for (s, row) in q.axis_iter_mut(Axis(0)).enumerate() {
                    generic_row(model, &self.rewards, discount, v, s, row);
                }
            }
        }
    }

    fn ensure_planned(&self) -> Result<()> {
        if self.state != PlannerState::Planned {
            return Err(MadpError::not_initialized("value iteration has not been planned"));
        }
        Ok(())
    }

    /// Q-table of stage `t`; the stationary table for infinite horizons
    /// regardless of `t`.
    pub fn q_table(&self, t: usize) -> Result<&Array2<f64>> {
        self.ensure_planned()?;
        match self.problem.horizon() {
            Horizon::Infinite => Ok(&self.q_tables[0]),
            Horizon::Finite(_) => {
                check_index("stage", t, self.q_tables.len())?;
                Ok(&self.q_tables[t])
            }
        }
    }

    pub fn get_q(&self, t: usize, s: Index, ja: Index) -> Result<f64> {
        let q = self.q_table(t)?;
        check_index("state", s, q.nrows())?;
        check_index("joint action", ja, q.ncols())?;
        Ok(q[[s, ja]])
    }

    pub fn value(&self, t: usize, s: Index) -> Result<f64> {
        let q = self.q_table(t)?;
        check_index("state", s, q.nrows())?;
        Ok(q.row(s).iter().cloned().fold(f64::NEG_INFINITY, f64::max))
    }

    /// First joint action with the highest Q-value.
    pub fn greedy_action(&self, t: usize, s: Index) -> Result<Index> {
        let q = self.q_table(t)?;
        check_index("state", s, q.nrows())?;
        Ok(argmax(q.row(s).iter().cloned()))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        self.ensure_planned()?;
        let tables = QTables {
            horizon: self.problem.horizon(),
            tables: self.q_tables.clone(),
        };
        let serialized = bincode::serialize(&tables)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Restores tables written by [`save`](Self::save) for a problem of the
    /// same shape and horizon.
    pub fn load(&mut self, path: &str) -> Result<()> {
        let data = std::fs::read(path)?;
        let tables: QTables = bincode::deserialize(&data)?;
        if tables.horizon != self.problem.horizon() {
            return Err(MadpError::dimension_mismatch(
                format!("horizon {}", self.problem.horizon()),
                format!("horizon {}", tables.horizon),
            ));
        }
        let model = self.problem.model();
        let shape = (model.nr_states(), model.nr_joint_actions());
        if let Some(table) = tables.tables.iter().find(|t| t.dim() != shape) {
            return Err(MadpError::dimension_mismatch(format!("{:?}", shape), format!("{:?}", table.dim())));
        }
        if self.state == PlannerState::Uninitialized {
            self.initialize()?;
        }
        self.q_tables = tables.tables;
        self.state = PlannerState::Planned;
        Ok(())
    }
}

pub(crate) fn argmax<I: Iterator<Item = f64>>(values: I) -> Index {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}

fn max_over_actions(q: &Array2<f64>) -> Array1<f64> {
    q.map_axis(Axis(1), |row| row.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
}

fn handle_row(t: TGet<'_>, rewards: &Array2<f64>, discount: f64, v: &Array1<f64>, s: Index, mut row: ArrayViewMut1<'_, f64>) {
    for (ja, q) in row.iter_mut().enumerate() {
        *q = rewards[[s, ja]] + discount * t.expectation(s, ja, v);
    }
}

fn generic_row(
    model: &dyn ProblemModel,
    rewards: &Array2<f64>,
    discount: f64,
    v: &Array1<f64>,
    s: Index,
    mut row: ArrayViewMut1<'_, f64>,
) {
    for (ja, q) in row.iter_mut().enumerate() {
        let mut future = 0.0;
        for (s_next, value) in v.iter().enumerate() {
            let p = model.get_transition_probability(s, ja, s_next);
            if p != 0.0 {
                future += p * value;
            }
        }
        *q = rewards[[s, ja]] + discount * future;
    }
}

#[cfg(feature = "parallel")]
fn sweep_with_handle(t: TGet<'_>, rewards: &Array2<f64>, discount: f64, v: &Array1<f64>, q: &mut Array2<f64>) {
    q.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(s, row)| handle_row(t, rewards, discount, v, s, row));
}

#[cfg(not(feature = "parallel"))]
fn sweep_with_handle(t: TGet<'_>, rewards: &Array2<f64>, discount: f64, v: &Array1<f64>, q: &mut Array2<f64>) {
    for (s, row) in q.axis_iter_mut(Axis(0)).enumerate() {
        handle_row(t, rewards, discount, v, s, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlanningProblem;
    use crate::tests::fixtures;

    #[test]
    fn test_chain_converges_to_known_values() {
        for sparse in [false, true] {
            let problem = fixtures::chain_mdp(sparse);
            let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
            let sweeps = vi.plan().unwrap();
            // max change below 1e-4 with γ = 0.9 leaves at most 9e-4 error,
            // reached after roughly 90 sweeps
            assert!(sweeps > 1 && sweeps < 150, "sweeps={}", sweeps);
            for (s, expected) in [8.1, 9.0, 10.0].iter().enumerate() {
                assert!((vi.value(0, s).unwrap() - expected).abs() < 1e-3, "s={}", s);
            }
            assert_eq!(vi.greedy_action(0, 0).unwrap(), 1);
        }
    }

    #[test]
    fn test_finite_horizon_backward_induction() {
        let mut problem = fixtures::chain_mdp(false);
        problem.set_horizon(Horizon::Finite(3));
        let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
        assert_eq!(vi.plan().unwrap(), 3);
        // Last stage: immediate reward only
        assert_eq!(vi.value(2, 2).unwrap(), 1.0);
        assert_eq!(vi.value(2, 1).unwrap(), 0.0);
        // Stage 0 from state 1: advance, then collect twice
        assert!((vi.value(0, 1).unwrap() - (0.9 + 0.81)).abs() < 1e-12);
        assert!(vi.q_table(3).is_err());
    }

    #[test]
    fn test_queries_before_planning() {
        let problem = fixtures::chain_mdp(false);
        let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
        assert!(vi.q_table(0).is_err());
        vi.initialize().unwrap();
        assert!(matches!(vi.get_q(0, 0, 0), Err(MadpError::NotInitialized(_))));
    }

    #[test]
    fn test_iteration_cap() {
        let problem = fixtures::chain_mdp(false);
        let config = PlannerConfig {
            max_iterations: 3,
            ..PlannerConfig::default()
        };
        let mut vi = MdpValueIteration::new(&problem, config);
        assert!(matches!(vi.plan(), Err(MadpError::NumericalError(_))));
    }

    #[test]
    fn test_generic_model_matches_materialised() {
        let toi = fixtures::toy_toi_problem();
        let joint = fixtures::toy_joint_problem(false);
        let mut a = MdpValueIteration::new(&toi, PlannerConfig::default());
        let mut b = MdpValueIteration::new(&joint, PlannerConfig::default());
        a.plan().unwrap();
        b.plan().unwrap();
        let diff = (a.q_table(0).unwrap() - b.q_table(0).unwrap()).mapv(f64::abs);
        assert!(diff.iter().all(|&d| d < 1e-9));
        assert!(toi.model().transition_handle().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let problem = fixtures::chain_mdp(true);
        let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
        vi.plan().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.bin");
        let path = path.to_str().unwrap();
        vi.save(path).unwrap();

        let mut restored = MdpValueIteration::new(&problem, PlannerConfig::default());
        restored.load(path).unwrap();
        assert_eq!(restored.q_table(0).unwrap(), vi.q_table(0).unwrap());

        let mut finite = fixtures::chain_mdp(true);
        finite.set_horizon(Horizon::Finite(2));
        let mut other = MdpValueIteration::new(&finite, PlannerConfig::default());
        assert!(other.load(path).is_err());
    }
}
