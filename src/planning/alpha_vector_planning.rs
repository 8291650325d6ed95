use ndarray::{Array1, Array2, Axis};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::belief::{Belief, BeliefSet, ModelAccess};
use crate::error::{MadpError, Result};
use crate::model::{OGet, PlanningProblem, ProblemModel, TGet};
use crate::planning::alpha_vector::{AlphaVector, ValueFunction};
use crate::planning::config::{BackProjection, PlannerConfig};
use crate::planning::prune;
use crate::planning::vector_set::{self, GaoVectorSet, VectorSet};
use crate::types::Index;

struct ModelCache<'a> {
    access: ModelAccess<'a>,
    rewards: Vec<Array1<f64>>,
    nr_states: usize,
    nr_joint_actions: usize,
    nr_joint_observations: usize,
}

/// Dynamic-programming operators on alpha-vector value functions of the
/// centralised POMDP over joint actions and joint observations.
pub struct AlphaVectorPlanning<'a, P: PlanningProblem + ?Sized> {
    problem: &'a P,
    config: PlannerConfig,
    cache: Option<ModelCache<'a>>,
    beliefs: Option<BeliefSet>,
}

impl<'a, P: PlanningProblem + ?Sized> AlphaVectorPlanning<'a, P> {
    pub fn new(problem: &'a P, config: PlannerConfig) -> Self {
        AlphaVectorPlanning {
            problem,
            config,
            cache: None,
            beliefs: None,
        }
    }

    pub fn problem(&self) -> &'a P {
        self.problem
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Beliefs used by point-based pruning.
    pub fn set_beliefs(&mut self, beliefs: BeliefSet) {
        self.beliefs = Some(beliefs);
    }

    pub fn beliefs(&self) -> Option<&BeliefSet> {
        self.beliefs.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.cache.is_some()
    }

    /// Caches model access and the reward vector of every joint action.
    pub fn initialize(&mut self) -> Result<()> {
        let problem: &'a P = self.problem;
        let model: &'a dyn ProblemModel = problem.model();
        let nr_joint_actions = model.nr_joint_actions();
        let rewards = (0..nr_joint_actions).map(|ja| problem.reward_vector(ja)).collect();
        let access = ModelAccess::for_model(model);
        log::debug!(
            "alpha-vector planning on {} states, {} joint actions, {} joint observations ({} access)",
            model.nr_states(),
            nr_joint_actions,
            model.nr_joint_observations(),
            if access.is_handles() { "handle" } else { "generic" }
        );
        self.cache = Some(ModelCache {
            access,
            rewards,
            nr_states: model.nr_states(),
            nr_joint_actions,
            nr_joint_observations: model.nr_joint_observations(),
        });
        Ok(())
    }

    fn cache(&self) -> Result<&ModelCache<'a>> {
        self.cache
            .as_ref()
            .ok_or_else(|| MadpError::not_initialized("alpha-vector planning (call initialize first)"))
    }

    pub fn reward_vector(&self, ja: Index) -> Result<&Array1<f64>> {
        let cache = self.cache()?;
        cache
            .rewards
            .get(ja)
            .ok_or_else(|| MadpError::index_out_of_bounds("joint action", ja, cache.nr_joint_actions))
    }

    /// `G_{a,o}` with rows `g_k(s) = Σ_s' T(s, a, s') · O(a, s', o) · α_k(s')`
    /// for every vector `α_k` of `vf`, undiscounted.
    pub fn back_project(&self, vf: &[AlphaVector]) -> Result<GaoVectorSet> {
        let cache = self.cache()?;
        let v = VectorSet::from_value_function(vf, cache.nr_states)?;
        let nr_jo = cache.nr_joint_observations;
        let sets = match cache.access {
            ModelAccess::Handles { transition, observation } => {
                let mode = self.config.back_projection;
                map_joint_actions(cache.nr_joint_actions, |ja| match mode {
                    BackProjection::Dense => project_dense(transition, observation, ja, &v, nr_jo),
                    BackProjection::Sparse => project_sparse(transition, observation, ja, &v, nr_jo),
                })
            }
            ModelAccess::Generic(model) => (0..cache.nr_joint_actions)
                .map(|ja| project_generic(model, ja, &v, nr_jo))
                .collect(),
        };
        Ok(GaoVectorSet::new(sets))
    }

    pub fn cross_sum(&self, a: &VectorSet, b: &VectorSet) -> Result<VectorSet> {
        vector_set::cross_sum(a, b)
    }

    /// Prunes at the configured strength.
    pub fn prune(&self, set: &VectorSet) -> Result<VectorSet> {
        prune::pruned(set, self.config.prune, self.beliefs.as_ref())
    }

    /// `R_a + γ ⊕_o G_{a,o}`, pruning after every cross-sum. Branches record
    /// which vector of the projected value function each observation uses.
    pub fn monahan_cross_sum(&self, gao: &GaoVectorSet, ja: Index) -> Result<ValueFunction> {
        let reward = self.reward_vector(ja)?;
        let strength = self.config.prune;
        let beliefs = self.beliefs.as_ref();
        let projected = gao.for_action(ja);

        let mut current: Option<(VectorSet, Vec<Vec<Index>>)> = None;
        for g in projected {
            let kept = prune::prune(g, strength, beliefs)?;
            let g = g.select(&kept);
            current = Some(match current {
                None => (g, kept.iter().map(|&k| vec![k]).collect()),
                Some((set, branches)) => {
                    let sum = vector_set::cross_sum(&set, &g)?;
                    let survivors = prune::prune(&sum, strength, beliefs)?;
                    let nb = g.nr_vectors();
                    let new_branches = survivors
                        .iter()
                        .map(|&row| {
                            let mut branch = branches[row / nb].clone();
                            branch.push(kept[row % nb]);
                            branch
                        })
                        .collect();
                    (sum.select(&survivors), new_branches)
                }
            });
        }

        let (mut set, branches) = current.unwrap_or_else(|| (VectorSet::zeros(0, reward.len()), Vec::new()));
        set.scale(self.problem.discount());
        set.add_vector(reward);
        Ok(set
            .rows()
            .axis_iter(Axis(0))
            .zip(branches)
            .map(|(row, branch)| AlphaVector::with_branches(row.to_owned(), ja, branch))
            .collect())
    }

    /// Exact dynamic-programming backup: the union over joint actions of
    /// [`monahan_cross_sum`](Self::monahan_cross_sum), pruned.
    pub fn backup_monahan(&self, vf: &[AlphaVector]) -> Result<ValueFunction> {
        let gao = self.back_project(vf)?;
        let nr_ja = self.cache()?.nr_joint_actions;
        let mut union = ValueFunction::new();
        for ja in 0..nr_ja {
            union.extend(self.monahan_cross_sum(&gao, ja)?);
        }
        let set = VectorSet::from_value_function(&union, self.cache()?.nr_states)?;
        let kept = prune::prune(&set, self.config.prune, self.beliefs.as_ref())?;
        log::debug!("exact backup: {} candidates, {} kept", union.len(), kept.len());
        let mut union: Vec<Option<AlphaVector>> = union.into_iter().map(Some).collect();
        Ok(kept.into_iter().filter_map(|i| union[i].take()).collect())
    }

    /// Point-based backup: the best vector at `belief` among
    /// `R_a + γ Σ_o argmax_{g ∈ G_{a,o}} g · b` over joint actions.
    pub fn backup_at_belief(&self, belief: &Belief, gao: &GaoVectorSet) -> Result<AlphaVector> {
        let cache = self.cache()?;
        let b = belief.values();
        if b.len() != cache.nr_states {
            return Err(MadpError::dimension_mismatch(
                format!("belief over {} states", cache.nr_states),
                format!("belief over {} states", b.len()),
            ));
        }
        let discount = self.problem.discount();
        let mut best: Option<(f64, AlphaVector)> = None;
        for ja in 0..gao.nr_joint_actions() {
            let mut values = cache.rewards[ja].clone();
            let mut branches = Vec::with_capacity(gao.nr_joint_observations());
            for g in gao.for_action(ja) {
                let (k, _) = g.best_at(b).ok_or_else(|| {
                    MadpError::invalid_parameter("value function", "cannot back up an empty value function")
                })?;
                values.scaled_add(discount, &g.row(k));
                branches.push(k);
            }
            let value = values.dot(b);
            if best.as_ref().map_or(true, |(v, _)| value > *v) {
                best = Some((value, AlphaVector::with_branches(values, ja, branches)));
            }
        }
        best.map(|(_, alpha)| alpha)
            .ok_or_else(|| MadpError::invalid_parameter("problem", "no joint actions"))
    }
}

#[cfg(feature = "parallel")]
fn map_joint_actions<T, F>(nr_joint_actions: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(Index) -> T + Sync + Send,
{
    (0..nr_joint_actions).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn map_joint_actions<T, F>(nr_joint_actions: usize, f: F) -> Vec<T>
where
    F: Fn(Index) -> T,
{
    (0..nr_joint_actions).map(f).collect()
}

fn project_dense(t: TGet<'_>, o: OGet<'_>, ja: Index, v: &VectorSet, nr_jo: usize) -> Vec<VectorSet> {
    let nr_states = v.size();
    (0..nr_jo)
        .map(|jo| {
            let m = Array2::from_shape_fn((nr_states, nr_states), |(s, s_next)| {
                t.get(s, ja, s_next) * o.get(ja, s_next, jo)
            });
            VectorSet::new(v.rows().dot(&m.t()))
        })
        .collect()
}

fn project_sparse(t: TGet<'_>, o: OGet<'_>, ja: Index, v: &VectorSet, nr_jo: usize) -> Vec<VectorSet> {
    let nr_states = v.size();
    let mut sets: Vec<Array2<f64>> = (0..nr_jo).map(|_| Array2::zeros((v.nr_vectors(), nr_states))).collect();
    for s in 0..nr_states {
        for (s_next, p_t) in t.nonzero_row(s, ja) {
            let column = v.rows().column(s_next);
            for (jo, p_o) in o.nonzero_row(ja, s_next) {
                let mut target = sets[jo].column_mut(s);
                target.scaled_add(p_t * p_o, &column);
            }
        }
    }
    sets.into_iter().map(VectorSet::new).collect()
}

fn project_generic(model: &dyn ProblemModel, ja: Index, v: &VectorSet, nr_jo: usize) -> Vec<VectorSet> {
    let nr_states = v.size();
    let mut sets: Vec<Array2<f64>> = (0..nr_jo).map(|_| Array2::zeros((v.nr_vectors(), nr_states))).collect();
    for s in 0..nr_states {
        for s_next in 0..nr_states {
            let p_t = model.get_transition_probability(s, ja, s_next);
            if p_t == 0.0 {
                continue;
            }
            let column = v.rows().column(s_next);
            for (jo, set) in sets.iter_mut().enumerate() {
                let p_o = model.get_observation_probability(ja, s_next, jo);
                if p_o != 0.0 {
                    set.column_mut(s).scaled_add(p_t * p_o, &column);
                }
            }
        }
    }
    sets.into_iter().map(VectorSet::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefInterface;
    use crate::planning::alpha_vector;
    use crate::planning::config::PruneStrength;
    use crate::tests::fixtures;
    use crate::types::ValidationMode;
    use ndarray::array;

    fn config(back_projection: BackProjection) -> PlannerConfig {
        PlannerConfig {
            back_projection,
            ..PlannerConfig::default()
        }
    }

    fn test_vf() -> ValueFunction {
        vec![
            AlphaVector::new(array![1.0, -2.0], 0),
            AlphaVector::new(array![0.5, 3.0], 1),
            AlphaVector::new(array![-1.0, 0.25], 0),
        ]
    }

    fn assert_close(a: &GaoVectorSet, b: &GaoVectorSet, tolerance: f64) {
        assert_eq!(a.nr_joint_actions(), b.nr_joint_actions());
        for ja in 0..a.nr_joint_actions() {
            for jo in 0..a.nr_joint_observations() {
                let diff = (a.get(ja, jo).rows() - b.get(ja, jo).rows()).mapv(f64::abs);
                assert!(diff.iter().all(|&d| d <= tolerance), "ja={} jo={}", ja, jo);
            }
        }
    }

    #[test]
    fn test_requires_initialize() {
        let problem = fixtures::toy_problem(false, 0.9);
        let planner = AlphaVectorPlanning::new(&problem, PlannerConfig::default());
        assert!(matches!(planner.back_project(&test_vf()), Err(MadpError::NotInitialized(_))));
    }

    #[test]
    fn test_back_projection_by_hand() {
        let problem = fixtures::toy_problem(false, 0.9);
        let mut planner = AlphaVectorPlanning::new(&problem, config(BackProjection::Dense));
        planner.initialize().unwrap();
        let gao = planner.back_project(&test_vf()).unwrap();
        // s=0, a0, o0: 0.9 * 0.7 * 1 + 0.1 * 0.4 * (-2)
        assert!((gao.get(0, 0).row(0)[0] - (0.63 - 0.08)).abs() < 1e-12);
        assert_eq!(gao.get(1, 1).nr_vectors(), 3);
    }

    #[test]
    fn test_dense_and_sparse_paths_agree() {
        for sparse_model in [false, true] {
            let problem = fixtures::toy_problem(sparse_model, 0.9);
            let mut dense = AlphaVectorPlanning::new(&problem, config(BackProjection::Dense));
            let mut sparse = AlphaVectorPlanning::new(&problem, config(BackProjection::Sparse));
            dense.initialize().unwrap();
            sparse.initialize().unwrap();
            let a = dense.back_project(&test_vf()).unwrap();
            let b = sparse.back_project(&test_vf()).unwrap();
            assert_close(&a, &b, 1e-12);
        }
    }

    #[test]
    fn test_generic_path_matches_materialised_model() {
        let toi = fixtures::toy_toi_problem();
        let joint = fixtures::toy_joint_problem(true);
        let vf = vec![
            AlphaVector::new(array![1.0, 0.0, -1.0, 2.0], 0),
            AlphaVector::new(array![0.0, 3.0, 0.5, -0.5], 2),
        ];
        let mut generic = AlphaVectorPlanning::new(&toi, PlannerConfig::default());
        let mut handles = AlphaVectorPlanning::new(&joint, PlannerConfig::default());
        generic.initialize().unwrap();
        handles.initialize().unwrap();
        assert_close(&generic.back_project(&vf).unwrap(), &handles.back_project(&vf).unwrap(), 1e-12);

        let one_step = generic.backup_monahan(&vf).unwrap();
        let reference = handles.backup_monahan(&vf).unwrap();
        let b = Belief::from_vec(vec![0.1, 0.2, 0.3, 0.4], ValidationMode::Strict).unwrap();
        assert!((alpha_vector::value_at(&one_step, &b) - alpha_vector::value_at(&reference, &b)).abs() < 1e-9);
    }

    #[test]
    fn test_monahan_branches_reproduce_vectors() {
        let problem = fixtures::toy_problem(false, 0.9);
        let mut planner = AlphaVectorPlanning::new(&problem, PlannerConfig::default());
        planner.initialize().unwrap();
        let vf = test_vf();
        let gao = planner.back_project(&vf).unwrap();
        for ja in 0..2 {
            for alpha in planner.monahan_cross_sum(&gao, ja).unwrap() {
                assert_eq!(alpha.action, ja);
                assert_eq!(alpha.branches.len(), 2);
                let mut expected = planner.reward_vector(ja).unwrap().clone();
                for (jo, &k) in alpha.branches.iter().enumerate() {
                    expected.scaled_add(0.9, &gao.get(ja, jo).row(k));
                }
                assert!((&expected - &alpha.values).iter().all(|d| d.abs() < 1e-12));
            }
        }
    }

    #[test]
    fn test_exact_backup_dominates_point_backups() {
        let problem = fixtures::toy_problem(false, 0.9);
        let mut planner = AlphaVectorPlanning::new(&problem, PlannerConfig::default());
        planner.initialize().unwrap();
        let vf = test_vf();
        let exact = planner.backup_monahan(&vf).unwrap();
        let gao = planner.back_project(&vf).unwrap();
        for p in [0.0, 0.2, 0.5, 0.9, 1.0] {
            let b = Belief::from_vec(vec![p, 1.0 - p], ValidationMode::Strict).unwrap();
            let point = planner.backup_at_belief(&b, &gao).unwrap();
            let exact_value = alpha_vector::value_at(&exact, &b);
            assert!((exact_value - point.value_at(&b)).abs() < 1e-9, "b = {:?}", b.to_vec());
        }
    }

    #[test]
    fn test_point_based_prune_uses_beliefs() {
        let problem = fixtures::toy_problem(false, 0.9);
        let mut planner = AlphaVectorPlanning::new(
            &problem,
            PlannerConfig {
                prune: PruneStrength::PointBased,
                ..PlannerConfig::default()
            },
        );
        planner.initialize().unwrap();
        let set = VectorSet::new(array![[1.0, 0.0], [0.6, 0.6], [0.0, 1.0]]);
        assert!(planner.prune(&set).is_err());
        planner.set_beliefs(BeliefSet::new(vec![Belief::uniform(2)]));
        assert_eq!(planner.prune(&set).unwrap().nr_vectors(), 1);
    }

    #[test]
    fn test_backup_at_belief_rejects_empty_value_function() {
        let problem = fixtures::toy_problem(false, 0.9);
        let mut planner = AlphaVectorPlanning::new(&problem, PlannerConfig::default());
        planner.initialize().unwrap();
        let gao = planner.back_project(&[]).unwrap();
        assert!(planner.backup_at_belief(&Belief::uniform(2), &gao).is_err());
        assert!(planner.backup_at_belief(&Belief::uniform(3), &gao).is_err());
    }
}
