use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::belief::{Belief, BeliefInterface, BeliefSparse, ModelAccess};
use crate::builders::DecPomdpBuilder;
use crate::model::{PlanningProblem, ProblemModel, ProbabilityMatrix};
use crate::planning::{
    value_at, AlphaVector, AlphaVectorPlanning, MdpValueIteration, PlannerConfig, PruneStrength,
};
use crate::tests::fixtures;
use crate::types::{Horizon, ValidationMode, PROB_PRECISION};

#[test]
fn test_single_state_problem() {
    let problem = DecPomdpBuilder::new("single")
        .nr_states(1)
        .agent(&["a", "b"], &["o"])
        .transition_fn(|_, _, _| 1.0)
        .observation_fn(|_, _, _| 1.0)
        .reward_fn(|_, a| if a[0] == 1 { 2.0 } else { 1.0 })
        .discount(0.5)
        .build()
        .unwrap();

    let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
    vi.plan().unwrap();
    assert!((vi.value(0, 0).unwrap() - 4.0).abs() < 1e-3);

    let mut planning = AlphaVectorPlanning::new(&problem, PlannerConfig::default());
    planning.initialize().unwrap();
    let vf = planning
        .backup_monahan(&[AlphaVector::new(array![0.0], 0)])
        .unwrap();
    assert_eq!(vf.len(), 1);
    assert_eq!(vf[0].action, 1);
    assert_eq!(vf[0].values[0], 2.0);
}

#[test]
fn test_zero_discount_backup_is_the_reward() {
    let problem = fixtures::toy_problem(false, 0.0);
    let mut planning = AlphaVectorPlanning::new(&problem, PlannerConfig::default());
    planning.initialize().unwrap();
    let vf = planning
        .backup_monahan(&[AlphaVector::new(array![5.0, -5.0], 0), AlphaVector::new(array![-5.0, 5.0], 1)])
        .unwrap();
    // One vector per action survives, equal to the reward vectors
    assert_eq!(vf.len(), 2);
    for alpha in &vf {
        assert_eq!(&alpha.values, planning.reward_vector(alpha.action).unwrap());
    }
}

#[test]
fn test_sparse_storage_never_keeps_tiny_probabilities() {
    let mut m = ProbabilityMatrix::zeros(2, 2, true);
    m.set(0, 0, PROB_PRECISION / 2.0);
    m.set(0, 1, 1.0);
    assert_eq!(m.nonzero_row(0).count(), 1);
    assert_eq!(m.get(0, 0), 0.0);
}

#[test]
fn test_impossible_observation_for_both_belief_types() {
    let model = fixtures::deterministic_model();
    let access = ModelAccess::for_model(&model);
    let mut dense = Belief::initial(&model).unwrap();
    let mut sparse = BeliefSparse::from_vec(vec![1.0, 0.0], ValidationMode::Strict).unwrap();
    // Observation 1 is impossible from state 0
    assert_eq!(dense.update(access, 0, 1), 0.0);
    assert_eq!(sparse.update(access, 0, 1), 0.0);
    assert_eq!(sparse.update(access, 0, 0), 0.0);
}

#[test]
fn test_toi_product_matches_joint_model() {
    let toi = fixtures::toy_toi_problem();
    let joint = fixtures::toy_joint_problem(false);
    let (a, b) = (toi.model(), joint.model());
    assert_eq!(a.nr_states(), b.nr_states());
    assert_eq!(a.nr_joint_actions(), b.nr_joint_actions());
    assert_eq!(a.nr_joint_observations(), b.nr_joint_observations());
    for ja in 0..a.nr_joint_actions() {
        for s in 0..a.nr_states() {
            assert_eq!(toi.get_reward(s, ja), joint.get_reward(s, ja));
            for s_next in 0..a.nr_states() {
                let diff = a.get_transition_probability(s, ja, s_next) - b.get_transition_probability(s, ja, s_next);
                assert!(diff.abs() < 1e-15);
            }
        }
        for s_next in 0..a.nr_states() {
            for jo in 0..a.nr_joint_observations() {
                let diff = a.get_observation_probability(ja, s_next, jo) - b.get_observation_probability(ja, s_next, jo);
                assert!(diff.abs() < 1e-15);
            }
        }
    }

    let mut x = Belief::initial(a).unwrap();
    let mut y = Belief::initial(b).unwrap();
    let px = x.update(ModelAccess::for_model(a), 3, 2);
    let py = y.update(ModelAccess::for_model(b), 3, 2);
    assert!((px - py).abs() < 1e-12);
    for s in 0..4 {
        assert!((x.get(s) - y.get(s)).abs() < 1e-12);
    }
}

#[test]
fn test_finite_horizon_exact_backups_match_value_iteration_on_certain_model() {
    // With a known state the POMDP values at corner beliefs equal the MDP values.
    let mut problem = DecPomdpBuilder::new("certain")
        .nr_states(2)
        .agent(&["stay", "switch"], &["o0", "o1"])
        .transition_fn(|s, a, s_next| {
            let target = if a[0] == 0 { s } else { 1 - s };
            if s_next == target { 1.0 } else { 0.0 }
        })
        .observation_fn(|_, s_next, o| if o[0] == s_next { 1.0 } else { 0.0 })
        .reward_fn(|s, a| if s == 1 && a[0] == 0 { 1.0 } else { 0.0 })
        .build()
        .unwrap();
    problem.set_horizon(Horizon::Finite(3));

    let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
    vi.plan().unwrap();

    let config = PlannerConfig {
        prune: PruneStrength::Exact,
        ..PlannerConfig::default()
    };
    let mut planning = AlphaVectorPlanning::new(&problem, config);
    planning.initialize().unwrap();
    let mut vf = vec![AlphaVector::new(array![0.0, 0.0], 0)];
    for _ in 0..3 {
        vf = planning.backup_monahan(&vf).unwrap();
    }
    for s in 0..2 {
        let mut corner = vec![0.0; 2];
        corner[s] = 1.0;
        let b = Belief::from_vec(corner, ValidationMode::Strict).unwrap();
        assert!((value_at(&vf, &b) - vi.value(0, s).unwrap()).abs() < 1e-9);
    }
}

#[test]
fn test_sampling_respects_initial_distribution() {
    let model = fixtures::deterministic_model();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        assert_eq!(model.sample_initial_state(&mut rng).unwrap(), 0);
    }
}
