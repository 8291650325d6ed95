use madp::belief::{Belief, BeliefInterface, BeliefSet, ModelAccess};
use madp::builders::DecPomdpBuilder;
use madp::index_tools;
use madp::model::{DecPomdp, PlanningProblem, ProbabilityMatrix};
use madp::planning::prune::{prune_exact, prune_point_based};
use madp::planning::{AlphaVector, AlphaVectorPlanning, BackProjection, PlannerConfig, VectorSet};
use madp::types::{ValidationMode, PROB_PRECISION};
use ndarray::{Array1, Array2};
use proptest::prelude::*;

const MAX_STATES: usize = 4;

fn weight() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.05f64..1.0]
}

fn normalise(weights: &[f64], fallback: usize) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter().map(|w| w / total).collect()
    } else {
        (0..weights.len()).map(|i| if i == fallback { 1.0 } else { 0.0 }).collect()
    }
}

/// One agent with two actions and two observations over `n` states.
fn random_problem(n: usize, t: &[f64], o: &[f64], r: &[f64], sparse: bool) -> DecPomdp {
    let mut transitions = vec![0.0; n * 2 * n];
    for s in 0..n {
        for a in 0..2 {
            let start = (s * 2 + a) * MAX_STATES;
            let row = normalise(&t[start..start + n], s);
            transitions[(s * 2 + a) * n..(s * 2 + a + 1) * n].copy_from_slice(&row);
        }
    }
    let mut observations = vec![0.0; 2 * n * 2];
    for a in 0..2 {
        for s_next in 0..n {
            let start = (a * MAX_STATES + s_next) * 2;
            let row = normalise(&o[start..start + 2], 0);
            observations[(a * n + s_next) * 2..(a * n + s_next + 1) * 2].copy_from_slice(&row);
        }
    }
    let rewards = r.to_vec();

    DecPomdpBuilder::new("random")
        .sparse(sparse)
        .nr_states(n)
        .agent(&["a0", "a1"], &["o0", "o1"])
        .transition_fn(move |s, a, s_next| transitions[(s * 2 + a[0]) * n + s_next])
        .observation_fn(move |a, s_next, o| observations[(a[0] * n + s_next) * 2 + o[0]])
        .reward_fn(move |s, a| rewards[s * 2 + a[0]])
        .discount(0.9)
        .build()
        .unwrap()
}

fn vector_set(values: &[f64], nr_vectors: usize, size: usize) -> VectorSet {
    VectorSet::new(Array2::from_shape_vec((nr_vectors, size), values[..nr_vectors * size].to_vec()).unwrap())
}

fn upper_surface(set: &VectorSet, belief: &Array1<f64>) -> f64 {
    set.best_at(belief).map(|(_, v)| v).unwrap_or(f64::NEG_INFINITY)
}

proptest! {
    #[test]
    fn test_joint_index_round_trip(
        cardinalities in prop::collection::vec(1usize..5, 1..5),
        seed in 0usize..10_000,
    ) {
        let total = index_tools::joint_cardinality(&cardinalities).unwrap();
        let joint = seed % total;
        let individual = index_tools::joint_to_individual(joint, &cardinalities).unwrap();
        prop_assert_eq!(individual.len(), cardinalities.len());
        for (i, c) in individual.iter().zip(&cardinalities) {
            prop_assert!(i < c);
        }
        prop_assert_eq!(index_tools::individual_to_joint(&individual, &cardinalities).unwrap(), joint);
    }

    #[test]
    fn test_belief_update_is_normalised(
        n in 2usize..=MAX_STATES,
        t in prop::collection::vec(weight(), MAX_STATES * 2 * MAX_STATES),
        o in prop::collection::vec(weight(), 2 * MAX_STATES * 2),
        ja in 0usize..2,
        jo in 0usize..2,
        sparse in any::<bool>(),
    ) {
        let problem = random_problem(n, &t, &o, &[0.0; MAX_STATES * 2], sparse);
        let model = problem.model();
        let mut b = Belief::initial(model).unwrap();
        let p = b.update(ModelAccess::for_model(model), ja, jo);
        if p > PROB_PRECISION {
            let total: f64 = (0..n).map(|s| b.get(s)).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            prop_assert!((0..n).all(|s| b.get(s) >= 0.0));
            prop_assert!(p <= 1.0 + 1e-9);
        } else {
            prop_assert_eq!(p, 0.0);
        }
    }

    #[test]
    fn test_exact_prune_preserves_the_upper_surface(
        size in 2usize..4,
        nr_vectors in 1usize..7,
        values in prop::collection::vec(-10.0f64..10.0, 18),
        beliefs in prop::collection::vec(prop::collection::vec(0.01f64..1.0, 3), 10),
    ) {
        let set = vector_set(&values, nr_vectors, size);
        let kept = prune_exact(&set).unwrap();
        prop_assert!(!kept.is_empty());
        prop_assert!(kept.windows(2).all(|w| w[0] < w[1]));

        let reduced = set.select(&kept);
        for weights in &beliefs {
            let total: f64 = weights[..size].iter().sum();
            let b = Array1::from_iter(weights[..size].iter().map(|w| w / total));
            prop_assert!((upper_surface(&set, &b) - upper_surface(&reduced, &b)).abs() < 1e-7);
        }

        let again = prune_exact(&reduced).unwrap();
        prop_assert_eq!(again.len(), kept.len());
    }

    #[test]
    fn test_point_based_prune_keeps_belief_values(
        values in prop::collection::vec(-10.0f64..10.0, 15),
        weights in prop::collection::vec(prop::collection::vec(0.01f64..1.0, 3), 1..8),
    ) {
        let set = vector_set(&values, 5, 3);
        let beliefs = BeliefSet::new(
            weights
                .iter()
                .map(|w| {
                    let total: f64 = w.iter().sum();
                    Belief::from_vec(w.iter().map(|x| x / total).collect(), ValidationMode::Strict).unwrap()
                })
                .collect(),
        );
        let kept = prune_point_based(&set, &beliefs).unwrap();
        prop_assert!(kept.len() <= beliefs.len());
        let reduced = set.select(&kept);
        for b in &beliefs {
            let v = b.values();
            prop_assert!((upper_surface(&set, v) - upper_surface(&reduced, v)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dense_and_sparse_back_projection_agree(
        n in 2usize..=MAX_STATES,
        t in prop::collection::vec(weight(), MAX_STATES * 2 * MAX_STATES),
        o in prop::collection::vec(weight(), 2 * MAX_STATES * 2),
        alphas in prop::collection::vec(-5.0f64..5.0, 3 * MAX_STATES),
        sparse_tables in any::<bool>(),
    ) {
        let problem = random_problem(n, &t, &o, &[1.0; MAX_STATES * 2], sparse_tables);
        let vf: Vec<AlphaVector> = (0..3)
            .map(|k| AlphaVector::new(Array1::from(alphas[k * MAX_STATES..k * MAX_STATES + n].to_vec()), 0))
            .collect();

        let project = |mode: BackProjection| {
            let config = PlannerConfig { back_projection: mode, ..PlannerConfig::default() };
            let mut planning = AlphaVectorPlanning::new(&problem, config);
            planning.initialize().unwrap();
            planning.back_project(&vf).unwrap()
        };
        let dense = project(BackProjection::Dense);
        let sparse = project(BackProjection::Sparse);
        for ja in 0..2 {
            for jo in 0..2 {
                let (x, y) = (dense.get(ja, jo).rows(), sparse.get(ja, jo).rows());
                prop_assert_eq!(x.dim(), y.dim());
                for (a, b) in x.iter().zip(y.iter()) {
                    prop_assert!((a - b).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_sparse_tables_never_store_negligible_values(
        writes in prop::collection::vec((0usize..3, 0usize..3, prop_oneof![0.0f64..1e-12, 0.0f64..1.0]), 1..40),
    ) {
        let mut m = ProbabilityMatrix::zeros(3, 3, true);
        let mut expected = [[0.0f64; 3]; 3];
        for &(row, col, p) in &writes {
            m.set(row, col, p);
            expected[row][col] = if p > PROB_PRECISION { p } else { 0.0 };
        }
        for row in 0..3 {
            for (_, p) in m.nonzero_row(row) {
                prop_assert!(p > PROB_PRECISION);
            }
            for col in 0..3 {
                prop_assert_eq!(m.get(row, col), expected[row][col]);
            }
        }
    }
}
