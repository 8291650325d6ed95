//! Value iteration and exact backups on a three-state chain
//!
//! A single agent advances along a chain whose last state pays 1 per step.
//! Infinite-horizon value iteration gives the optimal values `[8.1, 9, 10]`;
//! a few exact alpha-vector backups on the finite-horizon version show the
//! value function converging at the corners of the belief simplex.

use madp::belief::Belief;
use madp::builders::{DecPomdpBuilder, PlannerConfigBuilder};
use madp::model::{PlanningProblem, ProblemModel};
use madp::planning::{
    export_value_function, value_at, AlphaVector, AlphaVectorPlanning, MdpValueIteration, PlannerConfig,
    PruneStrength,
};
use madp::types::{Horizon, ValidationMode};
use ndarray::Array1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Chain MDP");
    println!("=========\n");

    let mut problem = DecPomdpBuilder::new("chain")
        .states(&["start", "middle", "goal"])
        .agent(&["stay", "advance"], &["none"])
        .transition_fn(|s, a, s_next| {
            let target = if a[0] == 1 { (s + 1).min(2) } else { s };
            if s_next == target { 1.0 } else { 0.0 }
        })
        .observation_fn(|_, _, _| 1.0)
        .reward_fn(|s, _| if s == 2 { 1.0 } else { 0.0 })
        .discount(0.9)
        .build()?;

    let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
    let sweeps = vi.plan()?;
    println!("Infinite horizon: converged after {} sweeps", sweeps);
    for s in 0..problem.model().nr_states() {
        println!(
            "  V({}) = {:.4}, greedy action {}",
            problem.process().state(s)?,
            vi.value(0, s)?,
            vi.greedy_action(0, s)?
        );
    }

    let horizon = 4;
    problem.set_horizon(Horizon::Finite(horizon));
    let mut finite = MdpValueIteration::new(&problem, PlannerConfig::default());
    finite.plan()?;
    println!("\nHorizon {}: stage values", horizon);
    for t in 0..horizon {
        let values: Vec<String> = (0..3)
            .map(|s| finite.value(t, s).map(|v| format!("{:.3}", v)))
            .collect::<Result<_, _>>()?;
        println!("  t = {}: [{}]", t, values.join(", "));
    }

    let config = PlannerConfigBuilder::new().prune(PruneStrength::Exact).build()?;
    let mut planning = AlphaVectorPlanning::new(&problem, config);
    planning.initialize()?;
    let mut vf = vec![AlphaVector::new(Array1::zeros(3), 0)];
    for _ in 0..horizon {
        vf = planning.backup_monahan(&vf)?;
    }
    println!("\nExact backups: {} vectors after {} stages", vf.len(), horizon);
    for s in 0..3 {
        let mut corner = vec![0.0; 3];
        corner[s] = 1.0;
        let b = Belief::from_vec(corner, ValidationMode::Strict)?;
        println!("  V(e{}) = {:.4}", s, value_at(&vf, &b));
    }

    println!("\nValue function:");
    export_value_function(&vf, std::io::stdout().lock())?;

    Ok(())
}
