//! Dec-Tiger with Perseus and a one-stage Bayesian game
//!
//! Two agents face two doors, one hiding a tiger. Listening gives noisy
//! evidence; opening the treasure door together pays off. This example plans
//! a centralised value function with Perseus, then solves the coordination
//! problem of the second stage after both agents listened.

use madp::belief::Belief;
use madp::builders::{DecPomdpBuilder, PlannerConfigBuilder};
use madp::model::{PlanningProblem, ProblemModel};
use madp::planning::{BayesianGameIdenticalPayoff, BruteForceSolver, MdpValueIteration, Perseus, PlannerConfig, Qmdp};
use madp::types::Index;

fn reward(s: Index, a: &[Index]) -> f64 {
    let listening = a.iter().filter(|&&ai| ai == 0).count();
    let opened_tiger = a.iter().filter(|&&ai| ai != 0 && ai - 1 == s).count();
    match (listening, opened_tiger) {
        (2, _) => -2.0,
        (1, 1) => -101.0,
        (1, _) => 9.0,
        (0, 0) => 20.0,
        (0, 2) => -50.0,
        _ => -100.0,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Dec-Tiger");
    println!("=========\n");

    let problem = DecPomdpBuilder::new("dectiger")
        .description("two agents, two doors, one tiger")
        .states(&["tiger-left", "tiger-right"])
        .agent(&["listen", "open-left", "open-right"], &["hear-left", "hear-right"])
        .agent(&["listen", "open-left", "open-right"], &["hear-left", "hear-right"])
        .transition_fn(|s, a, s_next| {
            if a == [0, 0] {
                if s == s_next { 1.0 } else { 0.0 }
            } else {
                0.5
            }
        })
        .observation_fn(|a, s_next, o| {
            if a == [0, 0] {
                o.iter().map(|&oi| if oi == s_next { 0.85 } else { 0.15 }).product::<f64>()
            } else {
                0.25
            }
        })
        .reward_fn(reward)
        .discount(0.9)
        .build()?;
    let model = problem.model();
    let process = problem.process();
    println!(
        "{} states, {} joint actions, {} joint observations\n",
        model.nr_states(),
        model.nr_joint_actions(),
        model.nr_joint_observations()
    );

    // Centralised lower bound
    let config = PlannerConfigBuilder::new().beliefs(200, 12).seed(3).build()?;
    let mut perseus = Perseus::new(&problem, config);
    let stages = perseus.plan()?;
    let b0 = Belief::initial(model)?;
    println!("Perseus: {} stages, {} vectors", stages, perseus.value_function().len());
    println!("  V(b0) = {:.4}", perseus.value_at(&b0));
    println!("  timing:\n{}\n", perseus.timing().to_json()?);

    // Fully observable upper bound
    let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
    let sweeps = vi.plan()?;
    let qmdp = Qmdp::from_value_iteration(&vi)?;
    println!("Value iteration: {} sweeps", sweeps);
    for s in 0..model.nr_states() {
        println!("  V({}) = {:.4}", process.state(s)?, vi.value(0, s)?);
    }

    // Second stage after both listened
    let listen = model.joint_action_index(&[0, 0])?;
    let bg = BayesianGameIdenticalPayoff::for_stage(&problem, &b0, listen, &qmdp)?;
    let mut solver = BruteForceSolver::new();
    let (policy, value) = solver.solve(&bg)?;
    println!("\nStage game: {} joint policies evaluated, value {:.4}", solver.nr_evaluated(), value);
    for agent in 0..bg.nr_agents() {
        for o in 0..bg.nr_types()[agent] {
            let a = policy.action(agent, o);
            println!(
                "  agent {} hears {:<10} -> {}",
                agent,
                process.observation(agent, o)?.name(),
                process.action(agent, a)?.name()
            );
        }
    }

    Ok(())
}
