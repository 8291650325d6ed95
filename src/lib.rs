//! # madp - Planning for Discrete Multi-Agent Decision Processes
//!
//! madp models decentralized partially observable Markov decision processes
//! (Dec-POMDPs) and partially observable stochastic games (POSGs) over
//! finite state, action and observation sets, and plans on them with
//! alpha-vector dynamic programming.
//!
//! ## Key Features
//!
//! - **Joint indices**: mixed-radix conversion between per-agent and joint
//!   actions, observations and states, with overflow detection
//! - **Probability tables**: dense or sparse transition and observation
//!   tables with borrowed fast-access handles for hot loops
//! - **Models**: explicit joint models, transition-observation-independent
//!   models that compute joint probabilities on demand, reward models
//! - **Beliefs**: dense and sparse Bayes filters over the joint state
//! - **Planning**: back-projection, cross-sums, exact and point-based
//!   pruning, MDP value iteration, Perseus and Bayesian-game brute force
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use madp::builders::DecPomdpBuilder;
//! use madp::planning::{MdpValueIteration, PlannerConfig};
//!
//! let problem = DecPomdpBuilder::new("chain")
//!     .nr_states(3)
//!     .agent(&["stay", "advance"], &["none"])
//!     .transition_fn(|s, a, s_next| {
//!         let target = if a[0] == 1 { (s + 1).min(2) } else { s };
//!         if s_next == target { 1.0 } else { 0.0 }
//!     })
//!     .observation_fn(|_, _, _| 1.0)
//!     .reward_fn(|s, _| if s == 2 { 1.0 } else { 0.0 })
//!     .discount(0.9)
//!     .build()?;
//!
//! let mut vi = MdpValueIteration::new(&problem, PlannerConfig::default());
//! vi.plan()?;
//! println!("V(s0) = {}", vi.value(0, 0)?);
//! # Ok::<(), madp::error::MadpError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`index_tools`] - Mixed-radix joint index arithmetic
//! - [`model`] - Discrete sets, probability tables, decision processes, rewards
//! - [`belief`] - Beliefs and their Bayes update
//! - [`planning`] - Alpha-vector planning, value iteration, Perseus, Bayesian games
//! - [`builders`] - Builder patterns for models and planner settings
//! - [`metrics`] - Timing of planner phases
//! - [`error`] - Error types and result handling
//! - [`types`] - Index type, tolerances, horizon

pub mod belief;
pub mod builders;
pub mod error;
pub mod index_tools;
pub mod metrics;
pub mod model;
pub mod planning;
pub mod types;

#[cfg(test)]
mod tests;
