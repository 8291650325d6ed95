//! # Planning Module
//!
//! Dynamic programming over the centralised model: alpha-vector value
//! functions and their backups, MDP value iteration, Perseus and one-shot
//! Bayesian games.
//!
//! ## Available Components
//!
//! - `AlphaVectorPlanning`: back-projection, cross-sums, pruning and the
//!   exact (Monahan) and point-based backups
//! - `MdpValueIteration`: finite and infinite horizon Q-tables
//! - `Perseus`: randomized point-based value iteration
//! - `Qmdp`, `Qav`: Q-functions over beliefs
//! - `BayesianGameIdenticalPayoff`, `BruteForceSolver`: stage games and their
//!   exhaustive solution
//! - `lp`: the witness linear programs behind exact pruning

pub mod alpha_vector;
pub mod alpha_vector_planning;
pub mod bayesian_game;
pub mod config;
pub mod lp;
pub mod mdp_value_iteration;
pub mod perseus;
pub mod prune;
pub mod q_function;
pub mod vector_set;

pub use alpha_vector::{
    best_vector, export_value_function, import_value_function, load_value_function, save_value_function,
    value_at, AlphaVector, ValueFunction,
};
pub use alpha_vector_planning::AlphaVectorPlanning;
pub use bayesian_game::{BayesianGameIdenticalPayoff, BruteForceSolver, JointPolicyPureVector};
pub use config::{BackProjection, PlannerConfig, PruneStrength};
pub use mdp_value_iteration::{MdpValueIteration, QTables};
pub use perseus::Perseus;
pub use q_function::{QFunction, Qav, Qmdp};
pub use vector_set::{cross_sum, GaoVectorSet, VectorSet};
