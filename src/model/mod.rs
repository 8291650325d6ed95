//! Discrete multi-agent problem models: named components, joint sets,
//! probability tables and the problem wrappers planners consume.

pub mod components;
pub mod decision_process;
pub mod joint;
pub mod observation;
pub mod probability;
pub mod problem;
pub mod reward;
pub mod sparse;
pub mod toi;
pub mod transition;

pub use components::{AgentComponent, ComponentKind, DiscreteActions, DiscreteObservations, DiscreteStates};
pub use decision_process::{DecisionProcess, ModelConfig, MultiAgentDecisionProcessDiscrete, ProblemModel};
pub use joint::{construct_joint, JointEntity, JointSet, LazyJointCache};
pub use observation::{OGet, ObservationModel};
pub use probability::{sample_inverse_cdf, ProbabilityMatrix, RowIter};
pub use problem::{DecPomdp, PlanningProblem, Posg, RewardType};
pub use reward::RewardModel;
pub use sparse::SparseMatrix;
pub use toi::{ToiDecPomdp, ToiDecisionProcess};
pub use transition::{TGet, TransitionModel};
