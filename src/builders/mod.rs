pub mod model;
pub mod planner;

pub use model::DecPomdpBuilder;
pub use planner::PlannerConfigBuilder;
