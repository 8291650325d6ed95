use crate::error::Result;
use crate::planning::config::{BackProjection, PlannerConfig, PruneStrength};

/// Builder for planner settings with a fluent API
#[derive(Default)]
pub struct PlannerConfigBuilder {
    config: PlannerConfig,
}

impl PlannerConfigBuilder {
    pub fn new() -> Self {
        PlannerConfigBuilder::default()
    }

    /// Stop once the largest value change drops below `tolerance`
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn back_projection(mut self, back_projection: BackProjection) -> Self {
        self.config.back_projection = back_projection;
        self
    }

    pub fn prune(mut self, prune: PruneStrength) -> Self {
        self.config.prune = prune;
        self
    }

    /// Size of the sampled belief set and the length of each sampling run
    pub fn beliefs(mut self, nr_beliefs: usize, depth: usize) -> Self {
        self.config.nr_beliefs = nr_beliefs;
        self.config.belief_depth = depth;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PlannerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
