use serde::{Serialize, Deserialize};

use crate::error::{MadpError, Result};
use crate::types::CONVERGENCE_TOLERANCE;

/// Which loop structure back-projection uses. Both give the same vectors.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BackProjection {
    /// Full `|S| x |S|` products per joint action and observation
    Dense,
    /// Only stored non-zero transition and observation entries
    #[default]
    Sparse,
}

/// How aggressively vector sets are pruned.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PruneStrength {
    /// Exact duplicates only
    Duplicates,
    /// Vectors that are maximal at one of the planner's beliefs
    PointBased,
    /// Vectors that are maximal somewhere on the simplex (linear programs)
    #[default]
    Exact,
}

/// Planner settings shared by value iteration, alpha-vector backups and
/// Perseus.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlannerConfig {
    /// Stop when the max value change drops below this
    pub tolerance: f64,
    /// Cap on sweeps or backup stages
    pub max_iterations: usize,
    pub back_projection: BackProjection,
    pub prune: PruneStrength,
    /// Beliefs sampled for point-based methods
    pub nr_beliefs: usize,
    /// Trajectory length when sampling beliefs by simulation
    pub belief_depth: usize,
    pub seed: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            tolerance: CONVERGENCE_TOLERANCE,
            max_iterations: 10_000,
            back_projection: BackProjection::Sparse,
            prune: PruneStrength::Exact,
            nr_beliefs: 100,
            belief_depth: 10,
            seed: 42,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(MadpError::invalid_parameter("tolerance", "must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(MadpError::invalid_parameter("max_iterations", "must be at least 1"));
        }
        if self.nr_beliefs == 0 {
            return Err(MadpError::invalid_parameter("nr_beliefs", "must be at least 1"));
        }
        if self.belief_depth == 0 {
            return Err(MadpError::invalid_parameter("belief_depth", "must be at least 1"));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlannerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let config = PlannerConfig {
            prune: PruneStrength::PointBased,
            seed: 7,
            ..PlannerConfig::default()
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("PointBased"));
        assert_eq!(PlannerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        assert!(PlannerConfig::default().validate().is_ok());
        let bad = PlannerConfig {
            tolerance: 0.0,
            ..PlannerConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(PlannerConfig::from_json("{\"tolerance\": 1}").is_err());
    }
}
