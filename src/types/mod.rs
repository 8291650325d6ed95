use serde::{Serialize, Deserialize};
use std::fmt;

/// Index of an element of a finite discrete set (state, action, joint action, ...)
pub type Index = usize;

/// Tolerance below which a probability is treated as zero.
pub const PROB_PRECISION: f64 = 1e-12;

/// Tolerance for comparing alpha-vector coefficients and values.
pub const REWARD_PRECISION: f64 = 1e-10;

/// Default stopping threshold on the max absolute Q-value change.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-4;

/// Allowed deviation of a belief's total mass from one.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-9;

/// A named element of a discrete set: a state, an individual action or an
/// individual observation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscreteEntity {
    index: Index,
    name: String,
    description: String,
}

impl DiscreteEntity {
    pub fn new<S: Into<String>>(index: Index, name: S, description: S) -> Self {
        DiscreteEntity {
            index,
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn rename<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }
}

impl fmt::Display for DiscreteEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.name)
    }
}

/// Planning horizon of a problem.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Horizon {
    /// A fixed number of decision stages
    Finite(usize),
    /// Discounted, unbounded number of stages
    Infinite,
}

impl Horizon {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Horizon::Infinite)
    }

    /// Number of stages, `None` when unbounded.
    pub fn steps(&self) -> Option<usize> {
        match self {
            Horizon::Finite(h) => Some(*h),
            Horizon::Infinite => None,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Finite(h) => write!(f, "{}", h),
            Horizon::Infinite => write!(f, "inf"),
        }
    }
}

/// Whether finalizing a model runs the probability sanity checks.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationMode {
    #[default]
    Strict,
    Skip,
}

impl ValidationMode {
    pub fn is_strict(&self) -> bool {
        matches!(self, ValidationMode::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_rename() {
        let mut state = DiscreteEntity::new(3, "tiger-left", "tiger behind left door");
        state.rename("left");
        assert_eq!(state.name(), "left");
        assert_eq!(state.index(), 3);
        assert_eq!(state.to_string(), "3:left");
    }

    #[test]
    fn test_horizon() {
        assert_eq!(Horizon::Finite(4).steps(), Some(4));
        assert!(Horizon::Infinite.is_infinite());
        assert_eq!(Horizon::Infinite.to_string(), "inf");
    }
}
