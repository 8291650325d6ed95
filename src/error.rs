use std::fmt;

/// Result type for madp operations
pub type Result<T> = std::result::Result<T, MadpError>;

/// Main error type for the madp library
#[derive(Debug, Clone, PartialEq)]
pub enum MadpError {
    /// An index was outside the set it addresses
    IndexOutOfBounds {
        what: String,
        index: usize,
        bound: usize,
    },

    /// A component was queried before `set_initialized(true)` succeeded
    NotInitialized(String),

    /// Lookup by name failed
    NotFound {
        what: String,
        name: String,
    },

    /// The product of the cardinalities does not fit in an index
    IndexOverflow {
        cardinalities: Vec<usize>,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// A probability row does not sum to one
    InvalidDistribution {
        row: String,
        sum: f64,
    },

    /// A single probability is negative or NaN
    InvalidProbability {
        location: String,
        value: f64,
    },

    /// Incompatible construction calls or an internal consistency fault
    Construction(String),

    /// Functionality that a variant deliberately does not provide
    NotImplemented(String),

    /// Numerical computation errors
    NumericalError(String),

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Malformed line in a text import
    ParseError {
        line: usize,
        reason: String,
    },
}

impl fmt::Display for MadpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MadpError::IndexOutOfBounds { what, index, bound } => {
                write!(f, "{} index {} out of bounds: must be less than {}", what, index, bound)
            }
            MadpError::NotInitialized(what) => write!(f, "{} is not initialized", what),
            MadpError::NotFound { what, name } => write!(f, "{} named '{}' not found", what, name),
            MadpError::IndexOverflow { cardinalities } => {
                write!(f, "Joint index overflow: product of cardinalities {:?} exceeds usize", cardinalities)
            }
            MadpError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            MadpError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            MadpError::InvalidDistribution { row, sum } => {
                write!(f, "Probabilities of {} sum to {:.17} instead of 1", row, sum)
            }
            MadpError::InvalidProbability { location, value } => {
                write!(f, "Invalid probability {} at {}", value, location)
            }
            MadpError::Construction(msg) => write!(f, "Construction error: {}", msg),
            MadpError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            MadpError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            MadpError::IoError(msg) => write!(f, "IO error: {}", msg),
            MadpError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            MadpError::ParseError { line, reason } => {
                write!(f, "Parse error on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for MadpError {}

// Conversion from std::io::Error
impl From<std::io::Error> for MadpError {
    fn from(err: std::io::Error) -> Self {
        MadpError::IoError(err.to_string())
    }
}

// Conversion from bincode::Error
impl From<bincode::Error> for MadpError {
    fn from(err: bincode::Error) -> Self {
        MadpError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for MadpError {
    fn from(err: serde_json::Error) -> Self {
        MadpError::SerializationError(err.to_string())
    }
}

impl From<std::num::ParseFloatError> for MadpError {
    fn from(err: std::num::ParseFloatError) -> Self {
        MadpError::ParseError {
            line: 0,
            reason: err.to_string(),
        }
    }
}

impl From<std::num::ParseIntError> for MadpError {
    fn from(err: std::num::ParseIntError) -> Self {
        MadpError::ParseError {
            line: 0,
            reason: err.to_string(),
        }
    }
}

impl From<minilp::Error> for MadpError {
    fn from(err: minilp::Error) -> Self {
        MadpError::NumericalError(format!("linear program: {}", err))
    }
}

impl From<ndarray::ShapeError> for MadpError {
    fn from(err: ndarray::ShapeError) -> Self {
        MadpError::DimensionMismatch {
            expected: "consistent array shape".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl MadpError {
    pub fn index_out_of_bounds<S: Into<String>>(what: S, index: usize, bound: usize) -> Self {
        MadpError::IndexOutOfBounds {
            what: what.into(),
            index,
            bound,
        }
    }

    pub fn not_initialized<S: Into<String>>(what: S) -> Self {
        MadpError::NotInitialized(what.into())
    }

    pub fn dimension_mismatch<S: Into<String>, T: Into<String>>(expected: S, actual: T) -> Self {
        MadpError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>, T: Into<String>>(name: S, reason: T) -> Self {
        MadpError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Fails with `IndexOutOfBounds` unless `index < bound`.
pub(crate) fn check_index(what: &str, index: usize, bound: usize) -> Result<()> {
    if index < bound {
        Ok(())
    } else {
        Err(MadpError::index_out_of_bounds(what, index, bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_offending_row() {
        let err = MadpError::InvalidDistribution {
            row: "transition row (s=1, ja=2)".to_string(),
            sum: 0.9,
        };
        let text = err.to_string();
        assert!(text.contains("s=1, ja=2"));
        assert!(text.contains("0.9"));
    }

    #[test]
    fn test_check_index() {
        assert!(check_index("state", 2, 3).is_ok());
        assert_eq!(
            check_index("state", 3, 3),
            Err(MadpError::index_out_of_bounds("state", 3, 3))
        );
    }
}
