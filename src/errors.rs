//! Error types and validation functions for Markov regime analysis.
//!
//! Configuration and lookup failures are fatal to the call that raised them and
//! always name the offending dimension or state. Numerical degeneracies (singular
//! hitting-time systems, series too short for fractal scaling) are not errors:
//! they are recovered locally and flagged on the corresponding result type.

use thiserror::Error;

/// Error types for Markov regime analysis operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MarkovAnalysisError {
    /// Discretization thresholds are missing or malformed for a dimension.
    #[error("Configuration error for dimension '{dimension}': {reason}")]
    Configuration {
        /// Dimension whose thresholds are missing or invalid
        dimension: String,
        /// What is wrong with the configuration
        reason: String,
    },

    /// A requested start or target state is not part of the alphabet.
    #[error("Unknown state: {state}")]
    UnknownState {
        /// Label (or index) of the state that was requested
        state: String,
    },

    /// Insufficient data for the requested analysis.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// Invalid parameter value for an analysis call.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// Numerical computation error due to instability or convergence failure.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
        /// Operation that failed
        operation: Option<String>,
    },

    /// Two inputs that must agree in size do not.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
        /// Where the mismatch was detected
        context: String,
    },
}

/// Result type for Markov analysis operations.
pub type MarkovResult<T> = Result<T, MarkovAnalysisError>;

impl MarkovAnalysisError {
    /// Shorthand for a configuration error on `dimension`.
    pub fn configuration(dimension: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            dimension: dimension.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an unknown-state error.
    pub fn unknown_state(state: impl Into<String>) -> Self {
        Self::UnknownState {
            state: state.into(),
        }
    }

    /// Shorthand for a numerical error raised by `operation`.
    pub fn numerical(reason: impl Into<String>, operation: &str) -> Self {
        Self::NumericalError {
            reason: reason.into(),
            operation: Some(operation.to_string()),
        }
    }
}

/// Validates that data has sufficient length for analysis.
///
/// # Example
/// ```rust
/// use markov_finance::errors::validate_data_length;
///
/// let data = vec![1.0, 2.0, 3.0];
/// assert!(validate_data_length(&data, 2).is_ok());
/// assert!(validate_data_length(&data, 5).is_err());
/// ```
pub fn validate_data_length<T>(data: &[T], min_required: usize) -> MarkovResult<()> {
    if data.len() < min_required {
        Err(MarkovAnalysisError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that a parameter is within inclusive bounds.
///
/// # Example
/// ```rust
/// use markov_finance::errors::validate_parameter;
///
/// assert!(validate_parameter(0.5, 0.0, 1.0, "probability").is_ok());
/// assert!(validate_parameter(1.5, 0.0, 1.0, "probability").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> MarkovResult<()> {
    if value.is_nan() {
        return Err(MarkovAnalysisError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(MarkovAnalysisError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
            operation: None,
        });
    }

    if value < min || value > max {
        Err(MarkovAnalysisError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates that a single value is finite.
///
/// # Example
/// ```rust
/// use markov_finance::errors::validate_finite;
///
/// assert!(validate_finite(1e-6, "tolerance").is_ok());
/// assert!(validate_finite(f64::NAN, "tolerance").is_err());
/// ```
pub fn validate_finite(value: f64, name: &str) -> MarkovResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MarkovAnalysisError::NumericalError {
            reason: format!("{} is not finite: {}", name, value),
            operation: None,
        })
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first non-finite value, reporting its index.
pub fn validate_all_finite(data: &[f64], name: &str) -> MarkovResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, &v)| !v.is_finite()) {
        let value_desc = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };

        return Err(MarkovAnalysisError::NumericalError {
            reason: format!(
                "{} contains non-finite value at index {}: {}",
                name, i, value_desc
            ),
            operation: None,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_data_length() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(validate_data_length(&data, 3).is_ok());

        match validate_data_length(&data, 5) {
            Err(MarkovAnalysisError::InsufficientData { required, actual }) => {
                assert_eq!(required, 5);
                assert_eq!(actual, 3);
            }
            _ => panic!("Expected InsufficientData error"),
        }
    }

    #[test]
    fn test_validate_finite_scalar() {
        assert!(validate_finite(0.25, "tolerance").is_ok());
        match validate_finite(f64::INFINITY, "tolerance") {
            Err(MarkovAnalysisError::NumericalError { reason, .. }) => {
                assert!(reason.contains("tolerance"));
                assert!(reason.contains("inf"));
            }
            other => panic!("Expected NumericalError, got {:?}", other),
        }
        assert!(validate_finite(f64::NAN, "tolerance").is_err());
    }

    #[test]
    fn test_validate_parameter_bounds() {
        assert!(validate_parameter(0.0, 0.0, 1.0, "p").is_ok());
        assert!(validate_parameter(1.0, 0.0, 1.0, "p").is_ok());

        match validate_parameter(-0.5, 0.0, 1.0, "tolerance") {
            Err(MarkovAnalysisError::InvalidParameter {
                parameter,
                value,
                constraint,
            }) => {
                assert_eq!(parameter, "tolerance");
                assert_eq!(value, -0.5);
                assert_eq!(constraint, "[0, 1]");
            }
            _ => panic!("Expected InvalidParameter error"),
        }

        assert!(matches!(
            validate_parameter(f64::NAN, 0.0, 1.0, "p"),
            Err(MarkovAnalysisError::InvalidParameter { .. })
        ));
        assert!(matches!(
            validate_parameter(0.5, 1.0, 0.0, "p"),
            Err(MarkovAnalysisError::NumericalError { operation: None, .. })
        ));
    }

    #[test]
    fn test_validate_all_finite_reports_index() {
        assert!(validate_all_finite(&[], "empty").is_ok());
        assert!(validate_all_finite(&[1.0, 2.0], "ok").is_ok());

        match validate_all_finite(&[1.0, 2.0, f64::NAN], "prices") {
            Err(MarkovAnalysisError::NumericalError { reason, .. }) => {
                assert!(reason.contains("prices"));
                assert!(reason.contains("index 2"));
                assert!(reason.contains("NaN"));
            }
            _ => panic!("Expected NumericalError"),
        }
    }

    #[test]
    fn test_error_display_names_offender() {
        let err = MarkovAnalysisError::configuration("rsi", "no cutoffs supplied");
        let msg = err.to_string();
        assert!(msg.contains("rsi"));
        assert!(msg.contains("no cutoffs supplied"));

        let err = MarkovAnalysisError::unknown_state("T2_V0_R1");
        assert!(err.to_string().contains("T2_V0_R1"));
    }
}
