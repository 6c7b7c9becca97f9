//! Error types for input normalization and solver runs.
//!
//! The numerical core never fails on its own; every variant here is either a
//! malformed caller input caught at the boundary or a SAS function that could
//! not be evaluated.

use thiserror::Error;

/// Caller-input errors detected while normalizing arrays.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    /// Wrong rank, or a dimension that disagrees with a companion array.
    #[error("{name} has the wrong shape: {detail}")]
    Shape { name: &'static str, detail: String },

    /// An initial age profile whose zero-age entry is not zero.
    #[error("{name} must be zero at age 0, got {value}")]
    InitialCondition { name: &'static str, value: f64 },

    /// A SAS function object missing one of the two required queries.
    #[error("SAS function for outflow {index} does not provide `{method}`")]
    Contract { index: usize, method: &'static str },

    /// Settings that are individually valid but inconsistent, or out of range.
    #[error("{0}")]
    Configuration(String),

    #[error("{name} contains NaN values")]
    NonFinite { name: &'static str },
}

impl InputError {
    pub(crate) fn shape(name: &'static str, detail: impl Into<String>) -> Self {
        InputError::Shape {
            name,
            detail: detail.into(),
        }
    }
}

/// Failure reported by a SAS function while evaluating a cumulative distribution.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct SasError(pub String);

impl SasError {
    pub fn new(msg: impl Into<String>) -> Self {
        SasError(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("SAS function for outflow {outflow} failed at timestep {timestep}: {source}")]
    Sas {
        outflow: usize,
        timestep: usize,
        #[source]
        source: SasError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_error_names_the_array() {
        let e = InputError::shape("Q", "expected 3 rows, got 2");
        assert_eq!(e.to_string(), "Q has the wrong shape: expected 3 rows, got 2");
    }

    #[test]
    fn solve_error_wraps_input_error_transparently() {
        let e: SolveError = InputError::NonFinite { name: "J" }.into();
        assert_eq!(e.to_string(), "J contains NaN values");
    }

    #[test]
    fn sas_error_reports_location() {
        let e = SolveError::Sas {
            outflow: 1,
            timestep: 7,
            source: SasError::new("time index out of range"),
        };
        let msg = e.to_string();
        assert!(msg.contains("outflow 1"));
        assert!(msg.contains("timestep 7"));
        assert!(msg.contains("out of range"));
    }
}
