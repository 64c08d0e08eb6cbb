//! Error types for the RAMI core library.
//!
//! Only structural failures live here. Per-record schema problems, unmapped
//! axes under the tagging policy and dangling interaction endpoints are
//! reported as data alongside the stage output.

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::PyErr;

use crate::models::Axis;

/// Top-level error enum for the RAMI core library.
#[derive(Debug, thiserror::Error)]
pub enum RamiError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No {axis}-axis rule matches microsystem {id}")]
    UnmappedAxis { id: String, axis: Axis },

    #[error("Invalid mapping rules: {0}")]
    InvalidRules(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Working set of {actual} microsystems exceeds the limit of {limit}")]
    Capacity { limit: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RamiError> for PyErr {
    fn from(err: RamiError) -> PyErr {
        match &err {
            RamiError::MalformedInput(_) | RamiError::Json(_) => {
                PyValueError::new_err(err.to_string())
            }
            RamiError::InvalidRules(_) | RamiError::Config(_) => {
                PyValueError::new_err(err.to_string())
            }
            RamiError::UnmappedAxis { .. } => PyValueError::new_err(err.to_string()),
            RamiError::Capacity { .. } => PyRuntimeError::new_err(err.to_string()),
            RamiError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type RamiResult<T> = Result<T, RamiError>;
