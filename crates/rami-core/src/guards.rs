//! Shared guardrails for working-set sizes and numeric parameters.

use pyo3::prelude::*;

use crate::errors::{RamiError, RamiResult};

// Working-set guards
pub const MAX_MATRIX_MICROSYSTEMS: usize = 5000;
pub const MAX_AGGLOMERATIVE_MICROSYSTEMS: usize = 1000;
pub const MAX_WORKFLOW_STEPS: usize = 256;

#[pyfunction]
pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

/// Clamp a requested cluster count into `[1, size]`.
#[pyfunction]
pub fn clamp_cluster_count(requested: i64, size: i64) -> i64 {
    clamp_int(requested, 1, size.max(1))
}

/// Fail when a working set is larger than `limit`.
pub fn ensure_capacity(actual: usize, limit: usize) -> RamiResult<()> {
    if actual > limit {
        return Err(RamiError::Capacity { limit, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_cluster_count() {
        assert_eq!(clamp_cluster_count(0, 5), 1);
        assert_eq!(clamp_cluster_count(3, 5), 3);
        assert_eq!(clamp_cluster_count(9, 5), 5);
        assert_eq!(clamp_cluster_count(2, 0), 1);
    }

    #[test]
    fn test_ensure_capacity() {
        assert!(ensure_capacity(10, 10).is_ok());
        match ensure_capacity(11, 10) {
            Err(RamiError::Capacity { limit, actual }) => {
                assert_eq!((limit, actual), (10, 11));
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }
}
