use crate::solvers::SolverError;
use num_complex::Complex64;
use thiserror::Error;

/// Failures raised while building contours or continuing solutions around them.
///
/// Classification is not represented here: an inconclusive search is a
/// legitimate result (`Discreteness::Uncertain`), not an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HolonomyError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("contour error: {0}")]
    ContourValidity(String),

    #[error("holonomy computation failed: path passes within {distance:e} of puncture {puncture}")]
    SingularApproach { puncture: Complex64, distance: f64 },

    #[error("holonomy computation failed: {0}")]
    ContinuationFailure(#[from] SolverError),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl HolonomyError {
    /// True for the failures a caller may retry with a tighter tolerance or
    /// other contours.
    pub fn is_continuation_failure(&self) -> bool {
        matches!(
            self,
            HolonomyError::SingularApproach { .. } | HolonomyError::ContinuationFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HolonomyError>;
