use crate::error::{HolonomyError, Result};
use nalgebra::Matrix2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Action of one loop on the local solution basis. Determinant one.
pub type MonodromyMatrix = Matrix2<Complex64>;

/// Traces of two generators and of the curve completing the triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceTriple {
    pub x: Complex64,
    pub y: Complex64,
    pub z: Complex64,
}

impl TraceTriple {
    pub fn new(x: Complex64, y: Complex64, z: Complex64) -> Self {
        Self { x, y, z }
    }

    pub fn from_slice(traces: &[Complex64]) -> Result<Self> {
        match traces {
            [x, y, z] => Ok(Self::new(*x, *y, *z)),
            _ => Err(HolonomyError::InvalidParameter(format!(
                "expected three traces, got {}",
                traces.len()
            ))),
        }
    }

    pub fn to_array(self) -> [Complex64; 3] {
        [self.x, self.y, self.z]
    }

    /// x² + y² + z² − xyz, which vanishes for a once-punctured torus whose
    /// commutator is parabolic.
    pub fn markov_residual(&self) -> Complex64 {
        let (x, y, z) = (self.x, self.y, self.z);
        x * x + y * y + z * z - x * y * z
    }

    /// xyz + x² + y² + z² − 8(x + y + z) + 28, which vanishes for a
    /// four-punctured sphere whose peripheral traces are all −2.
    pub fn fricke_residual(&self) -> Complex64 {
        let (x, y, z) = (self.x, self.y, self.z);
        x * y * z + x * x + y * y + z * z - (x + y + z) * 8.0 + 28.0
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|t| t.re.is_finite() && t.im.is_finite())
    }
}

pub fn trace(matrix: &MonodromyMatrix) -> Complex64 {
    matrix[(0, 0)] + matrix[(1, 1)]
}
