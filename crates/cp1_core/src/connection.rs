//! The projective connection of a CP¹ structure on ℂ \ {0, 1, λ} and the
//! developing-map equation it determines.

use crate::error::{HolonomyError, Result};
use crate::traits::DynamicalSystem;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Quadratic differential
///
/// q(z) = 1/(2z²) + 1/(2(z−1)²) + 1/(2(z−λ)²) + (C + λ − z)/(z(z−1)(z−λ))
///
/// Every puncture, ∞ included, is a regular singularity with parabolic local
/// monodromy; C is the accessory parameter. The developing map is a ratio of
/// solutions of w'' + ½ q(z) w = 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectiveConnection {
    lambda: Complex64,
    accessory: Complex64,
}

fn is_finite(z: Complex64) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

impl ProjectiveConnection {
    pub fn new(lambda: Complex64, accessory: Complex64) -> Result<Self> {
        if !is_finite(lambda) || !is_finite(accessory) {
            return Err(HolonomyError::InvalidParameter(format!(
                "lambda and C must be finite (lambda = {lambda}, C = {accessory})"
            )));
        }
        if lambda.norm() == 0.0 || (lambda - 1.0).norm() == 0.0 {
            return Err(HolonomyError::InvalidParameter(format!(
                "lambda must differ from 0 and 1 (got {lambda})"
            )));
        }
        Ok(Self { lambda, accessory })
    }

    pub fn lambda(&self) -> Complex64 {
        self.lambda
    }

    pub fn accessory(&self) -> Complex64 {
        self.accessory
    }

    /// The finite punctures 0, 1 and λ.
    pub fn punctures(&self) -> [Complex64; 3] {
        [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0), self.lambda]
    }

    /// The part of q that does not depend on C.
    pub fn base_differential(lambda: Complex64, z: Complex64) -> Complex64 {
        let z1 = z - 1.0;
        let zl = z - lambda;
        0.5 / (z * z) + 0.5 / (z1 * z1) + 0.5 / (zl * zl) + (lambda - z) / (z * z1 * zl)
    }

    pub fn quadratic_differential(&self, z: Complex64) -> Complex64 {
        let denom = z * (z - 1.0) * (z - self.lambda);
        Self::base_differential(self.lambda, z) + self.accessory / denom
    }

    /// Recovers the accessory parameter of the member of the family with
    /// cross-ratio `lambda` that takes the value `q` at `z`.
    pub fn accessory_from_value(lambda: Complex64, z: Complex64, q: Complex64) -> Complex64 {
        (q - Self::base_differential(lambda, z)) * z * (z - 1.0) * (z - lambda)
    }

    /// Smallest distance from any point of the segment [a, b] to a finite
    /// puncture, with the puncture attaining it.
    pub fn nearest_puncture(&self, a: Complex64, b: Complex64) -> (Complex64, f64) {
        let d = b - a;
        let len2 = d.norm_sqr();
        let mut best = (self.lambda, f64::INFINITY);
        for p in self.punctures() {
            let s = if len2 > 0.0 {
                (((p - a) * d.conj()).re / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dist = (a + d.scale(s) - p).norm();
            if dist < best.1 {
                best = (p, dist);
            }
        }
        best
    }
}

/// The developing-map equation restricted to the straight edge
/// z(t) = start + t·(end − start), t ∈ [0, 1].
///
/// State is the basis matrix [[w₁, w₂], [w₁', w₂']] in row-major order,
/// flattened into (re, im) pairs.
pub struct EdgeFlow<'a> {
    connection: &'a ProjectiveConnection,
    start: Complex64,
    delta: Complex64,
}

impl<'a> EdgeFlow<'a> {
    pub const DIM: usize = 8;

    pub fn new(connection: &'a ProjectiveConnection, start: Complex64, end: Complex64) -> Self {
        Self {
            connection,
            start,
            delta: end - start,
        }
    }
}

impl DynamicalSystem<f64> for EdgeFlow<'_> {
    fn dimension(&self) -> usize {
        Self::DIM
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let z = self.start + self.delta.scale(t);
        let potential = self.connection.quadratic_differential(z).scale(0.5);
        for col in 0..2 {
            let w = Complex64::new(x[2 * col], x[2 * col + 1]);
            let dw = Complex64::new(x[4 + 2 * col], x[4 + 2 * col + 1]);
            let w_t = self.delta * dw;
            let dw_t = -self.delta * potential * w;
            out[2 * col] = w_t.re;
            out[2 * col + 1] = w_t.im;
            out[4 + 2 * col] = dw_t.re;
            out[4 + 2 * col + 1] = dw_t.im;
        }
    }
}
