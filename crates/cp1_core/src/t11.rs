//! Holonomy of CP¹ structures on a once-punctured torus.
//!
//! The torus is handled through the four-punctured sphere commensurable with
//! it: each sphere trace t corresponds to a torus trace ±√(2 − t). Matrix
//! generators are not available on this side, only traces.

use crate::error::{HolonomyError, Result};
use crate::modular::modular_lambda;
use crate::s04::{Holonomy, HolonomySettings, S04};
use crate::types::{MonodromyMatrix, TraceTriple};
use num_complex::Complex64;

/// Third trace of a torus triple from the first two, via the Markov relation
/// x² + y² + z² = xyz. Takes the root with the minus sign.
pub fn markov_z(x: Complex64, y: Complex64) -> Complex64 {
    let xy = x * y;
    (xy - (xy * xy - (x * x + y * y) * 4.0).sqrt()) * 0.5
}

/// Torus traces from two or three sphere traces.
///
/// With three traces the sign of z is chosen so that |x² + y² + z² − xyz| is
/// the smaller of the two candidates, which is the branch satisfying the
/// Markov relation.
pub fn t11_from_s04(traces: &[Complex64]) -> Result<TraceTriple> {
    let lift = |t: Complex64| (2.0 - t).sqrt();
    match traces {
        [tx, ty] => {
            let (x, y) = (lift(*tx), lift(*ty));
            Ok(TraceTriple::new(x, y, markov_z(x, y)))
        }
        [tx, ty, tz] => {
            let (x, y, mut z) = (lift(*tx), lift(*ty), lift(*tz));
            let squares = x * x + y * y + z * z;
            let xyz = x * y * z;
            if (squares + xyz).norm() < (squares - xyz).norm() {
                z = -z;
            }
            Ok(TraceTriple::new(x, y, z))
        }
        _ => Err(HolonomyError::InvalidParameter(format!(
            "torus traces need two or three sphere traces, got {}",
            traces.len()
        ))),
    }
}

/// CP¹ structures on the punctured torus commensurable with ℂ \ {0, 1, λ}.
#[derive(Debug, Clone)]
pub struct T11 {
    sphere: S04,
}

impl T11 {
    pub fn new(lambda: Complex64, settings: HolonomySettings) -> Result<Self> {
        Ok(Self {
            sphere: S04::new(lambda, settings)?,
        })
    }

    pub fn trace_triple(&self, accessory: Complex64) -> Result<TraceTriple> {
        t11_from_s04(&self.sphere.traces(accessory)?)
    }
}

impl Holonomy for T11 {
    fn gens(&self, _accessory: Complex64) -> Result<Vec<MonodromyMatrix>> {
        Err(HolonomyError::UnsupportedOperation(
            "matrix generators are not available for T11 holonomy",
        ))
    }

    fn traces(&self, accessory: Complex64) -> Result<Vec<Complex64>> {
        Ok(self.trace_triple(accessory)?.to_array().to_vec())
    }
}

/// Torus traces for the (λ, C) projective connection.
pub fn t11_holonomy(
    lambda: Complex64,
    accessory: Complex64,
    settings: &HolonomySettings,
) -> Result<TraceTriple> {
    T11::new(lambda, *settings)?.trace_triple(accessory)
}

/// Torus traces for the (τ, C) projective connection.
pub fn t11_tau_holonomy(
    tau: Complex64,
    accessory: Complex64,
    settings: &HolonomySettings,
) -> Result<TraceTriple> {
    t11_holonomy(modular_lambda(tau)?, accessory, settings)
}

#[cfg(test)]
mod tests {
    use super::{markov_z, t11_from_s04, t11_holonomy, t11_tau_holonomy, T11};
    use crate::error::HolonomyError;
    use crate::s04::{Holonomy, HolonomySettings};
    use crate::types::TraceTriple;
    use num_complex::Complex64;

    const TESTDELTA: f64 = 1e-5;

    fn real(x: f64) -> Complex64 {
        Complex64::new(x, 0.0)
    }

    fn assert_triple(actual: TraceTriple, expected: [Complex64; 3], tol: f64) {
        for (a, e) in actual.to_array().iter().zip(expected) {
            assert!((a - e).norm() < tol, "expected {e}, got {a} ({actual:?})");
        }
    }

    #[test]
    fn markov_z_on_symmetric_tori() {
        assert!((markov_z(real(3.0), real(3.0)) - 3.0).norm() < 1e-12);
        let s = real(8f64.sqrt());
        assert!((markov_z(s, s) - 4.0).norm() < 1e-7);
    }

    #[test]
    fn three_traces_keep_principal_branch_when_markov_holds() {
        let triple = t11_from_s04(&[real(-7.0), real(-7.0), real(-7.0)]).expect("hex");
        assert_triple(triple, [real(3.0), real(3.0), real(3.0)], 1e-12);
    }

    #[test]
    fn three_traces_flip_z_when_principal_branch_breaks_markov() {
        // (1, 1+i, z) with Re z < 0 solves the Markov relation, so the
        // principal square root recovers −z and must be flipped.
        let x = real(1.0);
        let y = Complex64::new(1.0, 1.0);
        let xy = x * y;
        let disc = (xy * xy - (x * x + y * y) * 4.0).sqrt();
        let roots = [(xy + disc) * 0.5, (xy - disc) * 0.5];
        let z = roots
            .into_iter()
            .find(|r| r.re < 0.0)
            .expect("one root has negative real part");

        let sphere = [2.0 - x * x, 2.0 - y * y, 2.0 - z * z];
        let principal = (2.0 - sphere[2]).sqrt();
        assert!((principal + z).norm() < 1e-12);

        let triple = t11_from_s04(&sphere).expect("torus traces");
        assert_triple(triple, [x, y, z], 1e-12);
        assert!(triple.markov_residual().norm() < 1e-10);
    }

    #[test]
    fn two_traces_use_markov_relation() {
        let triple = t11_from_s04(&[real(-6.0), real(-6.0)]).expect("square");
        assert_triple(triple, [real(8f64.sqrt()), real(8f64.sqrt()), real(4.0)], 1e-7);
        assert!(t11_from_s04(&[real(-6.0)]).is_err());
    }

    #[test]
    fn t11_hex() {
        let triple = t11_holonomy(
            Complex64::new(0.5, 0.86602540378443864676),
            Complex64::new(0.0, -0.57735026918962576451),
            &HolonomySettings::with_tolerance(1e-10),
        )
        .expect("hex torus");
        assert_triple(triple, [real(3.0), real(3.0), real(3.0)], TESTDELTA);
    }

    #[test]
    fn t11_square() {
        let triple = t11_holonomy(real(0.5), real(0.0), &HolonomySettings::with_tolerance(1e-10))
            .expect("square torus");
        let s = 2.82842712474619009760;
        assert_triple(triple, [real(s), real(s), real(4.0)], TESTDELTA);
        assert!(triple.markov_residual().norm() < 1e-4);
    }

    #[test]
    fn t11_square_from_two_contours() {
        let mut settings = HolonomySettings::with_tolerance(1e-10);
        settings.contours = 2;
        let triple = t11_tau_holonomy(Complex64::new(0.0, 1.0), real(0.0), &settings)
            .expect("square torus from tau");
        let s = 2.82842712474619009760;
        assert_triple(triple, [real(s), real(s), real(4.0)], 1e-3);
    }

    #[test]
    fn markov_identity_holds_off_the_symmetric_points() {
        let triple = t11_holonomy(
            Complex64::new(0.3, 0.6),
            Complex64::new(0.4, -0.2),
            &HolonomySettings::with_tolerance(1e-10),
        )
        .expect("generic torus");
        let scale = triple.x.norm() * triple.y.norm() * triple.z.norm();
        assert!(triple.markov_residual().norm() < 1e-5 * scale.max(1.0));
    }

    #[test]
    fn torus_has_no_matrix_generators() {
        let torus = T11::new(real(0.5), HolonomySettings::default()).expect("torus");
        let err = torus.gens(real(0.0)).expect_err("gens are unsupported");
        assert!(matches!(err, HolonomyError::UnsupportedOperation(_)));
        assert!(!err.is_continuation_failure());
    }
}
