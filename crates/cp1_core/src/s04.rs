//! Holonomy of CP¹ structures on the four-punctured sphere ℂ \ {0, 1, λ}.
//!
//! Convention: λ is the cross-ratio of the punctures and C the accessory
//! parameter of the projective connection (see [`ProjectiveConnection`]).
//! Together (λ, C) parameterize the CP¹ structures of bounded type.
//!
//! The generators A and B are the loops around {0, λ} and {λ, 1}, in a
//! common frame. Their traces and the trace of the loop around {0, 1} below
//! λ, which is 4 − tr(AB⁻¹), are the trace coordinates (x, y, z).

use crate::connection::ProjectiveConnection;
use crate::continuation::{monodromy, transport, ContinuationSettings, SolutionBasis};
use crate::contours::{advanced, advanced_above, check_count, contours, Contour, ContourFamily};
use crate::error::{HolonomyError, Result};
use crate::modular::{modular_lambda, FundamentalDomainReduction, LoopWord, ReducedLoop, DIRECT_WORDS};
use crate::solvers::SolverError;
use crate::types::{trace, MonodromyMatrix};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Roots of the Fricke relation closer than this (relative) are not told
/// apart; the product estimate is kept.
const ROOT_SEPARATION: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HolonomySettings {
    /// Number of traces to compute (1, 2 or 3). At most two generators are
    /// integrated; the third trace comes from their product.
    pub contours: usize,
    /// Contour family for direct computation at the given λ.
    pub family: ContourFamily,
    /// Reduce λ into the modular fundamental domain and use advanced
    /// contours there instead of computing directly.
    pub fundamental_domain: bool,
    pub continuation: ContinuationSettings,
}

impl Default for HolonomySettings {
    fn default() -> Self {
        Self {
            contours: 3,
            family: ContourFamily::Simple,
            fundamental_domain: true,
            continuation: ContinuationSettings::default(),
        }
    }
}

impl HolonomySettings {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            continuation: ContinuationSettings::with_tolerance(tolerance),
            ..Self::default()
        }
    }
}

/// A space of CP¹ structures over a fixed Riemann surface.
pub trait Holonomy {
    /// Matrix generators of the holonomy group, in a common frame.
    fn gens(&self, accessory: Complex64) -> Result<Vec<MonodromyMatrix>>;

    /// Traces of the holonomy generators.
    fn traces(&self, accessory: Complex64) -> Result<Vec<Complex64>>;
}

/// Roots of z² + (xy − 8)z + x² + y² − 8x − 8y + 28, the Fricke relation
/// with peripheral traces −2 solved for z. They are 4 − tr(AB⁻¹) and
/// 4 − tr(AB).
fn fricke_roots(x: Complex64, y: Complex64) -> [Complex64; 2] {
    let b = x * y - 8.0;
    let c = x * x + y * y - (x + y) * 8.0 + 28.0;
    let s = (b * b - c * 4.0).sqrt();
    let q = if (b.conj() * s).re >= 0.0 {
        -(b + s) * 0.5
    } else {
        -(b - s) * 0.5
    };
    if q.norm() == 0.0 {
        return [q, q];
    }
    [q, c / q]
}

/// 4 − tr(AB⁻¹), the trace of the loop around {0, 1} below λ.
///
/// The product loses digits when the traces are large, so the estimate is
/// replaced by the nearest root of the Fricke relation unless the two roots
/// are too close to separate.
pub fn third_trace(a: &MonodromyMatrix, b: &MonodromyMatrix) -> Result<Complex64> {
    let b_inverse = b
        .try_inverse()
        .ok_or(HolonomyError::ContinuationFailure(SolverError::SingularBasis))?;
    let estimate = 4.0 - trace(&(a * b_inverse));
    let [r1, r2] = fricke_roots(trace(a), trace(b));
    if !(r1.is_finite() && r2.is_finite())
        || (r1 - r2).norm() < ROOT_SEPARATION * estimate.norm().max(1.0)
    {
        return Ok(estimate);
    }
    Ok(if (r1 - estimate).norm() <= (r2 - estimate).norm() {
        r1
    } else {
        r2
    })
}

/// CP¹ structures on ℂ \ {0, 1, λ} for one λ. Contours are built once, so
/// reuse this when λ stays fixed across many values of C.
#[derive(Debug, Clone)]
pub struct S04 {
    lambda: Complex64,
    settings: HolonomySettings,
    reduction: Option<FundamentalDomainReduction>,
    /// Loops at the working cross-ratio, indexed by [`ReducedLoop`], each
    /// counterclockwise and starting at its top vertex.
    loops: Vec<Contour>,
}

impl S04 {
    pub fn new(lambda: Complex64, settings: HolonomySettings) -> Result<Self> {
        // validates λ
        ProjectiveConnection::new(lambda, Complex64::new(0.0, 0.0))?;
        check_count(settings.contours)?;
        let generators = settings.contours.min(2);

        let (reduction, raw) = if settings.fundamental_domain {
            let reduction = FundamentalDomainReduction::new(lambda)?;
            let reduced = reduction.reduced_lambda();
            let mut raw = advanced(reduced, 2)?;
            if reduction.uses_third_loop() {
                let third = if reduction.third_loop_passes_above() {
                    advanced_above(reduced)?
                } else {
                    advanced(reduced, 3)?.swap_remove(2)
                };
                raw.push(third);
            }
            (Some(reduction), raw)
        } else {
            (None, contours(lambda, generators, settings.family)?)
        };

        debug!(
            %lambda,
            loops = raw.len(),
            map = ?reduction.map(|r| r.map()),
            "prepared S04 contours"
        );

        Ok(Self {
            lambda,
            settings,
            reduction,
            loops: raw
                .iter()
                .map(|contour| contour.counterclockwise().starting_at_top())
                .collect(),
        })
    }

    pub fn lambda(&self) -> Complex64 {
        self.lambda
    }

    pub fn settings(&self) -> &HolonomySettings {
        &self.settings
    }

    /// Contours actually integrated (at the reduced λ in fundamental-domain
    /// mode).
    pub fn contours(&self) -> &[Contour] {
        &self.loops
    }

    /// Loops giving A and B, in order.
    pub fn generator_words(&self) -> [LoopWord; 2] {
        match &self.reduction {
            Some(reduction) => reduction.generator_words(),
            None => DIRECT_WORDS,
        }
    }

    fn working_connection(&self, accessory: Complex64) -> Result<ProjectiveConnection> {
        let connection = ProjectiveConnection::new(self.lambda, accessory)?;
        match &self.reduction {
            Some(reduction) => reduction.reduce_connection(&connection),
            None => Ok(connection),
        }
    }

    /// Monodromy of one loop relative to the basis at the start of the first
    /// loop. Other loops are reached by going straight up, across, and down
    /// to their top vertex, which keeps clear of the punctures.
    fn loop_monodromy(
        &self,
        connection: &ProjectiveConnection,
        reduced_loop: ReducedLoop,
    ) -> Result<MonodromyMatrix> {
        let settings = &self.settings.continuation;
        let contour = self.loops.get(reduced_loop.index()).ok_or_else(|| {
            HolonomyError::ContourValidity(format!("no contour prepared for {reduced_loop:?}"))
        })?;
        let base = self.loops[0].start();
        let start = contour.start();
        let height = base.im.max(start.im);
        let bridge = [
            base,
            Complex64::new(base.re, height),
            Complex64::new(start.re, height),
            start,
        ];
        let frame = transport(connection, &bridge, &SolutionBasis::identity(), settings)?;
        monodromy(connection, contour, &frame, settings)
    }
}

impl Holonomy for S04 {
    /// The pair (A, B), truncated to one matrix when a single trace is
    /// requested. In fundamental-domain mode the matrices are words in the
    /// reduced loops, conjugate to the direct pair.
    fn gens(&self, accessory: Complex64) -> Result<Vec<MonodromyMatrix>> {
        let connection = self.working_connection(accessory)?;
        let words = self.generator_words();
        words[..self.settings.contours.min(2)]
            .iter()
            .map(|word| {
                let matrix = self.loop_monodromy(&connection, word.reduced_loop)?;
                if word.inverted {
                    matrix
                        .try_inverse()
                        .ok_or(HolonomyError::ContinuationFailure(SolverError::SingularBasis))
                } else {
                    Ok(matrix)
                }
            })
            .collect()
    }

    fn traces(&self, accessory: Complex64) -> Result<Vec<Complex64>> {
        let gens = self.gens(accessory)?;
        let mut traces: Vec<Complex64> = gens.iter().map(trace).collect();
        if self.settings.contours == 3 {
            traces.push(third_trace(&gens[0], &gens[1])?);
        }
        Ok(traces)
    }
}

/// Traces of holonomy generators for the (λ, C) projective connection.
/// Use [`S04`] directly when λ is fixed across many calls.
pub fn s04_holonomy(
    lambda: Complex64,
    accessory: Complex64,
    settings: &HolonomySettings,
) -> Result<Vec<Complex64>> {
    S04::new(lambda, *settings)?.traces(accessory)
}

/// Traces of holonomy generators for the (τ, C) projective connection, where
/// τ in the upper half plane is sent to λ by the modular function.
pub fn s04_tau_holonomy(
    tau: Complex64,
    accessory: Complex64,
    settings: &HolonomySettings,
) -> Result<Vec<Complex64>> {
    s04_holonomy(modular_lambda(tau)?, accessory, settings)
}

/// The generator pair (A, B) for the (λ, C) projective connection.
pub fn s04_gens(
    lambda: Complex64,
    accessory: Complex64,
    settings: &HolonomySettings,
) -> Result<Vec<MonodromyMatrix>> {
    S04::new(lambda, *settings)?.gens(accessory)
}
