//! The elliptic modular function and the action of the modular group on the
//! cross-ratio λ.
//!
//! PSL₂(ℤ)/Γ(2) ≅ S₃ acts on ℂ \ {0, 1} through the six anharmonic maps,
//! each of which is the restriction of a Möbius transformation permuting
//! {0, 1, ∞}. A [`FundamentalDomainReduction`] picks the map that brings λ
//! into D = {Re λ ≤ ½, |λ − 1| ≤ 1}, transports the projective connection
//! there, and names the loops on the reduced sphere whose monodromy gives
//! the generators at the original λ.

use crate::connection::ProjectiveConnection;
use crate::error::{HolonomyError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

const DOMAIN_SLACK: f64 = 1e-12;
const MAX_TAU_MOVES: usize = 1000;
const MAX_TAU_SHIFT: f64 = 4_503_599_627_370_496.0;

/// Loops integrated on the reduced sphere, each counterclockwise and based
/// above every puncture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReducedLoop {
    /// Around {0, λ}.
    First,
    /// Around {λ, 1}.
    Second,
    /// Around {0, 1}: below λ when Im λ ≥ 0, above it otherwise.
    Third,
}

impl ReducedLoop {
    pub fn index(self) -> usize {
        match self {
            ReducedLoop::First => 0,
            ReducedLoop::Second => 1,
            ReducedLoop::Third => 2,
        }
    }
}

/// A reduced loop, possibly traversed backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopWord {
    pub reduced_loop: ReducedLoop,
    pub inverted: bool,
}

impl LoopWord {
    const fn forward(reduced_loop: ReducedLoop) -> Self {
        Self {
            reduced_loop,
            inverted: false,
        }
    }

    const fn backward(reduced_loop: ReducedLoop) -> Self {
        Self {
            reduced_loop,
            inverted: true,
        }
    }
}

/// The generator pair of the direct computation: contour 1, then contour 2.
pub const DIRECT_WORDS: [LoopWord; 2] = [
    LoopWord::forward(ReducedLoop::First),
    LoopWord::forward(ReducedLoop::Second),
];

/// One of the six Möbius maps permuting {0, 1, ∞}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnharmonicMap {
    /// z
    Identity,
    /// 1 − z
    Reflect,
    /// 1/z
    Invert,
    /// z/(z − 1)
    Swap1Inf,
    /// 1/(1 − z)
    Rotate,
    /// (z − 1)/z
    RotateInverse,
}

impl AnharmonicMap {
    pub const ALL: [AnharmonicMap; 6] = [
        AnharmonicMap::Identity,
        AnharmonicMap::Reflect,
        AnharmonicMap::Invert,
        AnharmonicMap::Swap1Inf,
        AnharmonicMap::Rotate,
        AnharmonicMap::RotateInverse,
    ];

    /// Coefficients (a, b, c, d) of z ↦ (az + b)/(cz + d).
    fn coefficients(self) -> (f64, f64, f64, f64) {
        match self {
            AnharmonicMap::Identity => (1.0, 0.0, 0.0, 1.0),
            AnharmonicMap::Reflect => (-1.0, 1.0, 0.0, 1.0),
            AnharmonicMap::Invert => (0.0, 1.0, 1.0, 0.0),
            AnharmonicMap::Swap1Inf => (1.0, 0.0, 1.0, -1.0),
            AnharmonicMap::Rotate => (0.0, 1.0, -1.0, 1.0),
            AnharmonicMap::RotateInverse => (1.0, -1.0, 1.0, 0.0),
        }
    }

    pub fn inverse(self) -> AnharmonicMap {
        match self {
            AnharmonicMap::Rotate => AnharmonicMap::RotateInverse,
            AnharmonicMap::RotateInverse => AnharmonicMap::Rotate,
            other => other,
        }
    }

    pub fn apply(self, z: Complex64) -> Complex64 {
        let (a, b, c, d) = self.coefficients();
        (z * a + b) / (z * c + d)
    }

    pub fn derivative(self, z: Complex64) -> Complex64 {
        let (a, b, c, d) = self.coefficients();
        let denom = z * c + d;
        Complex64::new(a * d - b * c, 0.0) / (denom * denom)
    }
}

/// The region {Re λ ≤ ½, |λ − 1| ≤ 1} used as fundamental domain.
pub fn in_fundamental_domain(lambda: Complex64) -> bool {
    lambda.re <= 0.5 + DOMAIN_SLACK && (lambda - 1.0).norm() <= 1.0 + DOMAIN_SLACK
}

/// Modular change of coordinates bringing λ into the fundamental domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundamentalDomainReduction {
    map: AnharmonicMap,
    original: Complex64,
    reduced: Complex64,
}

impl FundamentalDomainReduction {
    pub fn new(lambda: Complex64) -> Result<Self> {
        if lambda.norm() == 0.0 || (lambda - 1.0).norm() == 0.0 {
            return Err(HolonomyError::InvalidParameter(format!(
                "lambda must differ from 0 and 1 (got {lambda})"
            )));
        }
        let map = AnharmonicMap::ALL
            .into_iter()
            .find(|map| in_fundamental_domain(map.apply(lambda)))
            .ok_or_else(|| {
                HolonomyError::InvalidParameter(format!(
                    "no modular image of lambda = {lambda} lies in the fundamental domain"
                ))
            })?;
        let reduced = map.apply(lambda);
        debug!(%lambda, %reduced, ?map, "reduced cross-ratio to fundamental domain");
        Ok(Self {
            map,
            original: lambda,
            reduced,
        })
    }

    pub fn map(&self) -> AnharmonicMap {
        self.map
    }

    pub fn original_lambda(&self) -> Complex64 {
        self.original
    }

    pub fn reduced_lambda(&self) -> Complex64 {
        self.reduced
    }

    pub fn is_identity(&self) -> bool {
        self.map == AnharmonicMap::Identity
    }

    /// The connection q' on the reduced sphere with q = φ*q'.
    pub fn reduce_connection(&self, connection: &ProjectiveConnection) -> Result<ProjectiveConnection> {
        if self.is_identity() {
            return Ok(*connection);
        }
        // Sample above the fundamental domain, away from every puncture.
        let w = Complex64::new(0.3, 1.7);
        let z = self.map.inverse().apply(w);
        let dphi = self.map.derivative(z);
        let q_reduced = connection.quadratic_differential(z) / (dphi * dphi);
        let accessory = ProjectiveConnection::accessory_from_value(self.reduced, w, q_reduced);
        ProjectiveConnection::new(self.reduced, accessory)
    }

    /// Whether the generators need the reduced loop around {0, 1}.
    pub fn uses_third_loop(&self) -> bool {
        self.generator_words()
            .iter()
            .any(|word| word.reduced_loop == ReducedLoop::Third)
    }

    /// Whether [`ReducedLoop::Third`] passes above the reduced λ.
    pub fn third_loop_passes_above(&self) -> bool {
        self.reduced.im < 0.0
    }

    /// Reduced loops whose monodromy, in a common frame, is conjugate to the
    /// pair of loops around {0, λ} and {λ, 1} at the original λ.
    ///
    /// The map sends the segments [0, λ] and [λ, 1] to arcs that may wind
    /// around other punctures of the reduced sphere; each entry names the
    /// loop bounding the image arc. For Invert and Rotate that depends on
    /// the side of the real axis holding the reduced λ.
    pub fn generator_words(&self) -> [LoopWord; 2] {
        use LoopWord as W;
        use ReducedLoop::{First, Second, Third};
        let upper = !self.third_loop_passes_above();
        match self.map {
            AnharmonicMap::Identity => DIRECT_WORDS,
            AnharmonicMap::Reflect => [W::forward(Second), W::backward(First)],
            AnharmonicMap::Invert if upper => [W::forward(Third), W::backward(Second)],
            AnharmonicMap::Invert => [W::forward(Third), W::forward(Second)],
            AnharmonicMap::Swap1Inf => [W::forward(First), W::forward(Third)],
            AnharmonicMap::Rotate if upper => [W::forward(Second), W::forward(Third)],
            AnharmonicMap::Rotate => [W::forward(Second), W::backward(Third)],
            AnharmonicMap::RotateInverse => [W::forward(Third), W::backward(First)],
        }
    }
}

/// Operations recorded while reducing τ; each is an involution on λ.
#[derive(Debug, Clone, Copy)]
enum TauMove {
    /// τ ↦ τ ± 1, λ ↦ λ/(λ − 1)
    Shift,
    /// τ ↦ −1/τ, λ ↦ 1 − λ
    Flip,
}

fn theta_lambda(tau: Complex64) -> Complex64 {
    let i_pi_tau = Complex64::new(0.0, PI) * tau;
    let q = i_pi_tau.exp();
    let q_quarter = (i_pi_tau * 0.25).exp();

    // θ₂ = 2 q^{1/4} Σ q^{n(n+1)}, θ₃ = 1 + 2 Σ q^{n²}
    let mut theta2 = Complex64::new(0.0, 0.0);
    let mut theta3 = Complex64::new(1.0, 0.0);
    for n in 0..64i32 {
        let t2 = q.powi(n * (n + 1));
        theta2 += t2;
        if n > 0 {
            theta3 += q.powi(n * n) * 2.0;
        }
        if n > 1 && t2.norm() < 1e-18 {
            break;
        }
    }
    theta2 *= q_quarter * 2.0;
    let ratio = theta2 / theta3;
    let r2 = ratio * ratio;
    r2 * r2
}

/// The elliptic modular function λ(τ) = (θ₂(τ)/θ₃(τ))⁴ on the upper half plane,
/// normalised so that λ(i) = ½.
pub fn modular_lambda(tau: Complex64) -> Result<Complex64> {
    if !(tau.im > 0.0) || !tau.re.is_finite() || !tau.im.is_finite() {
        return Err(HolonomyError::InvalidParameter(format!(
            "tau must lie in the upper half plane (got {tau})"
        )));
    }

    // beyond 2^52 the parity of the shift is lost
    if tau.re.abs() >= MAX_TAU_SHIFT {
        return Err(HolonomyError::InvalidParameter(format!(
            "tau = {tau} has a real part too large to reduce"
        )));
    }

    let mut t = tau;
    let mut moves = Vec::new();
    let mut reduced = false;
    for _ in 0..MAX_TAU_MOVES {
        let shift = t.re.round();
        if shift != 0.0 {
            t -= shift;
            if shift % 2.0 != 0.0 {
                moves.push(TauMove::Shift);
            }
        }
        if t.norm_sqr() < 1.0 - 1e-15 {
            t = -1.0 / t;
            moves.push(TauMove::Flip);
        } else {
            reduced = true;
            break;
        }
    }
    if !reduced {
        return Err(HolonomyError::InvalidParameter(format!(
            "tau = {tau} did not reach the modular fundamental domain in {MAX_TAU_MOVES} moves"
        )));
    }

    let mut lambda = theta_lambda(t);
    for mv in moves.iter().rev() {
        lambda = match mv {
            TauMove::Shift => lambda / (lambda - 1.0),
            TauMove::Flip => 1.0 - lambda,
        };
    }
    Ok(lambda)
}
