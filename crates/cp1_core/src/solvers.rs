use crate::traits::{AdaptiveSteppable, DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Why an adaptive integration stopped before reaching its end point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("step budget of {steps} attempts exhausted at t = {t}")]
    StepBudgetExceeded { steps: usize, t: f64 },

    #[error("step size {step:e} fell below the minimum at t = {t}")]
    StepSizeUnderflow { step: f64, t: f64 },

    #[error("solution became non-finite at t = {t}")]
    NonFiniteState { t: f64 },

    #[error("solution basis is singular; cannot extract monodromy")]
    SingularBasis,
}

fn cst<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

fn to_f64<T: Scalar>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Tsitouras 5/4 Solver with its embedded error estimate.
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> AdaptiveSteppable<T> for Tsit5<T> {
    fn order(&self) -> usize {
        4
    }

    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t0: T,
        state: &[T],
        dt: T,
        abs_tol: T,
        rel_tol: T,
        proposal: &mut [T],
    ) -> T {
        // Tsit5 Coefficients
        let c2 = cst::<T>(0.161);
        let c3 = cst::<T>(0.327);
        let c4 = cst::<T>(0.9);
        let c5 = cst::<T>(0.9800255409045097);

        let a21 = cst::<T>(0.161);

        let a31 = cst::<T>(-0.008480655492356989);
        let a32 = cst::<T>(0.335480655492357);

        let a41 = cst::<T>(2.897153057105493);
        let a42 = cst::<T>(-6.359448489975075);
        let a43 = cst::<T>(4.3622954328695815);

        let a51 = cst::<T>(5.325864828439257);
        let a52 = cst::<T>(-11.748883564062828);
        let a53 = cst::<T>(7.4955393428898365);
        let a54 = cst::<T>(-0.09249506636175525);

        let a61 = cst::<T>(5.86145544294642);
        let a62 = cst::<T>(-12.92096931784711);
        let a63 = cst::<T>(8.159367898576159);
        let a64 = cst::<T>(-0.071584973281401);
        let a65 = cst::<T>(-0.028269050394068383);

        // b coefficients (5th order), also the seventh stage row
        let b1 = cst::<T>(0.09646076681806523);
        let b2 = cst::<T>(0.01);
        let b3 = cst::<T>(0.4798896504144996);
        let b4 = cst::<T>(1.379008574103742);
        let b5 = cst::<T>(-3.290069515436081);
        let b6 = cst::<T>(2.324710524099774);

        // difference between the 5th and embedded 4th order weights
        let e1 = cst::<T>(-0.00178001105222577714);
        let e2 = cst::<T>(-0.0008164344596567469);
        let e3 = cst::<T>(0.007880878010261995);
        let e4 = cst::<T>(-0.1447110071732629);
        let e5 = cst::<T>(0.5823571654525552);
        let e6 = cst::<T>(-0.45808210592918697);
        let e7 = cst::<T>(0.015151515151515152);

        let n = state.len();

        // k1
        system.apply(t0, state, &mut self.k1);

        // k2
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t0 + c2 * dt, &self.tmp, &mut self.k2);

        // k3
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t0 + c3 * dt, &self.tmp, &mut self.k3);

        // k4
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t0 + c4 * dt, &self.tmp, &mut self.k4);

        // k5
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t0 + c5 * dt, &self.tmp, &mut self.k5);

        // k6
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k6);

        // Proposed state
        for i in 0..n {
            proposal[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b2 * self.k2[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }

        // k7 (FSAL stage) feeds the error estimate
        system.apply(t0 + dt, proposal, &mut self.k7);

        let mut sum = T::zero();
        for i in 0..n {
            let err = dt
                * (e1 * self.k1[i]
                    + e2 * self.k2[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = abs_tol + rel_tol * state[i].abs().max(proposal[i].abs());
            let ratio = err / scale;
            sum = sum + ratio * ratio;
        }
        if n == 0 {
            return T::zero();
        }
        (sum / cst::<T>(n as f64)).sqrt()
    }
}

/// Step-size control for [`integrate_adaptive`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdaptiveOptions {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub initial_step: f64,
    pub min_step: f64,
    /// Accepted plus rejected step attempts allowed for one call.
    pub max_steps: usize,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            abs_tol: 1e-8,
            rel_tol: 1e-8,
            initial_step: 1e-2,
            min_step: 1e-14,
            max_steps: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Integrates `state` from t0 to t1 (t1 > t0), adapting the step to the
/// tolerance. On success `state` holds the solution at exactly t1.
pub fn integrate_adaptive<T, S>(
    stepper: &mut S,
    system: &impl DynamicalSystem<T>,
    t0: T,
    t1: T,
    state: &mut [T],
    options: &AdaptiveOptions,
) -> Result<IntegrationStats, SolverError>
where
    T: Scalar,
    S: AdaptiveSteppable<T>,
{
    let mut stats = IntegrationStats::default();
    if !(t1 > t0) {
        return Ok(stats);
    }

    let safety = cst::<T>(0.9);
    let min_factor = cst::<T>(0.2);
    let max_factor = cst::<T>(5.0);
    let exponent = -(T::one() / cst::<T>((stepper.order() + 1) as f64));
    let abs_tol = cst::<T>(options.abs_tol);
    let rel_tol = cst::<T>(options.rel_tol);
    let min_step = cst::<T>(options.min_step);

    let mut proposal = vec![T::zero(); state.len()];
    let mut t = t0;
    let mut dt = cst::<T>(options.initial_step).min(t1 - t0);

    while t < t1 {
        if stats.accepted + stats.rejected >= options.max_steps {
            return Err(SolverError::StepBudgetExceeded {
                steps: options.max_steps,
                t: to_f64(t),
            });
        }

        let remaining = t1 - t;
        let last = dt >= remaining;
        let h = if last { remaining } else { dt };
        let err = stepper.try_step(system, t, state, h, abs_tol, rel_tol, &mut proposal);

        if err.is_finite() && err <= T::one() {
            if proposal.iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NonFiniteState { t: to_f64(t) });
            }
            state.copy_from_slice(&proposal);
            t = if last { t1 } else { t + h };
            stats.accepted += 1;
        } else {
            stats.rejected += 1;
            trace!(t = to_f64(t), step = to_f64(h), err = to_f64(err), "step rejected");
        }

        let factor = if !err.is_finite() {
            min_factor
        } else if err == T::zero() {
            max_factor
        } else {
            (safety * err.powf(exponent)).max(min_factor).min(max_factor)
        };
        dt = h * factor;

        if t < t1 && dt < min_step {
            return Err(SolverError::StepSizeUnderflow {
                step: to_f64(dt),
                t: to_f64(t),
            });
        }
    }

    Ok(stats)
}
