use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Real field the integrators work over; constants are converted with
/// `FromPrimitive`.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order system x' = f(t, x) on a real state vector.
///
/// Complex systems are flattened into interleaved (re, im) pairs.
pub trait DynamicalSystem<T: Scalar> {
    fn dimension(&self) -> usize;

    /// Writes f(t, x) into `out`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A solver that attempts a single step and reports how far it is from
/// meeting the requested tolerance.
pub trait AdaptiveSteppable<T: Scalar> {
    /// Order of the error estimator, used to scale step size changes.
    fn order(&self) -> usize;

    /// Attempts a step of size dt from (t, state), writing the proposal into
    /// `proposal`. Returns the weighted RMS error norm; a value at most one
    /// means the step meets the tolerance.
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        abs_tol: T,
        rel_tol: T,
        proposal: &mut [T],
    ) -> T;
}
