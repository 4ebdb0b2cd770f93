//! Analytic continuation of solutions of the developing-map equation along
//! polygonal paths.

use crate::connection::{EdgeFlow, ProjectiveConnection};
use crate::contours::Contour;
use crate::error::{HolonomyError, Result};
use crate::solvers::{integrate_adaptive, AdaptiveOptions, SolverError, Tsit5};
use crate::types::MonodromyMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Basis of two solutions at a point: [[w₁, w₂], [w₁', w₂']].
pub type SolutionBasis = MonodromyMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuationSettings {
    /// Absolute and relative tolerance of the stepper.
    pub tolerance: f64,
    /// Step attempts allowed per edge.
    pub max_steps: usize,
    /// First trial step, as a fraction of the edge.
    pub initial_step: f64,
    pub min_step: f64,
    /// Edges closer than this to a puncture are refused.
    pub singular_clearance: f64,
}

impl Default for ContinuationSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_steps: 100_000,
            initial_step: 1e-2,
            min_step: 1e-14,
            singular_clearance: 1e-10,
        }
    }
}

impl ContinuationSettings {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    fn adaptive_options(&self) -> AdaptiveOptions {
        AdaptiveOptions {
            abs_tol: self.tolerance,
            rel_tol: self.tolerance,
            initial_step: self.initial_step,
            min_step: self.min_step,
            max_steps: self.max_steps,
        }
    }
}

fn flatten(basis: &SolutionBasis) -> [f64; EdgeFlow::DIM] {
    let mut state = [0.0; EdgeFlow::DIM];
    for row in 0..2 {
        for col in 0..2 {
            let v = basis[(row, col)];
            state[4 * row + 2 * col] = v.re;
            state[4 * row + 2 * col + 1] = v.im;
        }
    }
    state
}

fn unflatten(state: &[f64]) -> SolutionBasis {
    SolutionBasis::from_fn(|row, col| {
        Complex64::new(state[4 * row + 2 * col], state[4 * row + 2 * col + 1])
    })
}

/// Carries `basis` along one edge.
fn continue_edge(
    connection: &ProjectiveConnection,
    stepper: &mut Tsit5<f64>,
    start: Complex64,
    end: Complex64,
    basis: &SolutionBasis,
    settings: &ContinuationSettings,
) -> Result<SolutionBasis> {
    let (puncture, distance) = connection.nearest_puncture(start, end);
    if distance < settings.singular_clearance {
        warn!(%start, %end, %puncture, distance, "edge passes through a puncture");
        return Err(HolonomyError::SingularApproach { puncture, distance });
    }

    let flow = EdgeFlow::new(connection, start, end);
    let mut state = flatten(basis);
    integrate_adaptive(
        stepper,
        &flow,
        0.0,
        1.0,
        &mut state,
        &settings.adaptive_options(),
    )
    .map_err(|err| {
        warn!(%start, %end, error = %err, "continuation failed on edge");
        HolonomyError::from(err)
    })?;
    Ok(unflatten(&state))
}

/// Continues `basis` along the open polyline `path` and returns the basis
/// reached at its last vertex.
pub fn transport(
    connection: &ProjectiveConnection,
    path: &[Complex64],
    basis: &SolutionBasis,
    settings: &ContinuationSettings,
) -> Result<SolutionBasis> {
    let mut stepper = Tsit5::new(EdgeFlow::DIM);
    let mut current = *basis;
    for pair in path.windows(2) {
        if pair[0] == pair[1] {
            continue;
        }
        current = continue_edge(connection, &mut stepper, pair[0], pair[1], &current, settings)?;
    }
    Ok(current)
}

/// Monodromy of the closed `contour`, expressed in `basis` (the basis of
/// solutions given at the contour's first vertex).
///
/// Continuation around the loop turns `basis` into `basis · M`; M is
/// obtained by solving that linear system.
pub fn monodromy(
    connection: &ProjectiveConnection,
    contour: &Contour,
    basis: &SolutionBasis,
    settings: &ContinuationSettings,
) -> Result<MonodromyMatrix> {
    let mut stepper = Tsit5::new(EdgeFlow::DIM);
    let mut current = *basis;
    for (start, end) in contour.edges() {
        if start == end {
            continue;
        }
        current = continue_edge(connection, &mut stepper, start, end, &current, settings)?;
    }
    basis
        .lu()
        .solve(&current)
        .ok_or(HolonomyError::ContinuationFailure(SolverError::SingularBasis))
}

#[cfg(test)]
mod tests {
    use super::{monodromy, transport, ContinuationSettings, SolutionBasis};
    use crate::connection::ProjectiveConnection;
    use crate::contours::{simple, Contour};
    use crate::error::HolonomyError;
    use crate::types::trace;
    use num_complex::Complex64;

    fn square(center: Complex64, half: f64) -> Contour {
        Contour::new(vec![
            center + Complex64::new(half, half),
            center + Complex64::new(-half, half),
            center + Complex64::new(-half, -half),
            center + Complex64::new(half, -half),
        ])
        .expect("square contour")
    }

    #[test]
    fn loop_around_one_puncture_is_minus_parabolic() {
        let conn = ProjectiveConnection::new(Complex64::new(0.5, 0.6), Complex64::new(0.3, -0.2))
            .expect("connection");
        let m = monodromy(
            &conn,
            &square(Complex64::new(0.0, 0.0), 0.2),
            &SolutionBasis::identity(),
            &ContinuationSettings::default(),
        )
        .expect("monodromy");
        assert!((trace(&m) + 2.0).norm() < 1e-6);
        assert!((m.determinant() - 1.0).norm() < 1e-6);
    }

    #[test]
    fn loop_around_no_puncture_is_trivial() {
        let conn = ProjectiveConnection::new(Complex64::new(0.5, 0.6), Complex64::new(0.3, -0.2))
            .expect("connection");
        let m = monodromy(
            &conn,
            &square(Complex64::new(2.0, 2.0), 0.5),
            &SolutionBasis::identity(),
            &ContinuationSettings::default(),
        )
        .expect("monodromy");
        assert!((m - SolutionBasis::identity()).norm() < 1e-7);
    }

    #[test]
    fn trace_does_not_depend_on_the_basis() {
        let conn = ProjectiveConnection::new(Complex64::new(0.4, 0.5), Complex64::new(1.0, 0.5))
            .expect("connection");
        let settings = ContinuationSettings::default();
        let gamma = &simple(conn.lambda(), 1).expect("contour")[0];
        let m = monodromy(&conn, gamma, &SolutionBasis::identity(), &settings).expect("identity");
        let other = SolutionBasis::new(
            Complex64::new(2.0, 0.0),
            Complex64::new(1.0, 1.0),
            Complex64::new(0.0, 1.0),
            Complex64::new(1.0, 0.0),
        );
        let n = monodromy(&conn, gamma, &other, &settings).expect("other basis");
        assert!((trace(&m) - trace(&n)).norm() < 1e-6);
    }

    #[test]
    fn transport_there_and_back_is_identity() {
        let conn = ProjectiveConnection::new(Complex64::new(0.5, 0.5), Complex64::new(0.0, 0.0))
            .expect("connection");
        let settings = ContinuationSettings::default();
        let a = Complex64::new(-0.5, 1.0);
        let b = Complex64::new(1.5, 1.0);
        let there = transport(&conn, &[a, b], &SolutionBasis::identity(), &settings)
            .expect("outbound");
        let back = transport(&conn, &[b, a], &there, &settings).expect("return");
        assert!((back - SolutionBasis::identity()).norm() < 1e-7);
    }

    #[test]
    fn edge_through_a_puncture_is_refused() {
        let conn = ProjectiveConnection::new(Complex64::new(0.5, 0.5), Complex64::new(0.0, 0.0))
            .expect("connection");
        let err = transport(
            &conn,
            &[Complex64::new(-1.0, 0.0), Complex64::new(0.5, 0.0)],
            &SolutionBasis::identity(),
            &ContinuationSettings::default(),
        )
        .expect_err("path hits the puncture at 0");
        assert!(matches!(err, HolonomyError::SingularApproach { .. }));
        assert!(err.is_continuation_failure());
    }

    #[test]
    fn step_budget_failure_is_reported() {
        let conn = ProjectiveConnection::new(Complex64::new(0.5, 0.5), Complex64::new(0.0, 0.0))
            .expect("connection");
        let settings = ContinuationSettings {
            max_steps: 2,
            ..ContinuationSettings::default()
        };
        let err = monodromy(
            &conn,
            &square(Complex64::new(0.0, 0.0), 0.2),
            &SolutionBasis::identity(),
            &settings,
        )
        .expect_err("two steps cannot cover an edge");
        assert!(matches!(err, HolonomyError::ContinuationFailure(_)));
    }
}
