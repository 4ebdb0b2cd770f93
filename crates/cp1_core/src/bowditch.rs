//! Bounded discreteness search over the Farey tessellation.
//!
//! Every complementary triangle of the Farey tessellation corresponds to a
//! triple of simple closed curves on the punctured torus, and the traces of
//! neighbouring triples are related by the Markov move z' = xy − z. Starting
//! from the triple given by the generators, the search walks the tree of
//! triangles and checks each new trace against a Jorgensen-type lower bound.
//!
//! For a simple curve A, the commutator K = [A, B] is parabolic, and
//! Jorgensen's inequality for ⟨A, K⟩ reduces to 4|tr A|² ≥ 1. A trace with
//! |tr A| < ½ therefore witnesses indiscreteness. Branches whose traces all
//! exceed 2 and keep growing are closed.

use crate::types::TraceTriple;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discreteness {
    Discrete,
    Indiscrete,
    Uncertain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: Discreteness,
    pub triangles_examined: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub max_triangles: usize,
    /// Triangles deeper than this are not subdivided.
    pub max_depth: usize,
    /// Traces smaller than this in modulus violate discreteness.
    pub jorgensen_bound: f64,
    /// Traces larger than this in modulus are loxodromic or hyperbolic.
    pub escape_bound: f64,
    /// Width of the band around `jorgensen_bound`, and the imaginary part
    /// below which a trace counts as real.
    pub margin: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            max_triangles: 10_000,
            max_depth: 64,
            jorgensen_bound: 0.5,
            escape_bound: 2.0,
            margin: 1e-9,
        }
    }
}

impl ClassifierSettings {
    pub fn with_budget(max_triangles: usize) -> Self {
        Self {
            max_triangles,
            ..Self::default()
        }
    }
}

/// Slope p/q of a simple closed curve, with q > 0, or q = 0 and p > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slope {
    pub p: i64,
    pub q: i64,
}

impl Slope {
    pub const fn new(p: i64, q: i64) -> Self {
        if q < 0 || (q == 0 && p < 0) {
            Self { p: -p, q: -q }
        } else {
            Self { p, q }
        }
    }

    fn add(self, other: Slope) -> Slope {
        Slope::new(self.p + other.p, self.q + other.q)
    }

    fn sub(self, other: Slope) -> Slope {
        Slope::new(self.p - other.p, self.q - other.q)
    }
}

/// One complementary triangle of the Farey tessellation together with the
/// traces of its three curves.
#[derive(Debug, Clone, Copy)]
struct FareyTriangle {
    slopes: [Slope; 3],
    traces: [Complex64; 3],
    /// Index of the curve that differs from the parent; `None` at the root.
    newest: Option<usize>,
    depth: usize,
}

impl FareyTriangle {
    fn root(traces: &TraceTriple) -> Self {
        Self {
            slopes: [Slope::new(1, 0), Slope::new(0, 1), Slope::new(1, 1)],
            traces: traces.to_array(),
            newest: None,
            depth: 0,
        }
    }

    /// Neighbour across the edge opposite curve `i`.
    fn flip(&self, i: usize) -> Self {
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        let (sj, sk) = (self.slopes[j], self.slopes[k]);
        let sum = sj.add(sk);
        let mut slopes = self.slopes;
        slopes[i] = if sum == self.slopes[i] { sj.sub(sk) } else { sum };

        let mut traces = self.traces;
        traces[i] = self.traces[j] * self.traces[k] - self.traces[i];

        Self {
            slopes,
            traces,
            newest: Some(i),
            depth: self.depth + 1,
        }
    }

    fn children(&self) -> Vec<FareyTriangle> {
        (0..3)
            .filter(|&i| Some(i) != self.newest)
            .map(|i| self.flip(i))
            .collect()
    }

    fn escaped(&self, bound: f64) -> bool {
        let Some(newest) = self.newest else {
            return false;
        };
        let largest = self.traces[newest].norm();
        self.traces.iter().all(|t| t.norm() > bound)
            && self.traces.iter().all(|t| t.norm() <= largest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceCheck {
    Pass,
    Borderline,
    Violation,
}

fn check_trace(t: Complex64, settings: &ClassifierSettings) -> TraceCheck {
    let modulus = t.norm();
    if modulus < settings.jorgensen_bound - settings.margin {
        return TraceCheck::Violation;
    }
    let near_bound = (modulus - settings.jorgensen_bound).abs() <= settings.margin;
    let elliptic = t.im.abs() <= settings.margin && t.re.abs() < settings.escape_bound;
    if near_bound || elliptic {
        TraceCheck::Borderline
    } else {
        TraceCheck::Pass
    }
}

/// Classifies the punctured-torus group with the given trace triple,
/// examining at most `max_triangles` Farey triangles.
pub fn classify(traces: &TraceTriple, max_triangles: usize) -> Classification {
    classify_with(traces, &ClassifierSettings::with_budget(max_triangles))
}

pub fn classify_with(traces: &TraceTriple, settings: &ClassifierSettings) -> Classification {
    let result = |kind, triangles_examined| Classification {
        kind,
        triangles_examined,
    };

    if !traces.is_finite() {
        return result(Discreteness::Uncertain, 0);
    }

    let mut stack = vec![FareyTriangle::root(traces)];
    let mut examined = 0;
    let mut borderline = false;

    while let Some(triangle) = stack.pop() {
        if examined >= settings.max_triangles {
            debug!(examined, pending = stack.len() + 1, "triangle budget reached");
            return result(Discreteness::Uncertain, examined);
        }
        examined += 1;

        let checks: Vec<TraceCheck> = match triangle.newest {
            None => triangle.traces.iter().map(|t| check_trace(*t, settings)).collect(),
            Some(i) => vec![check_trace(triangle.traces[i], settings)],
        };
        if checks.contains(&TraceCheck::Violation) {
            debug!(
                examined,
                depth = triangle.depth,
                slopes = ?triangle.slopes,
                "Jorgensen bound violated"
            );
            return result(Discreteness::Indiscrete, examined);
        }
        if checks.contains(&TraceCheck::Borderline) {
            trace!(depth = triangle.depth, slopes = ?triangle.slopes, "borderline trace");
            borderline = true;
        }

        if triangle.escaped(settings.escape_bound) {
            continue;
        }
        if triangle.depth >= settings.max_depth {
            borderline = true;
            continue;
        }
        stack.extend(triangle.children());
    }

    let kind = if borderline {
        Discreteness::Uncertain
    } else {
        Discreteness::Discrete
    };
    result(kind, examined)
}

#[cfg(test)]
mod tests {
    use super::{
        check_trace, classify, ClassifierSettings, Discreteness, FareyTriangle, Slope, TraceCheck,
    };
    use crate::t11::t11_from_s04;
    use crate::types::TraceTriple;
    use num_complex::Complex64;

    fn real(x: f64) -> Complex64 {
        Complex64::new(x, 0.0)
    }

    fn triple(x: f64, y: f64, z: f64) -> TraceTriple {
        TraceTriple::new(real(x), real(y), real(z))
    }

    fn newest_slope(triangle: &FareyTriangle) -> Slope {
        triangle.slopes[triangle.newest.expect("child has a newest curve")]
    }

    #[test]
    fn markov_moves_preserve_the_markov_residual() {
        let root = FareyTriangle::root(&triple(3.0, 3.0, 3.0));
        for child in root.children() {
            let t = TraceTriple::from_slice(&child.traces).expect("three traces");
            assert!(t.markov_residual().norm() < 1e-9);
            for grandchild in child.children() {
                let g = TraceTriple::from_slice(&grandchild.traces).expect("three traces");
                assert!(g.markov_residual().norm() < 1e-9);
            }
        }
    }

    #[test]
    fn children_are_farey_neighbours() {
        let root = FareyTriangle::root(&triple(3.0, 3.0, 3.0));
        let slopes: Vec<Slope> = root.children().iter().map(newest_slope).collect();
        assert_eq!(slopes, vec![Slope::new(1, 2), Slope::new(2, 1), Slope::new(1, -1)]);

        let child = root.flip(2);
        let grandchildren: Vec<Slope> = child.children().iter().map(newest_slope).collect();
        assert_eq!(grandchildren, vec![Slope::new(-1, 2), Slope::new(-2, 1)]);
        for c in child.children() {
            let [a, b, d] = c.slopes;
            for (s, t) in [(a, b), (b, d), (a, d)] {
                assert_eq!((s.p * t.q - s.q * t.p).abs(), 1);
            }
        }
    }

    #[test]
    fn hex_torus_is_discrete() {
        let result = classify(&triple(3.0, 3.0, 3.0), 1000);
        assert_eq!(result.kind, Discreteness::Discrete);
        assert_eq!(result.triangles_examined, 4);
    }

    #[test]
    fn square_torus_is_discrete() {
        let s = 8f64.sqrt();
        let result = classify(&triple(s, s, 4.0), 1000);
        assert_eq!(result.kind, Discreteness::Discrete);
        assert_eq!(result.triangles_examined, 4);
    }

    #[test]
    fn square_sphere_traces_classify_discrete() {
        let torus = t11_from_s04(&[real(-6.0), real(-6.0), real(-14.0)]).expect("torus traces");
        assert_eq!(classify(&torus, 1000).kind, Discreteness::Discrete);
    }

    #[test]
    fn small_trace_is_indiscrete() {
        let result = classify(&triple(0.3, 3.0, 3.0), 1000);
        assert_eq!(result.kind, Discreteness::Indiscrete);
        assert_eq!(result.triangles_examined, 1);
    }

    #[test]
    fn violation_found_below_the_root() {
        // z' = xy − z = 2.8 · 2.8 − 7.6 = 0.24 on the child replacing z.
        let result = classify(&triple(2.8, 2.8, 7.6), 1000);
        assert_eq!(result.kind, Discreteness::Indiscrete);
        assert!(result.triangles_examined > 1);
    }

    #[test]
    fn elliptic_trace_is_uncertain() {
        let z = Complex64::new(1.5, 31f64.sqrt() / 2.0);
        for z in [z, z.conj()] {
            let traces = TraceTriple::new(real(1.0), real(3.0), z);
            assert!(traces.markov_residual().norm() < 1e-9);
            let result = classify(&traces, 2000);
            assert_eq!(result.kind, Discreteness::Uncertain);
            assert!(result.triangles_examined >= 1);
        }
    }

    #[test]
    fn budget_exhaustion_is_uncertain() {
        let result = classify(&triple(3.0, 3.0, 3.0), 1);
        assert_eq!(result.kind, Discreteness::Uncertain);
        assert_eq!(result.triangles_examined, 1);
    }

    #[test]
    fn trace_checks_near_the_bounds() {
        let settings = ClassifierSettings {
            margin: 1e-6,
            ..ClassifierSettings::with_budget(100)
        };
        assert_eq!(check_trace(Complex64::new(0.0, 0.5), &settings), TraceCheck::Borderline);
        assert_eq!(check_trace(real(0.49), &settings), TraceCheck::Violation);
        assert_eq!(check_trace(real(-1.0), &settings), TraceCheck::Borderline);
        assert_eq!(check_trace(real(2.0), &settings), TraceCheck::Pass);
        assert_eq!(check_trace(Complex64::new(1.0, 1.0), &settings), TraceCheck::Pass);
    }

    #[test]
    fn non_finite_traces_are_uncertain() {
        let result = classify(&triple(f64::NAN, 3.0, 3.0), 1000);
        assert_eq!(result.kind, Discreteness::Uncertain);
        assert_eq!(result.triangles_examined, 0);
    }

    #[test]
    fn classification_is_deterministic() {
        let sphere = [
            Complex64::new(-222.533070, -262.929905),
            Complex64::new(1272.251270, -2334.830978),
            Complex64::new(-2.848143, -7.056932),
        ];
        let torus = t11_from_s04(&sphere).expect("torus traces");
        let first = classify(&torus, 5000);
        let second = classify(&torus, 5000);
        assert_eq!(first, second);
        assert!(first.triangles_examined <= 5000);
    }
}
