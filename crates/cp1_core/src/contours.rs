//! Integration contours around the punctures {0, 1, λ} of the four-punctured sphere.
//!
//! Two families are provided:
//! - **Simple**: 4, 4 and 8 vertices. Valid for λ in the rectangle
//!   [ε, 1 − ε] × [−B, B]; fails when λ is very close to the imaginary axis.
//! - **Advanced**: more vertices and more logic, valid for λ in
//!   ([−0.2, 0.75] × [−B, B]) minus the slit [−0.2, 0]. This region contains a
//!   fundamental domain for the modular group but excludes some values that
//!   the simple contours handle.
//!
//! Contour 1 always encloses {0, λ}, contour 2 encloses {λ, 1} and contour 3
//! encloses {0, 1} with λ outside. Degenerate boxes outside the documented
//! regions are not detected.

use crate::error::{HolonomyError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MARGIN: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContourFamily {
    Simple,
    Advanced,
}

/// A closed polygon; the last vertex joins back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    vertices: Vec<Complex64>,
}

impl Contour {
    pub fn new(vertices: Vec<Complex64>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(HolonomyError::ContourValidity(format!(
                "a closed contour needs at least three vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
            return Err(HolonomyError::ContourValidity(
                "contour vertices must be finite".to_string(),
            ));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Complex64] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn start(&self) -> Complex64 {
        self.vertices[0]
    }

    /// Edges in traversal order, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Complex64, Complex64)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Number of times the contour winds counterclockwise around `point`.
    pub fn winding_number(&self, point: Complex64) -> i32 {
        let total: f64 = self
            .edges()
            .map(|(a, b)| ((b - point) / (a - point)).arg())
            .sum();
        (total / (2.0 * PI)).round() as i32
    }

    /// Twice the signed area; positive for counterclockwise traversal.
    fn signed_area2(&self) -> f64 {
        self.edges().map(|(a, b)| a.re * b.im - b.re * a.im).sum()
    }

    /// The same loop traversed counterclockwise.
    pub fn counterclockwise(&self) -> Contour {
        let mut vertices = self.vertices.clone();
        if self.signed_area2() < 0.0 {
            vertices.reverse();
        }
        Contour { vertices }
    }

    /// Mirror image in the real axis. Orientation flips.
    pub fn conjugate(&self) -> Contour {
        Contour {
            vertices: self.vertices.iter().map(|v| v.conj()).collect(),
        }
    }

    /// The same loop, re-based at its highest vertex (rightmost on ties).
    pub fn starting_at_top(&self) -> Contour {
        let mut best = 0;
        for (i, v) in self.vertices.iter().enumerate() {
            let top = self.vertices[best];
            if v.im > top.im || (v.im == top.im && v.re > top.re) {
                best = i;
            }
        }
        let mut vertices = self.vertices[best..].to_vec();
        vertices.extend_from_slice(&self.vertices[..best]);
        Contour { vertices }
    }
}

fn pt(x: f64, y: f64) -> Complex64 {
    Complex64::new(x, y)
}

fn make_rect(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Contour {
    Contour {
        vertices: vec![pt(xmax, ymax), pt(xmin, ymax), pt(xmin, ymin), pt(xmax, ymin)],
    }
}

/// Vertical extent shared by the simple boxes: at least [−0.25, 0.25] and
/// always clearing λ by the margin.
fn simple_band(l: Complex64) -> (f64, f64) {
    let ymin = (-MARGIN).min(l.im - MARGIN);
    let ymax = MARGIN.max(l.im + MARGIN);
    (ymin, ymax)
}

/// Right edge of the box around {0, λ}: halfway to 1, but no further than
/// the margin past λ.
fn left_box_right_edge(l: Complex64) -> f64 {
    (0.5 * (l.re + 1.0)).min(l.re + MARGIN)
}

/// Left edge of the box around {λ, 1}: halfway from 0, but no further than
/// the margin before λ.
fn right_box_left_edge(l: Complex64) -> f64 {
    (0.5 * l.re).max(l.re - MARGIN)
}

/// Rectangular loop around 0 and λ.
pub fn simp1(l: Complex64) -> Contour {
    let (ymin, ymax) = simple_band(l);
    make_rect(-MARGIN, left_box_right_edge(l), ymin, ymax)
}

/// Rectangular loop around λ and 1.
pub fn simp2(l: Complex64) -> Contour {
    let (ymin, ymax) = simple_band(l);
    make_rect(right_box_left_edge(l), 1.0 + MARGIN, ymin, ymax)
}

/// Hexagonal loop with 0 and 1 inside and λ outside, notched from below.
pub fn simp3(l: Complex64) -> Contour {
    let (ymin, ymax) = simple_band(l);
    let xmin = -MARGIN;
    let xmax = 1.0 + MARGIN;
    let xmid1 = right_box_left_edge(l);
    let xmid2 = left_box_right_edge(l);
    Contour {
        vertices: vec![
            pt(xmax, ymax),
            pt(xmid2, ymax),
            pt(xmid2, ymin),
            pt(xmid1, ymin),
            pt(xmid1, ymax),
            pt(xmin, ymax),
            pt(xmin, ymin),
            pt(xmax, ymin),
        ],
    }
}

pub(crate) fn check_count(n: usize) -> Result<()> {
    if (1..=3).contains(&n) {
        Ok(())
    } else {
        Err(HolonomyError::ContourValidity(format!(
            "contour count must be 1, 2 or 3, got {n}"
        )))
    }
}

pub fn simple(l: Complex64, n: usize) -> Result<Vec<Contour>> {
    check_count(n)?;
    let builders: [fn(Complex64) -> Contour; 3] = [simp1, simp2, simp3];
    Ok(builders[..n].iter().map(|gamma| gamma(l)).collect())
}

fn signum(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Abscissa where the horizontal line at height `y` meets the perpendicular
/// bisector of [0, λ]. Returns ±100 when λ is nearly imaginary.
pub fn horiz_int(l: Complex64, y: f64) -> f64 {
    if l.norm() > 100.0 * l.re.abs() {
        return -100.0 * signum(l.im * y);
    }
    (-2.0 * y * l.im + l.norm_sqr()) / (2.0 * l.re)
}

/// Ordinate where the vertical line at `x` meets the perpendicular bisector
/// of [0, λ].
pub fn vert_int(l: Complex64, x: f64) -> f64 {
    (l.norm_sqr() - 2.0 * x * l.re) / (2.0 * l.im)
}

pub fn advanced(l: Complex64, n: usize) -> Result<Vec<Contour>> {
    check_count(n)?;
    let mut contours = vec![simp1(l)];
    if n == 1 {
        return Ok(contours);
    }

    // near the imaginary axis the bisector formulas use the imaginary projection
    let m = if l.re < 1e-8 { pt(0.0, l.im) } else { l };

    let ytop = 0.5f64.max(l.im + MARGIN);
    let ybot = (-0.5f64).min(l.im - MARGIN);
    let ixtop = horiz_int(m, ytop);
    let ixbot = horiz_int(m, ybot);

    // Contour 2: right of the bisector, so λ and 1 are inside and 0 is not.
    let mut gamma = vec![pt(1.25, ytop), pt(1.25, ybot)];
    if ixbot < -0.25 {
        gamma.extend([pt(-0.25, ybot), pt(-0.25, vert_int(m, -0.25))]);
    } else if ixbot > 0.5 {
        gamma.extend([pt(0.5, ybot), pt(0.5, vert_int(m, 0.5))]);
    } else {
        gamma.push(pt(ixbot, ybot));
    }
    if ixtop < -0.25 {
        gamma.extend([pt(-0.25, vert_int(m, -0.25)), pt(-0.25, ytop)]);
    } else if ixtop > 0.5 {
        gamma.extend([pt(0.5, vert_int(m, 0.5)), pt(0.5, ytop)]);
    } else {
        gamma.push(pt(ixtop, ytop));
    }
    contours.push(Contour { vertices: gamma });

    if n < 3 {
        return Ok(contours);
    }

    // Contour 3: 0 and 1 inside, λ cut out along the bisector and the
    // column at 0.75.
    let ybot = (-0.25f64).min(l.im - MARGIN);
    let ixbot = horiz_int(m, ybot);
    let mut gamma = vec![pt(-0.25, ybot), pt(1.25, ybot), pt(1.25, ytop), pt(0.75, ytop)];
    if ixbot < -0.2 {
        gamma.extend([pt(0.75, ybot), pt(-0.2, ybot), pt(-0.2, vert_int(m, -0.2))]);
    } else if ixbot > 0.75 {
        gamma.push(pt(0.75, vert_int(m, 0.75)));
    } else {
        gamma.extend([pt(0.75, ybot), pt(ixbot, ybot)]);
    }
    if ixtop < -0.25 {
        gamma.push(pt(-0.25, vert_int(m, -0.25)));
    } else if ixtop > 0.5 {
        gamma.extend([pt(0.5, vert_int(m, 0.5)), pt(0.5, ytop), pt(-0.25, ytop)]);
    } else {
        gamma.extend([pt(ixtop, ytop), pt(-0.25, ytop)]);
    }
    contours.push(Contour { vertices: gamma });

    Ok(contours)
}

/// Loop around {0, 1} passing above λ instead of below it: the third
/// advanced contour for λ̄, reflected back. Valid wherever the advanced
/// family is valid at λ̄.
pub fn advanced_above(l: Complex64) -> Result<Contour> {
    let below = advanced(l.conj(), 3)?;
    Ok(below[2].conjugate())
}

pub fn contours(l: Complex64, n: usize, family: ContourFamily) -> Result<Vec<Contour>> {
    match family {
        ContourFamily::Simple => simple(l, n),
        ContourFamily::Advanced => advanced(l, n),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        advanced, advanced_above, contours, horiz_int, simple, vert_int, Contour, ContourFamily,
    };
    use num_complex::Complex64;

    fn enclosed(contour: &Contour, l: Complex64) -> [i32; 3] {
        [
            contour.winding_number(Complex64::new(0.0, 0.0)).abs(),
            contour.winding_number(Complex64::new(1.0, 0.0)).abs(),
            contour.winding_number(l).abs(),
        ]
    }

    #[test]
    fn simple_contours_separate_the_punctures() {
        let l = Complex64::new(0.4, 0.7);
        let gammas = simple(l, 3).expect("three simple contours");
        assert_eq!(gammas.len(), 3);
        assert_eq!(
            [gammas[0].vertex_count(), gammas[1].vertex_count(), gammas[2].vertex_count()],
            [4, 4, 8]
        );
        assert_eq!(enclosed(&gammas[0], l), [1, 0, 1]);
        assert_eq!(enclosed(&gammas[1], l), [0, 1, 1]);
        assert_eq!(enclosed(&gammas[2], l), [1, 1, 0]);
    }

    #[test]
    fn simple_contours_are_counterclockwise() {
        let l = Complex64::new(0.5, -0.3);
        let gammas = simple(l, 3).expect("contours");
        assert_eq!(gammas[0].winding_number(Complex64::new(0.0, 0.0)), 1);
        assert_eq!(gammas[1].winding_number(Complex64::new(1.0, 0.0)), 1);
        assert_eq!(gammas[2].winding_number(Complex64::new(0.0, 0.0)), 1);
        assert_eq!(gammas[2].winding_number(Complex64::new(1.0, 0.0)), 1);
    }

    #[test]
    fn advanced_contours_separate_the_punctures_on_fundamental_domain() {
        for l in [
            Complex64::new(0.5, 0.8660254037844386),
            Complex64::new(0.5, 0.0),
            Complex64::new(0.1, 0.3),
            Complex64::new(0.3, -0.9),
            Complex64::new(0.0, 0.5),
            Complex64::new(1e-5, 1e-5),
        ] {
            let gammas = advanced(l, 3).expect("three advanced contours");
            assert_eq!(enclosed(&gammas[0], l), [1, 0, 1], "contour 1 at {l}");
            assert_eq!(enclosed(&gammas[1], l), [0, 1, 1], "contour 2 at {l}");
            assert_eq!(enclosed(&gammas[2], l), [1, 1, 0], "contour 3 at {l}");
        }
    }

    #[test]
    fn contour_count_is_respected() {
        let l = Complex64::new(0.5, 0.2);
        assert_eq!(advanced(l, 1).expect("one").len(), 1);
        assert_eq!(advanced(l, 2).expect("two").len(), 2);
        assert_eq!(contours(l, 2, ContourFamily::Simple).expect("two").len(), 2);
        assert!(contours(l, 0, ContourFamily::Simple).is_err());
        assert!(contours(l, 4, ContourFamily::Advanced).is_err());
    }

    #[test]
    fn bisector_intersections_are_equidistant() {
        let l = Complex64::new(0.3, 0.6);
        let x = horiz_int(l, 0.2);
        let p = Complex64::new(x, 0.2);
        assert!((p.norm() - (p - l).norm()).abs() < 1e-12);
        let y = vert_int(l, -0.25);
        let q = Complex64::new(-0.25, y);
        assert!((q.norm() - (q - l).norm()).abs() < 1e-12);
    }

    #[test]
    fn horiz_int_saturates_near_imaginary_axis() {
        let l = Complex64::new(1e-6, 0.5);
        assert_eq!(horiz_int(l, 0.5), -100.0);
        assert_eq!(horiz_int(l, -0.5), 100.0);
        assert_eq!(horiz_int(l, 0.0), 0.0);
    }

    #[test]
    fn starting_at_top_keeps_orientation() {
        let l = Complex64::new(0.5, 0.0);
        let gamma = &advanced(l, 3).expect("contours")[2];
        let rebased = gamma.starting_at_top();
        assert_eq!(rebased.vertex_count(), gamma.vertex_count());
        let top = rebased.start().im;
        assert!(gamma.vertices().iter().all(|v| v.im <= top));
        for p in [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)] {
            assert_eq!(rebased.winding_number(p), gamma.winding_number(p));
        }
    }

    #[test]
    fn counterclockwise_fixes_the_second_advanced_contour() {
        let l = Complex64::new(0.3, 0.4);
        let gammas = advanced(l, 3).expect("contours");
        assert_eq!(gammas[1].winding_number(Complex64::new(1.0, 0.0)), -1);
        for gamma in &gammas {
            let ccw = gamma.counterclockwise();
            let signed = [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0), l]
                .map(|p| ccw.winding_number(p));
            assert_eq!(signed, enclosed(gamma, l));
            assert_eq!(ccw.counterclockwise(), ccw);
        }
    }

    #[test]
    fn mirrored_third_contour_keeps_lambda_outside() {
        for l in [
            Complex64::new(0.3, 0.4),
            Complex64::new(0.25, -0.3),
            Complex64::new(0.45, 0.8),
        ] {
            let above = advanced_above(l).expect("mirrored contour");
            assert_eq!(enclosed(&above, l), [1, 1, 0], "at {l}");
            assert_eq!(above.counterclockwise().winding_number(Complex64::new(0.0, 0.0)), 1);
        }
        let real = Complex64::new(0.5, 0.0);
        let below = &advanced(real, 3).expect("contours")[2];
        assert_eq!(advanced_above(real).expect("mirrored"), below.conjugate());
    }

    #[test]
    fn contour_new_rejects_degenerate_polygons() {
        assert!(Contour::new(vec![Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)]).is_err());
        assert!(Contour::new(vec![
            Complex64::new(0.0, 0.0),
            Complex64::new(f64::NAN, 0.0),
            Complex64::new(1.0, 1.0)
        ])
        .is_err());
    }
}
