//! One-shot holonomy, classification and contour bindings.

use crate::shared::{complex, holonomy_settings, js_error, parse_family, to_js, trace_triple};
use cp1_core::bowditch::classify;
use cp1_core::contours::contours;
use cp1_core::modular::modular_lambda as core_modular_lambda;
use cp1_core::s04::s04_holonomy as core_s04_holonomy;
use cp1_core::t11::{t11_holonomy as core_t11_holonomy, t11_tau_holonomy as core_t11_tau_holonomy};
use num_complex::Complex64;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn modular_lambda(tau_re: f64, tau_im: f64) -> Result<JsValue, JsValue> {
    let lambda = core_modular_lambda(complex(tau_re, tau_im)).map_err(js_error)?;
    to_js(&lambda)
}

/// Traces of the S04 holonomy generators, one per contour.
#[wasm_bindgen]
pub fn s04_holonomy(
    lambda_re: f64,
    lambda_im: f64,
    c_re: f64,
    c_im: f64,
    tolerance: f64,
    contours: u32,
    fundamental_domain: bool,
    family: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let settings =
        holonomy_settings(tolerance, contours, fundamental_domain, family).map_err(js_error)?;
    let traces = core_s04_holonomy(complex(lambda_re, lambda_im), complex(c_re, c_im), &settings)
        .map_err(js_error)?;
    to_js(&traces)
}

#[wasm_bindgen]
pub fn t11_holonomy(
    lambda_re: f64,
    lambda_im: f64,
    c_re: f64,
    c_im: f64,
    tolerance: f64,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let settings = holonomy_settings(tolerance, 3, true, "simple").map_err(js_error)?;
    let triple = core_t11_holonomy(complex(lambda_re, lambda_im), complex(c_re, c_im), &settings)
        .map_err(js_error)?;
    to_js(&triple)
}

#[wasm_bindgen]
pub fn t11_tau_holonomy(
    tau_re: f64,
    tau_im: f64,
    c_re: f64,
    c_im: f64,
    tolerance: f64,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let settings = holonomy_settings(tolerance, 3, true, "simple").map_err(js_error)?;
    let triple = core_t11_tau_holonomy(complex(tau_re, tau_im), complex(c_re, c_im), &settings)
        .map_err(js_error)?;
    to_js(&triple)
}

/// Classifies a torus trace triple given as six numbers
/// `[x_re, x_im, y_re, y_im, z_re, z_im]`.
#[wasm_bindgen]
pub fn classify_traces(traces: Vec<f64>, max_triangles: u32) -> Result<JsValue, JsValue> {
    if max_triangles == 0 {
        return Err(JsValue::from_str(
            "Classification requires a positive triangle budget.",
        ));
    }
    let triple = trace_triple(&traces).map_err(js_error)?;
    to_js(&classify(&triple, max_triangles as usize))
}

/// Vertices of the contours at λ, for drawing.
#[wasm_bindgen]
pub fn contour_vertices(
    lambda_re: f64,
    lambda_im: f64,
    count: u32,
    family: &str,
) -> Result<JsValue, JsValue> {
    let family = parse_family(family).map_err(js_error)?;
    let loops = contours(complex(lambda_re, lambda_im), count as usize, family).map_err(js_error)?;
    let vertices: Vec<Vec<Complex64>> = loops.iter().map(|c| c.vertices().to_vec()).collect();
    to_js(&vertices)
}
