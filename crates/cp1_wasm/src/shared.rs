//! Argument conversion shared by the bindings.

use cp1_core::contours::ContourFamily;
use cp1_core::s04::HolonomySettings;
use cp1_core::types::TraceTriple;
use num_complex::Complex64;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::JsValue;

pub(crate) fn complex(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

pub(crate) fn parse_family(name: &str) -> anyhow::Result<ContourFamily> {
    match name {
        "simple" => Ok(ContourFamily::Simple),
        "advanced" => Ok(ContourFamily::Advanced),
        _ => anyhow::bail!("Unknown contour family: {}", name),
    }
}

/// Settings for a holonomy call. A non-positive tolerance keeps the default.
pub(crate) fn holonomy_settings(
    tolerance: f64,
    contours: u32,
    fundamental_domain: bool,
    family: &str,
) -> anyhow::Result<HolonomySettings> {
    if tolerance.is_nan() {
        anyhow::bail!("Tolerance must be a number.");
    }
    let mut settings = if tolerance > 0.0 {
        HolonomySettings::with_tolerance(tolerance)
    } else {
        HolonomySettings::default()
    };
    settings.contours = contours as usize;
    settings.fundamental_domain = fundamental_domain;
    settings.family = parse_family(family)?;
    Ok(settings)
}

/// Reads `[x_re, x_im, y_re, y_im, z_re, z_im]`.
pub(crate) fn trace_triple(flat: &[f64]) -> anyhow::Result<TraceTriple> {
    if flat.len() != 6 {
        anyhow::bail!(
            "Trace triple needs 6 numbers (re, im pairs), got {}.",
            flat.len()
        );
    }
    Ok(TraceTriple::new(
        complex(flat[0], flat[1]),
        complex(flat[2], flat[3]),
        complex(flat[4], flat[5]),
    ))
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}", err))
}
