//! Incremental Bers-slice sampler.
//!
//! Samples C on a size × size grid covering the square of half-width
//! `radius` around `centre`, computes the torus holonomy at each point and
//! classifies it. Rows are processed in batches so the front-end can report
//! progress between calls.

use crate::shared::{complex, js_error, to_js};
use cp1_core::bowditch::{classify, Discreteness};
use cp1_core::error::Result as CoreResult;
use cp1_core::modular::modular_lambda;
use cp1_core::s04::HolonomySettings;
use cp1_core::t11::T11;
use num_complex::Complex64;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SampleKind {
    Discrete,
    Indiscrete,
    Uncertain,
    /// Holonomy could not be computed at this sample.
    Failed,
}

impl From<Discreteness> for SampleKind {
    fn from(kind: Discreteness) -> Self {
        match kind {
            Discreteness::Discrete => SampleKind::Discrete,
            Discreteness::Indiscrete => SampleKind::Indiscrete,
            Discreteness::Uncertain => SampleKind::Uncertain,
        }
    }
}

#[derive(Serialize)]
struct SliceProgress {
    done: bool,
    rows_done: usize,
    rows: usize,
}

#[derive(Serialize)]
struct SliceResult<'a> {
    size: usize,
    rows_done: usize,
    /// Row-major, top row first.
    kinds: &'a [SampleKind],
    triangles: &'a [u32],
}

struct SliceRunnerState {
    torus: T11,
    centre: Complex64,
    radius: f64,
    size: usize,
    max_triangles: usize,
    rows_done: usize,
    kinds: Vec<SampleKind>,
    triangles: Vec<u32>,
}

impl SliceRunnerState {
    fn done(&self) -> bool {
        self.rows_done >= self.size
    }

    /// Accessory parameter at column `i`, row `j`.
    fn sample_point(&self, i: usize, j: usize) -> Complex64 {
        let last = (self.size - 1) as f64;
        let tx = 2.0 * (i as f64 / last) - 1.0;
        let ty = 1.0 - 2.0 * (j as f64 / last);
        self.centre + Complex64::new(tx, ty) * self.radius
    }

    fn progress(&self) -> SliceProgress {
        SliceProgress {
            done: self.done(),
            rows_done: self.rows_done,
            rows: self.size,
        }
    }
}

/// Computes up to `batch_rows` further rows. A sample whose continuation
/// fails is recorded as `Failed`; any other error aborts the batch and leaves
/// the partial row unrecorded.
fn advance_slice(state: &mut SliceRunnerState, batch_rows: usize) -> CoreResult<()> {
    for _ in 0..batch_rows {
        if state.done() {
            break;
        }
        let j = state.rows_done;
        let mut kinds = Vec::with_capacity(state.size);
        let mut triangles = Vec::with_capacity(state.size);
        for i in 0..state.size {
            let accessory = state.sample_point(i, j);
            let (kind, examined) = match state.torus.trace_triple(accessory) {
                Ok(triple) => {
                    let result = classify(&triple, state.max_triangles);
                    (SampleKind::from(result.kind), result.triangles_examined as u32)
                }
                Err(err) if err.is_continuation_failure() => (SampleKind::Failed, 0),
                Err(err) => return Err(err),
            };
            kinds.push(kind);
            triangles.push(examined);
        }
        state.kinds.extend(kinds);
        state.triangles.extend(triangles);
        state.rows_done += 1;
    }
    Ok(())
}

#[wasm_bindgen]
pub struct WasmBersSliceRunner {
    state: Option<SliceRunnerState>,
}

#[wasm_bindgen]
impl WasmBersSliceRunner {
    #[wasm_bindgen(constructor)]
    pub fn new(
        tau_re: f64,
        tau_im: f64,
        centre_re: f64,
        centre_im: f64,
        radius: f64,
        size: u32,
        max_triangles: u32,
        tolerance: f64,
    ) -> Result<WasmBersSliceRunner, JsValue> {
        console_error_panic_hook::set_once();

        if size < 2 {
            return Err(JsValue::from_str("Slice size must be at least 2."));
        }
        if !radius.is_finite() || radius <= 0.0 {
            return Err(JsValue::from_str("Radius must be positive."));
        }
        if max_triangles == 0 {
            return Err(JsValue::from_str(
                "Classification requires a positive triangle budget.",
            ));
        }

        let lambda = modular_lambda(complex(tau_re, tau_im)).map_err(js_error)?;
        let settings = if tolerance > 0.0 {
            HolonomySettings::with_tolerance(tolerance)
        } else {
            HolonomySettings::default()
        };
        let torus = T11::new(lambda, settings).map_err(js_error)?;
        let size = size as usize;

        Ok(WasmBersSliceRunner {
            state: Some(SliceRunnerState {
                torus,
                centre: complex(centre_re, centre_im),
                radius,
                size,
                max_triangles: max_triangles as usize,
                rows_done: 0,
                kinds: Vec::with_capacity(size * size),
                triangles: Vec::with_capacity(size * size),
            }),
        })
    }

    pub fn is_done(&self) -> bool {
        self.state.as_ref().map_or(true, |state| state.done())
    }

    pub fn run_rows(&mut self, batch_rows: u32) -> Result<JsValue, JsValue> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        advance_slice(state, batch_rows as usize).map_err(js_error)?;
        to_js(&state.progress())
    }

    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        to_js(&state.progress())
    }

    /// Samples computed so far; complete once `is_done` is true.
    pub fn get_result(&self) -> Result<JsValue, JsValue> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        to_js(&SliceResult {
            size: state.size,
            rows_done: state.rows_done,
            kinds: &state.kinds,
            triangles: &state.triangles,
        })
    }
}
