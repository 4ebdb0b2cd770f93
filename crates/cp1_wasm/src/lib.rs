//! WASM bindings for the cp1 core library.
//!
//! Complex arguments are passed as (re, im) pairs; complex results are
//! serialized as `[re, im]` arrays.

mod holonomy;
mod shared;
mod slice;

pub use holonomy::{
    classify_traces, contour_vertices, modular_lambda, s04_holonomy, t11_holonomy,
    t11_tau_holonomy,
};
pub use slice::WasmBersSliceRunner;
