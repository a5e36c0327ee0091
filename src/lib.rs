#![forbid(unsafe_code)]
//! GeoCalc: an expression calculator over grid-indexed geospatial sources.
//!
//! This facade re-exports the workspace crates; see `geocalc-expr` for the
//! expression pipeline, `geocalc-analysis` for mosaics, statistics, and
//! getters, and `geocalc-engine` for the grid engine boundary.

pub use geocalc_analysis as analysis;
pub use geocalc_core as core;
pub use geocalc_engine as engine;
pub use geocalc_expr as expr;
