#![forbid(unsafe_code)]
//! geocalc-core: value types, pipeline specifications, GeoSource handles,
//! scalar-kind normalization, and the shared error taxonomy.
//!
//! This crate is pure data; no I/O and no grid-engine access. The engine
//! boundary lives in `geocalc-engine`, and everything here is designed to be
//! serialized as JSON payloads by layers above the calculator.

pub mod error;
pub mod geosource;
pub mod kind;
pub mod prelude;
pub mod spec;
pub mod value;

pub use error::{Error, Result};
pub use geosource::{GeoSource, Metadata};
pub use kind::{normalized_output_type, ScalarKind};
pub use spec::{Field, FieldType, OutputType, PipelineSpecification};
pub use value::Value;
