//! Convenient re-exports for downstream crates.

pub use crate::error::{Error, Result};
pub use crate::geosource::{GeoSource, Metadata};
pub use crate::kind::{normalized_output_type, ScalarKind};
pub use crate::spec::{Field, FieldType, OutputType, PipelineSpecification};
pub use crate::value::{value_cmp, Value};
