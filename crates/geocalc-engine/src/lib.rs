#![forbid(unsafe_code)]
//! geocalc-engine: the grid data engine boundary.
//!
//! The discrete-global-grid geometry engine itself is an external
//! collaborator; this crate defines the in-process interface the calculator
//! needs (`GridEngine`), the process-graph model that GeoSource definitions
//! serialize to, geometry and histogram value objects, and `MemoryEngine`,
//! a lattice-backed reference implementation used by tests and the CLI.

pub mod engine;
pub mod feature;
pub mod geometry;
pub mod histogram;
pub mod memory;
pub mod process;

pub use engine::{FeatureIter, GridEngine, SourceKind};
pub use feature::{Feature, FeatureCollection};
pub use geometry::{CellIndex, Geometry};
pub use histogram::{CountRange, Histogram, HistogramScale, RawBin};
pub use memory::MemoryEngine;
pub use process::{Attributes, Process, ProcessKind, ProcessKindTable};
