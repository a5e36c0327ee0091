//! The `GridEngine` trait: everything the calculator, orchestrator, and
//! statistics/getter layers need from the underlying grid data engine.
//!
//! Calls are synchronous and may block on engine I/O; the calculator places
//! no timeout on them. Implementations must be shareable across threads.

use geocalc_core::{GeoSource, PipelineSpecification, Result, Value};

use crate::feature::Feature;
use crate::geometry::{CellIndex, Geometry};
use crate::histogram::Histogram;
use crate::process::{Attributes, Process, ProcessKind, ProcessKindTable};

/// Output classification of a process, computed once per process and matched
/// explicitly by each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Coverage,
    FeatureCollection,
    FeatureGroup,
    Unsupported,
}

/// Lazy, non-restartable forward sequence of features.
pub type FeatureIter<'a> = Box<dyn Iterator<Item = Feature> + 'a>;

pub trait GridEngine: Send + Sync {
    /// The kind↔identifier configuration table this engine was built with.
    fn kinds(&self) -> &ProcessKindTable;

    /// Resolve a bare name to a GeoSource known to this engine.
    fn resolve(&self, name: &str) -> Option<GeoSource>;

    /// Reconstruct the process graph behind a GeoSource definition.
    fn get_process(&self, source: &GeoSource) -> Result<Process>;

    /// Create (and validate) a new process node.
    fn create_process(
        &self,
        kind: ProcessKind,
        inputs: Vec<Process>,
        attributes: Attributes,
    ) -> Result<Process>;

    fn classify(&self, process: &Process) -> Result<SourceKind>;

    fn specification(&self, process: &Process) -> Result<PipelineSpecification>;

    /// Scalar value of one coverage field at one cell; `Value::Null` where
    /// the coverage holds no value.
    fn cell_value(&self, process: &Process, cell: CellIndex, field_index: usize) -> Result<Value>;

    /// Enumerate features, optionally restricted to a geometry.
    fn features(&self, process: &Process, geometry: Option<&Geometry>) -> Result<FeatureIter<'_>>;

    /// Feature count without enumeration; `UnsupportedOperation` when the
    /// source cannot report one cheaply.
    fn features_count(&self, process: &Process) -> Result<u64>;

    fn coverage_histogram(
        &self,
        process: &Process,
        field_index: usize,
        geometry: &Geometry,
    ) -> Result<Histogram>;

    fn feature_histogram(
        &self,
        process: &Process,
        field_index: usize,
        geometry: Option<&Geometry>,
    ) -> Result<Histogram>;

    /// Pre-aggregated histogram of a feature-group process.
    fn group_histogram(
        &self,
        process: &Process,
        field_index: usize,
        geometry: Option<&Geometry>,
    ) -> Result<Histogram>;

    /// Substring search through a `FeatureFieldIndex` process.
    fn search(&self, index: &Process, text: &str) -> Result<Vec<Feature>>;

    /// Normalize a caller geometry to this engine's grid, optionally at an
    /// explicit resolution.
    fn to_grid_geometry(&self, geometry: &Geometry, resolution: Option<u32>) -> Result<Geometry>;

    /// Materialize a GeoSource handle around a process graph.
    fn materialize(&self, process: &Process, name: &str, description: &str) -> Result<GeoSource> {
        let specification = self.specification(process)?;
        let definition = process.to_definition(self.kinds())?;
        Ok(GeoSource::derived(name, description, specification, definition))
    }
}
