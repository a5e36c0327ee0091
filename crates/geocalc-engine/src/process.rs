//! Process graphs: the composable, lazily-evaluated pipeline nodes behind
//! every GeoSource.
//!
//! A `Process` is an immutable tree of typed nodes. A GeoSource `definition`
//! is the JSON form of this tree, with each node kind written as the
//! engine's well-known identifier so definitions survive outside the
//! calculator. The kind↔identifier mapping is a configuration table owned by
//! the engine adapter, not ambient global state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

use geocalc_core::{Error, Result};

pub type Attributes = BTreeMap<String, String>;

/// Well-known process kinds understood by the engine adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    /// Leaf raster source; `dataset` attribute names the stored lattice.
    CoverageSource,
    /// Leaf vector source; `dataset` attribute names the stored table.
    FeatureSource,
    /// Scalar constant; `value` and `kind` attributes.
    ConstValue,
    /// Arithmetic/comparison/logical combination of its inputs; `op` attribute.
    Calculator,
    /// Per-cell memoization layer over a coverage input.
    CoverageCache,
    /// Ordered first-not-null composition of N coverage inputs.
    CoverageFirstNotNull,
    /// Concatenation of N feature-collection inputs, in input order.
    ConcatFeatures,
    /// Aggregated feature-group view over a feature-collection input.
    FeaturesSummary,
    /// Terrain slope magnitude of a coverage input.
    Slope,
    /// Terrain aspect (bearing of steepest descent) of a coverage input.
    Aspect,
    /// Value remap of a coverage input; `table` attribute holds JSON pairs.
    ValueTransform,
    /// Secondary substring-search index; `fields` attribute is space-joined.
    FeatureFieldIndex,
    /// Display-style wrapper around a coverage.
    StyledCoverage,
    /// Display-style wrapper around a feature collection.
    StyledFeatures,
}

/// Engine configuration table mapping process kinds to the engine's stable
/// identifiers (and back). Passed into engine adapters at construction.
#[derive(Debug, Clone)]
pub struct ProcessKindTable {
    entries: BTreeMap<ProcessKind, Uuid>,
}

impl Default for ProcessKindTable {
    fn default() -> Self {
        use ProcessKind::*;
        let entries = BTreeMap::from([
            (CoverageSource, uuid!("73b180ab-100b-4742-be18-045f1def4b95")),
            (FeatureSource, uuid!("c621458a-9e1d-41eb-b01e-c0569743c0b8")),
            (ConstValue, uuid!("aa79e1d0-31d4-4d2e-a2a3-9e90e0a3c85e")),
            (Calculator, uuid!("fda4208f-0042-4b4b-86a8-b4dbefa43733")),
            (CoverageCache, uuid!("83f35c37-5d0a-41c9-a937-f8c9c1e86850")),
            (CoverageFirstNotNull, uuid!("79e1d5b2-f816-449e-876b-9eaf0b1ce118")),
            (ConcatFeatures, uuid!("bbdca91a-083e-4a86-b694-6e808a62dc07")),
            (FeaturesSummary, uuid!("e6c3802d-e7b3-431c-a41f-fbab79e1ca2d")),
            (Slope, uuid!("8f2e6cd5-4a0b-46c3-9ce6-0d1ee4bfa531")),
            (Aspect, uuid!("2d9af1c7-6b3e-4f82-b1c4-7a5e90d2c6f8")),
            (ValueTransform, uuid!("481612ea-3018-42ee-9b56-32601a3051be")),
            (FeatureFieldIndex, uuid!("afe6f82a-8e82-41ca-9764-b45da5264d76")),
            (StyledCoverage, uuid!("43ffaae3-0a08-45f8-80da-2e75b31eb96f")),
            (StyledFeatures, uuid!("4f41a149-7ebf-41cb-b0f9-031d76ef81e0")),
        ]);
        Self { entries }
    }
}

impl ProcessKindTable {
    pub fn identifier(&self, kind: ProcessKind) -> Uuid {
        self.entries[&kind]
    }

    pub fn kind_of(&self, identifier: &Uuid) -> Option<ProcessKind> {
        self.entries
            .iter()
            .find(|(_, id)| *id == identifier)
            .map(|(kind, _)| *kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub kind: ProcessKind,
    pub inputs: Vec<Process>,
    pub attributes: Attributes,
}

impl Process {
    pub fn new(kind: ProcessKind, inputs: Vec<Process>, attributes: Attributes) -> Self {
        Self {
            kind,
            inputs,
            attributes,
        }
    }

    pub fn leaf(kind: ProcessKind, attributes: Attributes) -> Self {
        Self::new(kind, Vec::new(), attributes)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn wrapped_in(&self, kind: ProcessKind) -> bool {
        self.kind == kind
    }

    /// Unwrap a single-input wrapper of the given kind; any other shape is
    /// returned unchanged.
    pub fn strip(&self, kind: ProcessKind) -> Process {
        if self.kind == kind && self.inputs.len() == 1 {
            self.inputs[0].clone()
        } else {
            self.clone()
        }
    }

    /// Serialize to the definition format carried by GeoSources.
    pub fn to_definition(&self, table: &ProcessKindTable) -> Result<String> {
        Ok(serde_json::to_string(&self.to_def(table))?)
    }

    pub fn from_definition(definition: &str, table: &ProcessKindTable) -> Result<Process> {
        let def: ProcessDef = serde_json::from_str(definition)
            .map_err(|e| Error::EngineFault(format!("malformed process definition: {e}")))?;
        Process::from_def(&def, table)
    }

    fn to_def(&self, table: &ProcessKindTable) -> ProcessDef {
        ProcessDef {
            kind: table.identifier(self.kind),
            inputs: self.inputs.iter().map(|p| p.to_def(table)).collect(),
            attributes: self.attributes.clone(),
        }
    }

    fn from_def(def: &ProcessDef, table: &ProcessKindTable) -> Result<Process> {
        let kind = table
            .kind_of(&def.kind)
            .ok_or_else(|| Error::EngineFault(format!("unknown process identifier {}", def.kind)))?;
        let inputs = def
            .inputs
            .iter()
            .map(|d| Process::from_def(d, table))
            .collect::<Result<Vec<_>>>()?;
        Ok(Process::new(kind, inputs, def.attributes.clone()))
    }
}

/// Wire form of a process node inside a GeoSource definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcessDef {
    kind: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    inputs: Vec<ProcessDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: Attributes,
}
