//! In-memory reference engine.
//!
//! Backs tests and the CLI with a flat lattice grid: coverages are per-cell
//! value maps, feature tables are plain vectors. Derived processes
//! (calculator, first-not-null, slope/aspect, caches, transforms) are
//! evaluated recursively per cell, which is exactly the lazily-composed
//! evaluation contract the production engine provides.

use std::collections::HashMap;
use std::sync::Mutex;

use geocalc_core::{
    Error, Field, FieldType, GeoSource, OutputType, PipelineSpecification, Result, ScalarKind,
    Value,
};

use crate::engine::{FeatureIter, GridEngine, SourceKind};
use crate::feature::Feature;
use crate::geometry::{CellIndex, Geometry};
use crate::histogram::Histogram;
use crate::process::{Attributes, Process, ProcessKind, ProcessKindTable};

/// One registered raster: ordered fields plus per-cell value tuples.
#[derive(Debug, Clone)]
pub struct CoverageLattice {
    pub fields: Vec<Field>,
    pub cells: HashMap<CellIndex, Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub fields: Vec<Field>,
    pub features: Vec<Feature>,
}

pub struct MemoryEngine {
    kinds: ProcessKindTable,
    sources: Mutex<HashMap<String, GeoSource>>,
    coverages: Mutex<HashMap<String, CoverageLattice>>,
    tables: Mutex<HashMap<String, FeatureTable>>,
    cache: Mutex<HashMap<(String, CellIndex, usize), Value>>,
}

impl MemoryEngine {
    pub fn new(kinds: ProcessKindTable) -> Self {
        Self {
            kinds,
            sources: Mutex::new(HashMap::new()),
            coverages: Mutex::new(HashMap::new()),
            tables: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register a named coverage; the name becomes resolvable.
    pub fn register_coverage(
        &self,
        name: &str,
        fields: Vec<Field>,
        cells: HashMap<CellIndex, Vec<Value>>,
    ) -> Result<GeoSource> {
        let process = Process::leaf(
            ProcessKind::CoverageSource,
            Attributes::from([("dataset".to_string(), name.to_string())]),
        );
        self.coverages
            .lock()
            .expect("coverages lock")
            .insert(name.to_string(), CoverageLattice { fields, cells });
        let source = self.materialize(&process, name, "")?;
        self.sources
            .lock()
            .expect("sources lock")
            .insert(name.to_string(), source.clone());
        Ok(source)
    }

    /// Register a named feature collection; the name becomes resolvable.
    pub fn register_features(
        &self,
        name: &str,
        fields: Vec<Field>,
        features: Vec<Feature>,
    ) -> Result<GeoSource> {
        let process = Process::leaf(
            ProcessKind::FeatureSource,
            Attributes::from([("dataset".to_string(), name.to_string())]),
        );
        self.tables
            .lock()
            .expect("tables lock")
            .insert(name.to_string(), FeatureTable { fields, features });
        let source = self.materialize(&process, name, "")?;
        self.sources
            .lock()
            .expect("sources lock")
            .insert(name.to_string(), source.clone());
        Ok(source)
    }

    fn lattice(&self, dataset: &str) -> Result<CoverageLattice> {
        self.coverages
            .lock()
            .expect("coverages lock")
            .get(dataset)
            .cloned()
            .ok_or_else(|| Error::EngineFault(format!("unknown coverage dataset '{dataset}'")))
    }

    fn table(&self, dataset: &str) -> Result<FeatureTable> {
        self.tables
            .lock()
            .expect("tables lock")
            .get(dataset)
            .cloned()
            .ok_or_else(|| Error::EngineFault(format!("unknown feature dataset '{dataset}'")))
    }

    fn dataset_of(&self, process: &Process) -> Result<String> {
        process
            .attribute("dataset")
            .map(str::to_string)
            .ok_or_else(|| Error::EngineFault("source process is missing 'dataset'".into()))
    }

    fn collect_features(
        &self,
        process: &Process,
        geometry: Option<&Geometry>,
    ) -> Result<Vec<Feature>> {
        match process.kind {
            ProcessKind::FeatureSource => {
                let table = self.table(&self.dataset_of(process)?)?;
                Ok(table
                    .features
                    .into_iter()
                    .filter(|f| geometry.map_or(true, |g| f.geometry.intersects(g)))
                    .collect())
            }
            ProcessKind::ConcatFeatures => {
                let mut all = Vec::new();
                for input in &process.inputs {
                    all.extend(self.collect_features(input, geometry)?);
                }
                Ok(all)
            }
            ProcessKind::FeaturesSummary
            | ProcessKind::StyledFeatures
            | ProcessKind::FeatureFieldIndex => self.collect_features(input(process, 0)?, geometry),
            _ => Err(Error::EngineFault(format!(
                "{:?} is not a feature process",
                process.kind
            ))),
        }
    }

    fn eval_calculator(&self, process: &Process, cell: CellIndex) -> Result<Value> {
        let op = process
            .attribute("op")
            .ok_or_else(|| Error::EngineFault("calculator process is missing 'op'".into()))?;
        let kind = ScalarKind::normalize(process.attribute("kind").unwrap_or(""));

        let operand = |index: usize| -> Result<Value> {
            let field = process
                .attribute(&format!("field_{index}"))
                .and_then(|f| f.parse::<usize>().ok())
                .unwrap_or(0);
            self.cell_value(input(process, index)?, cell, field)
        };

        if process.inputs.len() == 1 {
            let value = operand(0)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            return match op {
                "!" => value
                    .as_bool()
                    .map(|b| Value::Bool(!b))
                    .ok_or_else(|| Error::EngineFault("'!' needs a boolean operand".into())),
                "neg" => value
                    .as_f64()
                    .map(|v| cast_numeric(-v, kind))
                    .ok_or_else(|| Error::EngineFault("'neg' needs a numeric operand".into())),
                "cast" => value
                    .as_f64()
                    .map(|v| cast_numeric(v, kind))
                    .ok_or_else(|| Error::EngineFault("'cast' needs a numeric operand".into())),
                other => Err(Error::EngineFault(format!("unknown unary op '{other}'"))),
            };
        }

        let lhs = operand(0)?;
        let rhs = operand(1)?;
        if lhs.is_null() || rhs.is_null() {
            return Ok(Value::Null);
        }

        // String operands only support equality.
        if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
            return match op {
                "==" => Ok(Value::Bool(a == b)),
                "!=" => Ok(Value::Bool(a != b)),
                other => Err(Error::EngineFault(format!(
                    "op '{other}' is not defined for strings"
                ))),
            };
        }

        match op {
            "&&" | "||" => {
                let (a, b) = match (lhs.as_bool(), rhs.as_bool()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(Error::EngineFault("logical op needs boolean operands".into())),
                };
                Ok(Value::Bool(if op == "&&" { a && b } else { a || b }))
            }
            _ => {
                let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(Error::EngineFault(format!(
                            "op '{op}' needs numeric operands"
                        )))
                    }
                };
                match op {
                    "+" => Ok(cast_numeric(a + b, kind)),
                    "-" => Ok(cast_numeric(a - b, kind)),
                    "*" => Ok(cast_numeric(a * b, kind)),
                    "/" => {
                        if b == 0.0 {
                            Ok(Value::Null)
                        } else {
                            Ok(cast_numeric(a / b, kind))
                        }
                    }
                    "%" => {
                        if b == 0.0 {
                            Ok(Value::Null)
                        } else {
                            Ok(cast_numeric(a % b, kind))
                        }
                    }
                    "==" => Ok(Value::Bool(a == b)),
                    "!=" => Ok(Value::Bool(a != b)),
                    "<" => Ok(Value::Bool(a < b)),
                    "<=" => Ok(Value::Bool(a <= b)),
                    ">" => Ok(Value::Bool(a > b)),
                    ">=" => Ok(Value::Bool(a >= b)),
                    other => Err(Error::EngineFault(format!("unknown op '{other}'"))),
                }
            }
        }
    }

    /// Central difference over the 4-neighbourhood; a missing neighbour falls
    /// back to the centre value.
    fn gradient(&self, input: &Process, cell: CellIndex) -> Result<Option<(f64, f64)>> {
        let center = match self.cell_value(input, cell, 0)?.as_f64() {
            Some(v) => v,
            None => return Ok(None),
        };
        let sample = |x: i64, y: i64| -> Result<f64> {
            Ok(self
                .cell_value(input, CellIndex::new(x, y), 0)?
                .as_f64()
                .unwrap_or(center))
        };
        let dz_dx = (sample(cell.x + 1, cell.y)? - sample(cell.x - 1, cell.y)?) / 2.0;
        let dz_dy = (sample(cell.x, cell.y + 1)? - sample(cell.x, cell.y - 1)?) / 2.0;
        Ok(Some((dz_dx, dz_dy)))
    }

    fn eval_transform(&self, process: &Process, cell: CellIndex) -> Result<Value> {
        let value = self.cell_value(input(process, 0)?, cell, 0)?;
        let Some(v) = value.as_f64() else {
            return Ok(Value::Null);
        };
        let table = process
            .attribute("table")
            .ok_or_else(|| Error::EngineFault("value transform is missing 'table'".into()))?;
        let pairs: Vec<(f64, f64)> = serde_json::from_str(table)
            .map_err(|e| Error::EngineFault(format!("malformed transform table: {e}")))?;
        for (from, to) in pairs {
            if (v - from).abs() < f64::EPSILON {
                return Ok(Value::Double(to));
            }
        }
        match process.attribute("default") {
            Some(d) => d
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| Error::EngineFault(format!("malformed transform default: {e}"))),
            None => Ok(Value::Null),
        }
    }
}

impl GridEngine for MemoryEngine {
    fn kinds(&self) -> &ProcessKindTable {
        &self.kinds
    }

    fn resolve(&self, name: &str) -> Option<GeoSource> {
        self.sources.lock().expect("sources lock").get(name).cloned()
    }

    fn get_process(&self, source: &GeoSource) -> Result<Process> {
        Process::from_definition(&source.definition, &self.kinds)
    }

    fn create_process(
        &self,
        kind: ProcessKind,
        inputs: Vec<Process>,
        attributes: Attributes,
    ) -> Result<Process> {
        use ProcessKind::*;
        let arity_ok = match kind {
            CoverageSource | FeatureSource | ConstValue => inputs.is_empty(),
            Calculator => inputs.len() == 1 || inputs.len() == 2,
            CoverageCache | Slope | Aspect | ValueTransform | StyledCoverage | FeaturesSummary
            | StyledFeatures | FeatureFieldIndex => inputs.len() == 1,
            CoverageFirstNotNull | ConcatFeatures => !inputs.is_empty(),
        };
        if !arity_ok {
            return Err(Error::InvalidArgument(format!(
                "{kind:?} cannot take {} inputs",
                inputs.len()
            )));
        }
        let required = match kind {
            Calculator => Some("op"),
            ConstValue => Some("value"),
            ValueTransform => Some("table"),
            FeatureFieldIndex => Some("fields"),
            CoverageSource | FeatureSource => Some("dataset"),
            _ => None,
        };
        if let Some(attr) = required {
            if attributes.get(attr).map_or(true, |v| v.is_empty()) {
                return Err(Error::InvalidArgument(format!(
                    "{kind:?} requires a non-empty '{attr}' attribute"
                )));
            }
        }
        Ok(Process::new(kind, inputs, attributes))
    }

    fn classify(&self, process: &Process) -> Result<SourceKind> {
        use ProcessKind::*;
        Ok(match process.kind {
            CoverageSource | ConstValue | Calculator | CoverageCache | CoverageFirstNotNull
            | Slope | Aspect | ValueTransform | StyledCoverage => SourceKind::Coverage,
            FeatureSource | ConcatFeatures | StyledFeatures | FeatureFieldIndex => {
                SourceKind::FeatureCollection
            }
            FeaturesSummary => SourceKind::FeatureGroup,
        })
    }

    fn specification(&self, process: &Process) -> Result<PipelineSpecification> {
        use ProcessKind::*;
        match process.kind {
            CoverageSource => {
                let lattice = self.lattice(&self.dataset_of(process)?)?;
                Ok(PipelineSpecification::new(OutputType::Coverage, lattice.fields))
            }
            FeatureSource => {
                let table = self.table(&self.dataset_of(process)?)?;
                Ok(PipelineSpecification::new(OutputType::Feature, table.fields))
            }
            ConstValue | Calculator => {
                let field_type = if process.attribute("kind") == Some("str") {
                    FieldType::String
                } else if ScalarKind::normalize(process.attribute("kind").unwrap_or(""))
                    == ScalarKind::Bool
                {
                    FieldType::Boolean
                } else {
                    FieldType::Number
                };
                let name = process.attribute("field_name").unwrap_or("value");
                Ok(PipelineSpecification::new(
                    OutputType::Coverage,
                    vec![Field::new(name, field_type)],
                ))
            }
            Slope => Ok(PipelineSpecification::new(
                OutputType::Coverage,
                vec![Field::new("slope", FieldType::Number)],
            )),
            Aspect => Ok(PipelineSpecification::new(
                OutputType::Coverage,
                vec![Field::with_unit("aspect", FieldType::Number, "degrees")],
            )),
            CoverageCache | ValueTransform | StyledCoverage | CoverageFirstNotNull
            | ConcatFeatures | FeaturesSummary | StyledFeatures | FeatureFieldIndex => {
                self.specification(input(process, 0)?)
            }
        }
    }

    fn cell_value(&self, process: &Process, cell: CellIndex, field_index: usize) -> Result<Value> {
        use ProcessKind::*;
        match process.kind {
            CoverageSource => {
                let lattice = self.lattice(&self.dataset_of(process)?)?;
                Ok(lattice
                    .cells
                    .get(&cell)
                    .and_then(|values| values.get(field_index))
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            ConstValue => {
                let text = process
                    .attribute("value")
                    .ok_or_else(|| Error::EngineFault("const process is missing 'value'".into()))?;
                // String constants carry a literal "str" kind marker.
                if process.attribute("kind") == Some("str") {
                    return Ok(Value::Str(text.to_string()));
                }
                match ScalarKind::normalize(process.attribute("kind").unwrap_or("")) {
                    ScalarKind::Bool => text
                        .parse::<bool>()
                        .map(Value::Bool)
                        .map_err(|e| Error::EngineFault(format!("malformed const: {e}"))),
                    kind => text
                        .parse::<f64>()
                        .map(|v| cast_numeric(v, kind))
                        .map_err(|e| Error::EngineFault(format!("malformed const: {e}"))),
                }
            }
            Calculator => self.eval_calculator(process, cell),
            CoverageFirstNotNull => {
                for input in &process.inputs {
                    let value = self.cell_value(input, cell, field_index)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
            CoverageCache => {
                let key = (process.to_definition(&self.kinds)?, cell, field_index);
                if let Some(hit) = self.cache.lock().expect("cache lock").get(&key) {
                    return Ok(hit.clone());
                }
                #[cfg(feature = "tracing")]
                tracing::trace!(x = cell.x, y = cell.y, field = field_index, "coverage cache miss");
                let value = self.cell_value(input(process, 0)?, cell, field_index)?;
                self.cache
                    .lock()
                    .expect("cache lock")
                    .insert(key, value.clone());
                Ok(value)
            }
            Slope => Ok(match self.gradient(input(process, 0)?, cell)? {
                Some((dz_dx, dz_dy)) => Value::Double(dz_dx.hypot(dz_dy)),
                None => Value::Null,
            }),
            Aspect => Ok(match self.gradient(input(process, 0)?, cell)? {
                Some((dz_dx, dz_dy)) => {
                    let bearing = (-dz_dy).atan2(-dz_dx).to_degrees();
                    Value::Double((bearing + 360.0) % 360.0)
                }
                None => Value::Null,
            }),
            ValueTransform => self.eval_transform(process, cell),
            StyledCoverage => self.cell_value(input(process, 0)?, cell, field_index),
            FeatureSource | ConcatFeatures | FeaturesSummary | StyledFeatures
            | FeatureFieldIndex => Err(Error::EngineFault(format!(
                "{:?} is not a coverage process",
                process.kind
            ))),
        }
    }

    fn features(&self, process: &Process, geometry: Option<&Geometry>) -> Result<FeatureIter<'_>> {
        let features = self.collect_features(process, geometry)?;
        Ok(Box::new(features.into_iter()))
    }

    fn features_count(&self, process: &Process) -> Result<u64> {
        use ProcessKind::*;
        match process.kind {
            FeatureSource => Ok(self.table(&self.dataset_of(process)?)?.features.len() as u64),
            FeaturesSummary | StyledFeatures | FeatureFieldIndex => {
                self.features_count(input(process, 0)?)
            }
            // Concatenation parts may be lazy; counting would enumerate them.
            ConcatFeatures => Err(Error::UnsupportedOperation(
                "feature count requires enumerating concatenated inputs".into(),
            )),
            _ => Err(Error::UnsupportedOperation(format!(
                "{:?} cannot report a feature count",
                process.kind
            ))),
        }
    }

    fn coverage_histogram(
        &self,
        process: &Process,
        field_index: usize,
        geometry: &Geometry,
    ) -> Result<Histogram> {
        if self.classify(process)? != SourceKind::Coverage {
            return Err(Error::EngineFault("not a coverage process".into()));
        }
        let region = self.to_grid_geometry(geometry, None)?;
        let mut values = Vec::new();
        for cell in region.cells() {
            values.push(self.cell_value(process, cell, field_index)?);
        }
        Ok(Histogram::from_values(values))
    }

    fn feature_histogram(
        &self,
        process: &Process,
        field_index: usize,
        geometry: Option<&Geometry>,
    ) -> Result<Histogram> {
        let specification = self.specification(process)?;
        let field = specification
            .fields
            .get(field_index)
            .ok_or_else(|| Error::EngineFault(format!("no field at index {field_index}")))?
            .name
            .clone();
        let values: Vec<Value> = self
            .collect_features(process, geometry)?
            .into_iter()
            .map(|f| f.value(&field))
            .collect();
        Ok(Histogram::from_values(values))
    }

    fn group_histogram(
        &self,
        process: &Process,
        field_index: usize,
        geometry: Option<&Geometry>,
    ) -> Result<Histogram> {
        if self.classify(process)? != SourceKind::FeatureGroup {
            return Err(Error::EngineFault("not a feature group process".into()));
        }
        // The lattice engine has no pre-aggregation; fall through to the
        // underlying collection.
        self.feature_histogram(input(process, 0)?, field_index, geometry)
    }

    fn search(&self, index: &Process, text: &str) -> Result<Vec<Feature>> {
        if index.kind != ProcessKind::FeatureFieldIndex {
            return Err(Error::EngineFault("not a field index process".into()));
        }
        let fields: Vec<&str> = index
            .attribute("fields")
            .map(|f| f.split_whitespace().collect())
            .unwrap_or_default();
        if fields.is_empty() {
            return Err(Error::EngineFault("field index has no indexed fields".into()));
        }
        let needle = text.to_lowercase();
        Ok(self
            .collect_features(input(index, 0)?, None)?
            .into_iter()
            .filter(|feature| {
                fields.iter().any(|field| {
                    value_text(&feature.value(field))
                        .map_or(false, |text| text.to_lowercase().contains(&needle))
                })
            })
            .collect())
    }

    fn to_grid_geometry(&self, geometry: &Geometry, _resolution: Option<u32>) -> Result<Geometry> {
        Ok(match geometry {
            Geometry::Cell(c) => Geometry::Cell(*c),
            Geometry::CellSet(cells) => Geometry::cell_set(cells.clone()),
            rect @ Geometry::Rect { .. } => Geometry::cell_set(rect.cells()),
        })
    }
}

fn input(process: &Process, index: usize) -> Result<&Process> {
    process
        .inputs
        .get(index)
        .ok_or_else(|| Error::EngineFault(format!("{:?} is missing input {index}", process.kind)))
}

fn cast_numeric(value: f64, kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::Bool => Value::Bool(value != 0.0),
        ScalarKind::Byte => Value::Byte(value.round().clamp(0.0, 255.0) as u8),
        ScalarKind::Int => Value::Int(value.round() as i64),
        ScalarKind::Double | ScalarKind::Unspecified => Value::Double(value),
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Byte(b) => Some(b.to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Str(s) => Some(s.clone()),
        Value::Color(_) => None,
    }
}
