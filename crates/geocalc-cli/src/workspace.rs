//! YAML workspaces: named datasets loaded into a `MemoryEngine`.
//!
//! A workspace file declares coverage lattices (row-major value grids with
//! `~` for empty cells) and feature tables. Loading one registers every
//! dataset under its name, so expressions can reference them directly.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use geocalc_core::{Error, Field, FieldType, Result, Value};
use geocalc_engine::{CellIndex, Feature, Geometry, MemoryEngine, ProcessKindTable};

#[derive(Debug, Deserialize)]
pub struct WorkspaceFile {
    #[serde(default)]
    coverages: BTreeMap<String, CoverageDef>,
    #[serde(default)]
    features: BTreeMap<String, FeatureTableDef>,
}

#[derive(Debug, Deserialize)]
struct CoverageDef {
    field: FieldDef,
    /// Grid coordinates of the first row's first cell.
    #[serde(default)]
    origin: (i64, i64),
    /// Row-major cell values; `~` marks a cell with no value.
    rows: Vec<Vec<Option<Scalar>>>,
}

#[derive(Debug, Deserialize)]
struct FeatureTableDef {
    fields: Vec<FieldDef>,
    rows: Vec<FeatureDef>,
}

#[derive(Debug, Deserialize)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureDef {
    id: String,
    cell: (i64, i64),
    #[serde(default)]
    values: BTreeMap<String, Option<Scalar>>,
}

/// Scalar as it appears in YAML, before field typing is applied.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Parse a workspace file and register its datasets into a fresh engine.
pub fn load(yaml: &str) -> Result<MemoryEngine> {
    let file: WorkspaceFile = serde_yaml::from_str(yaml)
        .map_err(|e| Error::InvalidArgument(format!("malformed workspace: {e}")))?;
    let engine = MemoryEngine::new(ProcessKindTable::default());

    for (name, coverage) in &file.coverages {
        let field = parse_field(&coverage.field)?;
        let mut cells = HashMap::new();
        for (row, values) in coverage.rows.iter().enumerate() {
            for (column, scalar) in values.iter().enumerate() {
                let value = typed_value(scalar.as_ref(), field.field_type)?;
                if !value.is_null() {
                    cells.insert(
                        CellIndex::new(
                            coverage.origin.0 + column as i64,
                            coverage.origin.1 + row as i64,
                        ),
                        vec![value],
                    );
                }
            }
        }
        engine.register_coverage(name, vec![field], cells)?;
    }

    for (name, table) in &file.features {
        let fields = table
            .fields
            .iter()
            .map(parse_field)
            .collect::<Result<Vec<_>>>()?;
        let features = table
            .rows
            .iter()
            .map(|row| {
                let mut values = BTreeMap::new();
                for field in &fields {
                    let scalar = row.values.get(&field.name).and_then(Option::as_ref);
                    values.insert(field.name.clone(), typed_value(scalar, field.field_type)?);
                }
                Ok(Feature {
                    id: row.id.clone(),
                    geometry: Geometry::Cell(CellIndex::new(row.cell.0, row.cell.1)),
                    values,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        engine.register_features(name, fields, features)?;
    }

    Ok(engine)
}

fn parse_field(def: &FieldDef) -> Result<Field> {
    let field_type = match def.field_type.as_str() {
        "number" => FieldType::Number,
        "string" => FieldType::String,
        "boolean" => FieldType::Boolean,
        "color" => FieldType::Color,
        other => {
            return Err(Error::InvalidArgument(format!(
                "unknown field type '{other}' for field '{}'",
                def.name
            )))
        }
    };
    Ok(match &def.unit {
        Some(unit) => Field::with_unit(&def.name, field_type, unit),
        None => Field::new(&def.name, field_type),
    })
}

fn typed_value(scalar: Option<&Scalar>, field_type: FieldType) -> Result<Value> {
    let Some(scalar) = scalar else {
        return Ok(Value::Null);
    };
    match (scalar, field_type) {
        (Scalar::Number(n), FieldType::Number) => Ok(Value::Double(*n)),
        (Scalar::Bool(b), FieldType::Boolean) => Ok(Value::Bool(*b)),
        (Scalar::Text(s), FieldType::String) => Ok(Value::Str(s.clone())),
        (scalar, field_type) => Err(Error::InvalidArgument(format!(
            "value {scalar:?} does not fit a {field_type:?} field"
        ))),
    }
}
