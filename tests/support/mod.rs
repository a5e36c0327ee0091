//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use geocalc_core::{Field, FieldType, GeoSource, Value};
use geocalc_engine::{CellIndex, Feature, Geometry, MemoryEngine, ProcessKindTable};

pub fn engine() -> MemoryEngine {
    MemoryEngine::new(ProcessKindTable::default())
}

/// A width×height coverage whose value at (x, y) is `f(x, y)`.
pub fn coverage(
    engine: &MemoryEngine,
    name: &str,
    width: i64,
    height: i64,
    f: impl Fn(i64, i64) -> Option<f64>,
) -> GeoSource {
    let mut cells = HashMap::new();
    for y in 0..height {
        for x in 0..width {
            if let Some(v) = f(x, y) {
                cells.insert(CellIndex::new(x, y), vec![Value::Double(v)]);
            }
        }
    }
    engine
        .register_coverage(name, vec![Field::new(name, FieldType::Number)], cells)
        .unwrap()
}

/// Features named "<prefix> N" laid out one per cell along the x axis.
pub fn named_features(
    engine: &MemoryEngine,
    dataset: &str,
    prefix: &str,
    count: usize,
) -> GeoSource {
    let features = (0..count)
        .map(|i| Feature {
            id: format!("{dataset}-{i}"),
            geometry: Geometry::Cell(CellIndex::new(i as i64, 0)),
            values: BTreeMap::from([(
                "name".to_string(),
                Value::Str(format!("{prefix} {i}")),
            )]),
        })
        .collect();
    engine
        .register_features(dataset, vec![Field::new("name", FieldType::String)], features)
        .unwrap()
}
