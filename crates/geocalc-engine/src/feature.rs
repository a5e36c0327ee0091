//! Feature and feature-collection payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use geocalc_core::{Field, Value};

use crate::geometry::Geometry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub geometry: Geometry,
    pub values: BTreeMap<String, Value>,
}

impl Feature {
    pub fn value(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }
}

/// JSON-serializable result set consumed by layers above the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub fields: Vec<Field>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn empty(fields: Vec<Field>) -> Self {
        Self {
            fields,
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
