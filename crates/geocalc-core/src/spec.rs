//! Pipeline specifications: the declared shape of a GeoSource.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Coverage,
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Number,
    String,
    Color,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            unit: None,
        }
    }

    pub fn with_unit(name: impl Into<String>, field_type: FieldType, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            unit: Some(unit.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpecification {
    pub output_type: OutputType,
    pub fields: Vec<Field>,
}

impl PipelineSpecification {
    pub fn new(output_type: OutputType, fields: Vec<Field>) -> Self {
        Self { output_type, fields }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Mosaic compatibility: same output type, and positionally equal field
    /// types (coverages) or positionally equal field names AND types
    /// (feature collections).
    pub fn is_mosaic_compatible(&self, other: &PipelineSpecification) -> bool {
        if self.output_type != other.output_type {
            return false;
        }
        if self.fields.len() != other.fields.len() {
            return false;
        }
        match self.output_type {
            OutputType::Coverage => self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type),
            OutputType::Feature => self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type && a.name == b.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(fields: Vec<Field>) -> PipelineSpecification {
        PipelineSpecification::new(OutputType::Coverage, fields)
    }

    fn features(fields: Vec<Field>) -> PipelineSpecification {
        PipelineSpecification::new(OutputType::Feature, fields)
    }

    #[test]
    fn test_coverage_compatibility_ignores_names() {
        let a = coverage(vec![Field::new("elevation", FieldType::Number)]);
        let b = coverage(vec![Field::new("depth", FieldType::Number)]);
        assert!(a.is_mosaic_compatible(&b));
    }

    #[test]
    fn test_coverage_compatibility_checks_types() {
        let a = coverage(vec![Field::new("elevation", FieldType::Number)]);
        let b = coverage(vec![Field::new("elevation", FieldType::String)]);
        assert!(!a.is_mosaic_compatible(&b));
    }

    #[test]
    fn test_feature_compatibility_checks_names_and_types() {
        let a = features(vec![Field::new("name", FieldType::String)]);
        let b = features(vec![Field::new("name", FieldType::String)]);
        let c = features(vec![Field::new("title", FieldType::String)]);
        assert!(a.is_mosaic_compatible(&b));
        assert!(!a.is_mosaic_compatible(&c));
    }

    #[test]
    fn test_output_type_must_match() {
        let a = coverage(vec![Field::new("x", FieldType::Number)]);
        let b = features(vec![Field::new("x", FieldType::Number)]);
        assert!(!a.is_mosaic_compatible(&b));
    }
}
