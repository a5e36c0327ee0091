//! Scalar field values as they appear in coverage cells and feature attributes.
//!
//! Engine adapters convert their native cell/attribute representations into
//! `Value`; everything downstream (calculator, statistics, getters) works on
//! this enum only.

use serde::{Deserialize, Serialize};

use crate::spec::FieldType;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(u8),
    Int(i64),
    Double(f64),
    Str(String),
    /// RGBA color, one byte per channel.
    Color([u8; 4]),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Null => FieldType::Number,
            Value::Bool(_) => FieldType::Boolean,
            Value::Byte(_) | Value::Int(_) | Value::Double(_) => FieldType::Number,
            Value::Str(_) => FieldType::String,
            Value::Color(_) => FieldType::Color,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value; `None` for nulls, strings, and colors.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(*b as u8 as f64),
            Value::Byte(b) => Some(*b as f64),
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Byte(b) => Some(*b != 0),
            Value::Int(i) => Some(*i != 0),
            Value::Double(d) => Some(*d != 0.0),
            _ => None,
        }
    }

    /// Parse a caller-supplied string into the native representation of a
    /// field. Used by exact-value statistics lookups.
    pub fn parse_as(text: &str, field_type: FieldType) -> Result<Value> {
        match field_type {
            FieldType::Boolean => text
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| Error::InvalidArgument(format!("cannot parse '{text}' as bool"))),
            FieldType::Number => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| Error::InvalidArgument(format!("cannot parse '{text}' as number"))),
            FieldType::String => Ok(Value::Str(text.to_string())),
            FieldType::Color => Err(Error::InvalidArgument(
                "color fields do not support value lookups".into(),
            )),
        }
    }
}

/// Total order over values for histogram boundaries and bin ranges.
///
/// Nulls sort first, then values compare within their type; mixed types fall
/// back to the variant order.
pub fn value_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    use Value::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(x), Bool(y)) => x.cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Color(x), Color(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => {
                if x.is_nan() && y.is_nan() {
                    Ordering::Equal
                } else if x.is_nan() {
                    Ordering::Greater
                } else if y.is_nan() {
                    Ordering::Less
                } else {
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
            _ => value_type_order(a).cmp(&value_type_order(b)),
        },
    }
}

/// Assign a numeric order to value types for mixed-type comparisons.
fn value_type_order(v: &Value) -> u8 {
    use Value::*;
    match v {
        Null => 0,
        Bool(_) => 1,
        Byte(_) => 2,
        Int(_) => 3,
        Double(_) => 4,
        Str(_) => 5,
        Color(_) => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_numeric_values_compare_across_widths() {
        assert_eq!(value_cmp(&Value::Byte(3), &Value::Double(3.0)), Ordering::Equal);
        assert_eq!(value_cmp(&Value::Int(2), &Value::Double(2.5)), Ordering::Less);
    }

    #[test]
    fn test_null_sorts_first() {
        assert_eq!(value_cmp(&Value::Null, &Value::Int(-100)), Ordering::Less);
    }

    #[test]
    fn test_parse_as_boolean() {
        assert_eq!(
            Value::parse_as("true", FieldType::Boolean).unwrap(),
            Value::Bool(true)
        );
        assert!(Value::parse_as("maybe", FieldType::Boolean).is_err());
    }
}
