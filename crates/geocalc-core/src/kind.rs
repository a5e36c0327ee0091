//! Scalar-kind normalization for calculator output types.
//!
//! The compiler works with exactly four internal kinds (bool, byte, int,
//! double); any other requested type normalizes to `Unspecified`, letting the
//! compiler infer the kind from the expression itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Byte,
    Int,
    Double,
    Unspecified,
}

impl ScalarKind {
    /// Normalize a requested output-type name. Accepts the calculator's own
    /// names plus common fixed-width aliases; anything else is `Unspecified`.
    pub fn normalize(name: &str) -> ScalarKind {
        match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => ScalarKind::Bool,
            "byte" | "u8" | "uint8" | "i8" | "int8" | "sbyte" => ScalarKind::Byte,
            "int" | "uint" | "i16" | "u16" | "i32" | "u32" | "i64" | "u64" | "int16" | "int32"
            | "int64" | "uint16" | "uint32" | "uint64" | "long" | "ulong" | "short" | "ushort" => {
                ScalarKind::Int
            }
            "double" | "float" | "single" | "f32" | "f64" => ScalarKind::Double,
            _ => ScalarKind::Unspecified,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Byte => "byte",
            ScalarKind::Int => "int",
            ScalarKind::Double => "double",
            ScalarKind::Unspecified => "",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ScalarKind::Unspecified)
    }

    /// Numeric promotion across operator operands: Bool < Byte < Int < Double.
    /// `Unspecified` defers to the other side.
    pub fn unify(a: ScalarKind, b: ScalarKind) -> ScalarKind {
        use ScalarKind::*;
        match (a, b) {
            (Unspecified, other) | (other, Unspecified) => other,
            (Double, _) | (_, Double) => Double,
            (Int, _) | (_, Int) => Int,
            (Byte, _) | (_, Byte) => Byte,
            (Bool, Bool) => Bool,
        }
    }
}

/// Normalized name of a requested output type ("" when unrecognized).
pub fn normalized_output_type(name: &str) -> &'static str {
    ScalarKind::normalize(name).name()
}
