//! AST → process-graph compilation.
//!
//! Compilation walks the tree bottom-up, producing a `Process` node per
//! expression node and tracking the scalar kind flowing out of it. The result
//! is finalized into a derived GeoSource: computed coverages get a cache
//! wrapper so repeated cell reads hit memoized values, while a bare reference
//! compiles to the referenced GeoSource itself.

use geocalc_core::{Error, FieldType, GeoSource, Result, ScalarKind};
use geocalc_engine::{Attributes, Process, ProcessKind, SourceKind};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::context::ExpressionContext;

/// Expressions deeper than this fail instead of exhausting the stack.
const MAX_DEPTH: usize = 32;

/// One compiled expression node plus the type facts later stages need.
#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub process: Process,
    /// Set when the node is a direct reference to an existing GeoSource.
    pub source: Option<GeoSource>,
    /// Field the node reads or produces; `None` for bare constants.
    pub field: Option<String>,
    /// Index of `field` within the node's specification.
    pub field_index: usize,
    pub kind: ScalarKind,
    pub is_text: bool,
}

/// A fully compiled expression: the root node and the GeoSource it was
/// finalized into.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub node: CompiledNode,
    pub source: GeoSource,
}

impl ExpressionContext<'_> {
    /// Compile an expression tree into a GeoSource with the requested output
    /// kind (`Unspecified` lets the expression choose its own).
    pub fn compile(&self, expr: &Expr, output: ScalarKind) -> Result<Compiled> {
        self.compile_named(expr, output, "Calculation", "")
    }

    /// As [`compile`](Self::compile), but naming the derived GeoSource.
    pub fn compile_named(
        &self,
        expr: &Expr,
        output: ScalarKind,
        name: &str,
        description: &str,
    ) -> Result<Compiled> {
        let mut node = self.lower(expr, 0)?;
        if node.source.is_none() && output != ScalarKind::Unspecified && output != node.kind {
            node = self.cast(node, output)?;
        }
        let source = match &node.source {
            // A reference to an existing source compiles to that source.
            Some(existing) => existing.clone(),
            None => {
                let process = if node.field.is_some()
                    && !node.process.wrapped_in(ProcessKind::CoverageCache)
                {
                    self.engine().create_process(
                        ProcessKind::CoverageCache,
                        vec![node.process.clone()],
                        Attributes::new(),
                    )?
                } else {
                    node.process.clone()
                };
                self.engine().materialize(&process, name, description)?
            }
        };
        Ok(Compiled { node, source })
    }

    fn lower(&self, expr: &Expr, depth: usize) -> Result<CompiledNode> {
        if depth >= MAX_DEPTH {
            return Err(Error::InvalidArgument(format!(
                "expression nesting exceeds {MAX_DEPTH} levels"
            )));
        }
        match expr {
            Expr::Number(n) => self.constant(&n.to_string(), ScalarKind::Double),
            Expr::Bool(b) => self.constant(&b.to_string(), ScalarKind::Bool),
            Expr::Str(s) => {
                let process = self.engine().create_process(
                    ProcessKind::ConstValue,
                    Vec::new(),
                    Attributes::from([
                        ("value".to_string(), s.clone()),
                        ("kind".to_string(), "str".to_string()),
                    ]),
                )?;
                Ok(CompiledNode {
                    process,
                    source: None,
                    field: None,
                    field_index: 0,
                    kind: ScalarKind::Unspecified,
                    is_text: true,
                })
            }
            Expr::Reference(name) => self.reference(name),
            Expr::Unary { op, operand } => {
                let operand = self.lower(operand, depth + 1)?;
                self.unary(*op, operand)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower(lhs, depth + 1)?;
                let rhs = self.lower(rhs, depth + 1)?;
                self.binary(*op, lhs, rhs)
            }
            Expr::Call { name, args } => {
                let function = self
                    .function(name)
                    .ok_or_else(|| Error::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.lower(arg, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                function.compile(&args, self)
            }
        }
    }

    fn constant(&self, value: &str, kind: ScalarKind) -> Result<CompiledNode> {
        let process = self.engine().create_process(
            ProcessKind::ConstValue,
            Vec::new(),
            Attributes::from([
                ("value".to_string(), value.to_string()),
                ("kind".to_string(), kind.name().to_string()),
            ]),
        )?;
        Ok(CompiledNode {
            process,
            source: None,
            field: None,
            field_index: 0,
            kind,
            is_text: false,
        })
    }

    fn reference(&self, name: &str) -> Result<CompiledNode> {
        let source = self.resolve_reference(name)?;
        let process = self.engine().get_process(&source)?;
        if self.engine().classify(&process)? != SourceKind::Coverage {
            return Err(Error::UnsupportedOutputType(format!(
                "'{name}' is not a coverage and cannot appear in an expression"
            )));
        }
        // Expressions read the first field of the referenced source.
        let field = source
            .specification
            .fields
            .first()
            .ok_or_else(|| Error::InvalidArgument(format!("'{name}' has no fields")))?;
        let (kind, is_text) = match field.field_type {
            FieldType::Number => (ScalarKind::Double, false),
            FieldType::Boolean => (ScalarKind::Bool, false),
            FieldType::String => (ScalarKind::Unspecified, true),
            FieldType::Color => {
                return Err(Error::TypeMismatch(format!(
                    "'{name}' holds color values, which expressions cannot combine"
                )))
            }
        };
        Ok(CompiledNode {
            process,
            source: Some(source.clone()),
            field: Some(field.name.clone()),
            field_index: 0,
            kind,
            is_text,
        })
    }

    fn unary(&self, op: UnaryOp, operand: CompiledNode) -> Result<CompiledNode> {
        match op {
            UnaryOp::Not => {
                if operand.is_text || operand.kind != ScalarKind::Bool {
                    return Err(Error::TypeMismatch(
                        "'!' needs a boolean operand".to_string(),
                    ));
                }
                self.calculator("!", ScalarKind::Bool, vec![operand])
            }
            UnaryOp::Neg => {
                if operand.is_text {
                    return Err(Error::TypeMismatch(
                        "'-' is not defined for strings".to_string(),
                    ));
                }
                let kind = promote_arithmetic(operand.kind, ScalarKind::Unspecified);
                self.calculator("neg", kind, vec![operand])
            }
        }
    }

    fn binary(&self, op: BinaryOp, lhs: CompiledNode, rhs: CompiledNode) -> Result<CompiledNode> {
        if op.is_logical() {
            for side in [&lhs, &rhs] {
                if side.is_text || side.kind != ScalarKind::Bool {
                    return Err(Error::TypeMismatch(format!(
                        "'{}' needs boolean operands",
                        op.symbol()
                    )));
                }
            }
            return self.calculator(op.symbol(), ScalarKind::Bool, vec![lhs, rhs]);
        }

        if op.is_comparison() {
            match (lhs.is_text, rhs.is_text) {
                (false, false) => {}
                (true, true) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => {}
                (true, true) => {
                    return Err(Error::TypeMismatch(format!(
                        "strings only support '==' and '!=', not '{}'",
                        op.symbol()
                    )))
                }
                _ => {
                    return Err(Error::TypeMismatch(format!(
                        "'{}' cannot compare text with a number",
                        op.symbol()
                    )))
                }
            }
            return self.calculator(op.symbol(), ScalarKind::Bool, vec![lhs, rhs]);
        }

        // Arithmetic.
        if lhs.is_text || rhs.is_text {
            return Err(Error::TypeMismatch(format!(
                "'{}' is not defined for strings",
                op.symbol()
            )));
        }
        let kind = promote_arithmetic(lhs.kind, rhs.kind);
        self.calculator(op.symbol(), kind, vec![lhs, rhs])
    }

    fn calculator(
        &self,
        op: &str,
        kind: ScalarKind,
        operands: Vec<CompiledNode>,
    ) -> Result<CompiledNode> {
        let mut attributes = Attributes::from([
            ("op".to_string(), op.to_string()),
            ("kind".to_string(), kind.name().to_string()),
        ]);
        let mut inputs = Vec::new();
        for (index, operand) in operands.iter().enumerate() {
            if operand.field_index != 0 {
                attributes.insert(format!("field_{index}"), operand.field_index.to_string());
            }
            inputs.push(operand.process.clone());
        }
        let process = self
            .engine()
            .create_process(ProcessKind::Calculator, inputs, attributes)?;
        Ok(CompiledNode {
            process,
            source: None,
            field: Some("value".to_string()),
            field_index: 0,
            kind,
            is_text: false,
        })
    }

    /// Coerce a computed node to the requested output kind. Scalar nodes the
    /// compiler built itself are rewritten in place; anything else (function
    /// results, comparisons) gets an explicit cast node.
    fn cast(&self, node: CompiledNode, output: ScalarKind) -> Result<CompiledNode> {
        if node.is_text {
            return Err(Error::TypeMismatch(format!(
                "cannot produce {} output from a string expression",
                output.name()
            )));
        }
        let rewrite_in_place = match node.process.kind {
            ProcessKind::ConstValue => node.process.attribute("kind") != Some("str"),
            ProcessKind::Calculator => matches!(
                node.process.attribute("op"),
                Some("+" | "-" | "*" | "/" | "%" | "neg" | "cast")
            ),
            _ => false,
        };
        if rewrite_in_place {
            let mut attributes = node.process.attributes.clone();
            attributes.insert("kind".to_string(), output.name().to_string());
            let process = self.engine().create_process(
                node.process.kind,
                node.process.inputs.clone(),
                attributes,
            )?;
            return Ok(CompiledNode {
                process,
                kind: output,
                ..node
            });
        }
        self.calculator("cast", output, vec![node])
    }
}

/// Arithmetic result kind: numeric promotion, with booleans widened to int
/// and an all-unspecified expression defaulting to double.
fn promote_arithmetic(a: ScalarKind, b: ScalarKind) -> ScalarKind {
    match ScalarKind::unify(a, b) {
        ScalarKind::Bool => ScalarKind::Int,
        ScalarKind::Unspecified => ScalarKind::Double,
        kind => kind,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geocalc_core::{Field, FieldType, Value};
    use geocalc_engine::{CellIndex, GridEngine, MemoryEngine, ProcessKindTable};

    use super::*;
    use crate::context::EngineResolver;
    use crate::parser::parse;

    fn engine_with_elevation() -> MemoryEngine {
        let engine = MemoryEngine::new(ProcessKindTable::default());
        let mut cells = HashMap::new();
        for y in 0..4 {
            for x in 0..4 {
                cells.insert(CellIndex::new(x, y), vec![Value::Double(10.0)]);
            }
        }
        engine
            .register_coverage("elevation", vec![Field::new("elevation", FieldType::Number)], cells)
            .unwrap();
        engine
    }

    fn compile(engine: &MemoryEngine, expression: &str, output: ScalarKind) -> Result<Compiled> {
        let resolver = EngineResolver(engine);
        let context = ExpressionContext::new(engine, &resolver);
        context.compile(&parse(expression)?, output)
    }

    fn eval(engine: &MemoryEngine, compiled: &Compiled, cell: CellIndex) -> Value {
        let process = engine.get_process(&compiled.source).unwrap();
        engine.cell_value(&process, cell, 0).unwrap()
    }

    #[test]
    fn test_direct_reference_compiles_to_the_source_itself() {
        let engine = engine_with_elevation();
        let original = engine.resolve("elevation").unwrap();
        let compiled = compile(&engine, "elevation", ScalarKind::Unspecified).unwrap();
        assert_eq!(compiled.source, original);
    }

    #[test]
    fn test_arithmetic_expression_is_cached_and_evaluates() {
        let engine = engine_with_elevation();
        let compiled = compile(&engine, "elevation * 2 + 1", ScalarKind::Unspecified).unwrap();
        let process = engine.get_process(&compiled.source).unwrap();
        assert_eq!(process.kind, ProcessKind::CoverageCache);
        assert_eq!(eval(&engine, &compiled, CellIndex::new(1, 1)), Value::Double(21.0));
    }

    #[test]
    fn test_requested_output_kind_casts_the_result() {
        let engine = engine_with_elevation();
        let compiled = compile(&engine, "elevation / 3", ScalarKind::Int).unwrap();
        assert_eq!(compiled.node.kind, ScalarKind::Int);
        assert_eq!(eval(&engine, &compiled, CellIndex::new(0, 0)), Value::Int(3));
    }

    #[test]
    fn test_comparison_yields_boolean() {
        let engine = engine_with_elevation();
        let compiled = compile(&engine, "elevation > 5", ScalarKind::Unspecified).unwrap();
        assert_eq!(compiled.node.kind, ScalarKind::Bool);
        assert_eq!(eval(&engine, &compiled, CellIndex::new(0, 0)), Value::Bool(true));
    }

    #[test]
    fn test_string_equality_against_text_field() {
        let engine = MemoryEngine::new(ProcessKindTable::default());
        let mut cells = HashMap::new();
        cells.insert(CellIndex::new(0, 0), vec![Value::Str("park".into())]);
        cells.insert(CellIndex::new(1, 0), vec![Value::Str("road".into())]);
        engine
            .register_coverage("landuse", vec![Field::new("class", FieldType::String)], cells)
            .unwrap();
        let compiled = compile(&engine, "landuse == 'park'", ScalarKind::Unspecified).unwrap();
        assert_eq!(eval(&engine, &compiled, CellIndex::new(0, 0)), Value::Bool(true));
        assert_eq!(eval(&engine, &compiled, CellIndex::new(1, 0)), Value::Bool(false));
    }

    #[test]
    fn test_string_arithmetic_is_a_type_mismatch() {
        let engine = engine_with_elevation();
        let err = compile(&engine, "'park' + 1", ScalarKind::Unspecified).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_string_ordering_is_a_type_mismatch() {
        let engine = engine_with_elevation();
        let err = compile(&engine, "'a' < 'b'", ScalarKind::Unspecified).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_unresolved_reference() {
        let engine = engine_with_elevation();
        let err = compile(&engine, "missing + 1", ScalarKind::Unspecified).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(name) if name == "missing"));
    }

    #[test]
    fn test_unknown_function() {
        let engine = engine_with_elevation();
        let err = compile(&engine, "frobnicate(elevation)", ScalarKind::Unspecified).unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(name) if name == "frobnicate"));
    }

    #[test]
    fn test_nesting_bound() {
        let engine = engine_with_elevation();
        let expression = format!("{}elevation", "-".repeat(40));
        let err = compile(&engine, &expression, ScalarKind::Unspecified).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_logical_op_rejects_numbers() {
        let engine = engine_with_elevation();
        let err = compile(&engine, "elevation && true", ScalarKind::Unspecified).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }
}
