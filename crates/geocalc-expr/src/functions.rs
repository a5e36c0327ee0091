//! Built-in complex functions.
//!
//! These are the expression-language names for derived processes the engine
//! already knows how to run: terrain slope/aspect, first-not-null coverage
//! composition, and value remapping. Each one validates its arguments and
//! emits the corresponding process node.

use std::sync::Arc;

use geocalc_core::{Error, Result, ScalarKind};
use geocalc_engine::{Attributes, ProcessKind, SourceKind};

use crate::compile::CompiledNode;
use crate::context::{ExpressionContext, FunctionCompiler};

pub(crate) fn register_builtins(context: &mut ExpressionContext) {
    context.register("slope", Arc::new(SlopeFunction));
    context.register("aspect", Arc::new(AspectFunction));
    context.register("first", Arc::new(FirstFunction));
    context.register("transform", Arc::new(TransformFunction));
}

/// `slope(coverage)`: terrain slope magnitude.
pub struct SlopeFunction;

impl FunctionCompiler for SlopeFunction {
    fn compile(&self, args: &[CompiledNode], ctx: &ExpressionContext) -> Result<CompiledNode> {
        let input = single_coverage(args, "slope", ctx)?;
        let process =
            ctx.engine()
                .create_process(ProcessKind::Slope, vec![input.process.clone()], Attributes::new())?;
        Ok(CompiledNode {
            process,
            source: None,
            field: Some("slope".to_string()),
            field_index: 0,
            kind: ScalarKind::Double,
            is_text: false,
        })
    }
}

/// `aspect(coverage)`: bearing of steepest descent, degrees.
pub struct AspectFunction;

impl FunctionCompiler for AspectFunction {
    fn compile(&self, args: &[CompiledNode], ctx: &ExpressionContext) -> Result<CompiledNode> {
        let input = single_coverage(args, "aspect", ctx)?;
        let process = ctx.engine().create_process(
            ProcessKind::Aspect,
            vec![input.process.clone()],
            Attributes::new(),
        )?;
        Ok(CompiledNode {
            process,
            source: None,
            field: Some("aspect".to_string()),
            field_index: 0,
            kind: ScalarKind::Double,
            is_text: false,
        })
    }
}

/// `first(a, b, ...)`: per-cell first non-null value, left to right.
/// Trailing constant arguments act as a fill value.
pub struct FirstFunction;

impl FunctionCompiler for FirstFunction {
    fn compile(&self, args: &[CompiledNode], ctx: &ExpressionContext) -> Result<CompiledNode> {
        if args.len() < 2 {
            return Err(Error::InvalidArgument(
                "first() needs at least two arguments".to_string(),
            ));
        }
        let mut kind = ScalarKind::Unspecified;
        let mut inputs = Vec::with_capacity(args.len());
        for arg in args {
            if arg.is_text {
                return Err(Error::TypeMismatch(
                    "first() combines numeric coverages, not strings".to_string(),
                ));
            }
            if ctx.engine().classify(&arg.process)? != SourceKind::Coverage {
                return Err(Error::UnsupportedOutputType(
                    "first() arguments must be coverages".to_string(),
                ));
            }
            kind = ScalarKind::unify(kind, arg.kind);
            inputs.push(arg.process.clone());
        }
        let process =
            ctx.engine()
                .create_process(ProcessKind::CoverageFirstNotNull, inputs, Attributes::new())?;
        Ok(CompiledNode {
            process,
            source: None,
            field: args[0].field.clone().or_else(|| Some("value".to_string())),
            field_index: 0,
            kind,
            is_text: false,
        })
    }
}

/// `transform(coverage, from1, to1, from2, to2, ...)`: exact-match value
/// remap; unmatched cells become null.
pub struct TransformFunction;

impl FunctionCompiler for TransformFunction {
    fn compile(&self, args: &[CompiledNode], ctx: &ExpressionContext) -> Result<CompiledNode> {
        if args.len() < 3 || (args.len() - 1) % 2 != 0 {
            return Err(Error::InvalidArgument(
                "transform() needs a coverage followed by from/to pairs".to_string(),
            ));
        }
        let input = &args[0];
        if ctx.engine().classify(&input.process)? != SourceKind::Coverage {
            return Err(Error::UnsupportedOutputType(
                "transform() input must be a coverage".to_string(),
            ));
        }
        let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
        for pair in args[1..].chunks(2) {
            pairs.push((literal_number(&pair[0])?, literal_number(&pair[1])?));
        }
        let table = serde_json::to_string(&pairs)?;
        let process = ctx.engine().create_process(
            ProcessKind::ValueTransform,
            vec![input.process.clone()],
            Attributes::from([("table".to_string(), table)]),
        )?;
        Ok(CompiledNode {
            process,
            source: None,
            field: input.field.clone().or_else(|| Some("value".to_string())),
            field_index: 0,
            kind: ScalarKind::Double,
            is_text: false,
        })
    }
}

fn single_coverage<'a>(
    args: &'a [CompiledNode],
    function: &str,
    ctx: &ExpressionContext,
) -> Result<&'a CompiledNode> {
    let [input] = args else {
        return Err(Error::InvalidArgument(format!(
            "{function}() takes exactly one argument"
        )));
    };
    if input.is_text || ctx.engine().classify(&input.process)? != SourceKind::Coverage {
        return Err(Error::UnsupportedOutputType(format!(
            "{function}() input must be a numeric coverage"
        )));
    }
    Ok(input)
}

fn literal_number(node: &CompiledNode) -> Result<f64> {
    if node.process.kind == ProcessKind::ConstValue && !node.is_text {
        if let Some(value) = node.process.attribute("value") {
            if let Ok(number) = value.parse::<f64>() {
                return Ok(number);
            }
        }
    }
    Err(Error::InvalidArgument(
        "transform() mapping values must be numeric literals".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geocalc_core::{Field, FieldType, Value};
    use geocalc_engine::{CellIndex, GridEngine, MemoryEngine, ProcessKindTable};

    use super::*;
    use crate::compile::Compiled;
    use crate::context::EngineResolver;
    use crate::parser::parse;

    fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new(ProcessKindTable::default());
        let mut ramp = HashMap::new();
        let mut sparse = HashMap::new();
        for y in 0..4 {
            for x in 0..4 {
                ramp.insert(CellIndex::new(x, y), vec![Value::Double(x as f64 * 3.0)]);
            }
        }
        sparse.insert(CellIndex::new(0, 0), vec![Value::Double(7.0)]);
        engine
            .register_coverage("terrain", vec![Field::new("elevation", FieldType::Number)], ramp)
            .unwrap();
        engine
            .register_coverage("sparse", vec![Field::new("value", FieldType::Number)], sparse)
            .unwrap();
        engine
    }

    fn compile(engine: &MemoryEngine, expression: &str) -> Result<Compiled> {
        let resolver = EngineResolver(engine);
        let context = ExpressionContext::new(engine, &resolver);
        context.compile(&parse(expression)?, ScalarKind::Unspecified)
    }

    fn eval(engine: &MemoryEngine, compiled: &Compiled, cell: CellIndex) -> Value {
        let process = engine.get_process(&compiled.source).unwrap();
        engine.cell_value(&process, cell, 0).unwrap()
    }

    #[test]
    fn test_slope_of_ramp() {
        let engine = engine();
        let compiled = compile(&engine, "slope(terrain)").unwrap();
        assert_eq!(eval(&engine, &compiled, CellIndex::new(1, 1)), Value::Double(3.0));
    }

    #[test]
    fn test_slope_arity() {
        let engine = engine();
        assert!(matches!(
            compile(&engine, "slope(terrain, sparse)"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_first_falls_back_left_to_right() {
        let engine = engine();
        let compiled = compile(&engine, "first(sparse, terrain, 0)").unwrap();
        assert_eq!(eval(&engine, &compiled, CellIndex::new(0, 0)), Value::Double(7.0));
        assert_eq!(eval(&engine, &compiled, CellIndex::new(2, 0)), Value::Double(6.0));
    }

    #[test]
    fn test_first_needs_two_arguments() {
        let engine = engine();
        assert!(matches!(
            compile(&engine, "first(terrain)"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_transform_remaps_exact_values() {
        let engine = engine();
        let compiled = compile(&engine, "transform(terrain, 0, 100, 3, 300)").unwrap();
        assert_eq!(eval(&engine, &compiled, CellIndex::new(0, 0)), Value::Double(100.0));
        assert_eq!(eval(&engine, &compiled, CellIndex::new(1, 0)), Value::Double(300.0));
        // Unmapped values become null.
        assert_eq!(eval(&engine, &compiled, CellIndex::new(2, 0)), Value::Null);
    }

    #[test]
    fn test_transform_rejects_non_literal_mapping() {
        let engine = engine();
        assert!(matches!(
            compile(&engine, "transform(terrain, sparse, 1)"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_functions_compose_with_operators() {
        let engine = engine();
        let compiled = compile(&engine, "slope(terrain) > 1.0").unwrap();
        assert_eq!(eval(&engine, &compiled, CellIndex::new(1, 1)), Value::Bool(true));
    }
}
