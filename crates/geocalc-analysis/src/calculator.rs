//! End-to-end calculation: expression string → derived GeoSource.

use geocalc_core::{Error, GeoSource, Result, ScalarKind};
use geocalc_engine::GridEngine;
use geocalc_expr::{parse, ExpressionContext, Resolver};

/// Parse, compile, and materialize an expression.
///
/// `output_type` is a requested scalar kind name ("bool", "byte", "int",
/// "double"); unrecognized names let the expression infer its own kind.
/// Failures are wrapped with a top-level context message, since the
/// expression usually comes straight from an end user.
pub fn calculate(
    engine: &dyn GridEngine,
    resolver: &dyn Resolver,
    expression: &str,
    output_type: &str,
) -> Result<GeoSource> {
    let tree = parse(expression)?;
    let context = ExpressionContext::new(engine, resolver);
    let compiled = context
        .compile(&tree, ScalarKind::normalize(output_type))
        .map_err(|e| wrap_compile_error(expression, e))?;
    Ok(compiled.source)
}

/// Prefix the failure with the offending expression while keeping its
/// variant, so callers can still match on the failure class.
fn wrap_compile_error(expression: &str, error: Error) -> Error {
    let context = |detail: String| format!("failed to compile '{expression}': {detail}");
    match error {
        // Parse errors already carry their own prefix.
        Error::Parse(_) => error,
        Error::UnresolvedReference(m) => Error::UnresolvedReference(context(m)),
        Error::UnknownFunction(m) => Error::UnknownFunction(context(m)),
        Error::TypeMismatch(m) => Error::TypeMismatch(context(m)),
        Error::UnsupportedOutputType(m) => Error::UnsupportedOutputType(context(m)),
        Error::InvalidArgument(m) => Error::InvalidArgument(context(m)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geocalc_core::{Field, FieldType, OutputType, Value};
    use geocalc_engine::{CellIndex, MemoryEngine, ProcessKindTable};
    use geocalc_expr::EngineResolver;

    use super::*;

    fn engine_with_elevation() -> MemoryEngine {
        let engine = MemoryEngine::new(ProcessKindTable::default());
        let mut cells = HashMap::new();
        for y in 0..4 {
            for x in 0..4 {
                cells.insert(CellIndex::new(x, y), vec![Value::Double(x as f64)]);
            }
        }
        engine
            .register_coverage(
                "elevation",
                vec![Field::new("elevation", FieldType::Number)],
                cells,
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_calculate_produces_a_coverage() {
        let engine = engine_with_elevation();
        let resolver = EngineResolver(&engine);
        let source = calculate(&engine, &resolver, "elevation * 10", "double").unwrap();
        assert_eq!(source.specification.output_type, OutputType::Coverage);

        let process = engine.get_process(&source).unwrap();
        assert_eq!(
            engine.cell_value(&process, CellIndex::new(2, 0), 0).unwrap(),
            Value::Double(20.0)
        );
    }

    #[test]
    fn test_parse_failure_keeps_its_prefix() {
        let engine = engine_with_elevation();
        let resolver = EngineResolver(&engine);
        let err = calculate(&engine, &resolver, "elevation +", "double").unwrap_err();
        assert!(err.to_string().contains("failed to parse expression"));
    }

    #[test]
    fn test_compile_failure_names_the_expression() {
        let engine = engine_with_elevation();
        let resolver = EngineResolver(&engine);
        let err = calculate(&engine, &resolver, "missing + 1", "double").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
