use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, Criterion};

use geocalc_core::{Field, FieldType, ScalarKind, Value};
use geocalc_engine::{CellIndex, Geometry, GridEngine, MemoryEngine, ProcessKindTable};
use geocalc_expr::{parse, EngineResolver, ExpressionContext};

fn make_engine(width: i64, height: i64) -> MemoryEngine {
    let engine = MemoryEngine::new(ProcessKindTable::default());
    let mut elevation = HashMap::new();
    let mut landcover = HashMap::new();
    for y in 0..height {
        for x in 0..width {
            elevation.insert(
                CellIndex::new(x, y),
                vec![Value::Double(((x * 13 + y * 7) % 100) as f64)],
            );
            landcover.insert(CellIndex::new(x, y), vec![Value::Double((x % 5) as f64)]);
        }
    }
    engine
        .register_coverage(
            "elevation",
            vec![Field::new("elevation", FieldType::Number)],
            elevation,
        )
        .unwrap();
    engine
        .register_coverage(
            "landcover",
            vec![Field::new("class", FieldType::Number)],
            landcover,
        )
        .unwrap();
    engine
}

fn bench_parse(c: &mut Criterion) {
    let expression = "slope(elevation) > 1.5 && first(landcover, 0) != 3 || elevation / 100 >= 0.5";
    c.bench_function("parse_expression", |b| {
        b.iter(|| parse(expression).unwrap());
    });
}

fn bench_compile(c: &mut Criterion) {
    let engine = make_engine(16, 16);
    let tree = parse("slope(elevation) * 2 + first(landcover, 0)").unwrap();
    c.bench_function("compile_expression", |b| {
        b.iter(|| {
            let resolver = EngineResolver(&engine);
            let context = ExpressionContext::new(&engine, &resolver);
            context.compile(&tree, ScalarKind::Double).unwrap()
        });
    });
}

fn bench_evaluate_region(c: &mut Criterion) {
    let engine = make_engine(32, 32);
    let resolver = EngineResolver(&engine);
    let source =
        geocalc_analysis::calculate(&engine, &resolver, "elevation * 2 + 1", "double").unwrap();
    let process = engine.get_process(&source).unwrap();
    let region = Geometry::rect(0, 0, 31, 31);

    c.bench_function("evaluate_region", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for cell in region.cells() {
                if let Some(v) = engine.cell_value(&process, cell, 0).unwrap().as_f64() {
                    sum += v;
                }
            }
            sum
        });
    });
}

criterion_group!(benches, bench_parse, bench_compile, bench_evaluate_region);
criterion_main!(benches);
