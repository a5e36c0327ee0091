//! Mosaic composition: N compatible GeoSources → one composite.
//!
//! Coverages compose by ordered first-not-null (leftmost input wins per
//! cell); feature collections concatenate in input order under a summary
//! aggregation. Inputs are stripped of display-style wrappers, and of cache
//! wrappers when the source has never been published, so the composite does
//! not stack redundant layers.

use geocalc_core::{Error, GeoSource, OutputType, Result};
use geocalc_engine::{Attributes, GridEngine, Process, ProcessKind};

/// Compose GeoSources into a single derived source.
///
/// Zero sources is an error, one source is returned unchanged, and two or
/// more must be mosaic-compatible with the first.
pub fn mosaic(engine: &dyn GridEngine, sources: &[GeoSource]) -> Result<GeoSource> {
    let (first, rest) = match sources {
        [] => {
            return Err(Error::InvalidArgument("no sources to mosaic".to_string()));
        }
        [single] => return Ok(single.clone()),
        [first, rest @ ..] => (first, rest),
    };

    for source in rest {
        if !first
            .specification
            .is_mosaic_compatible(&source.specification)
        {
            return Err(Error::IncompatibleSpecification(format!(
                "'{}' does not match the shape of '{}'",
                source.metadata.name, first.metadata.name
            )));
        }
    }

    let name = format!(
        "{} (mosaic of {} GeoSources)",
        first.metadata.name,
        sources.len()
    );
    let description = first.metadata.description.clone();

    match first.specification.output_type {
        OutputType::Coverage => {
            let inputs = strip_inputs(engine, sources, ProcessKind::StyledCoverage)?;
            let combined =
                engine.create_process(ProcessKind::CoverageFirstNotNull, inputs, Attributes::new())?;
            let cached =
                engine.create_process(ProcessKind::CoverageCache, vec![combined], Attributes::new())?;
            engine.materialize(&cached, &name, &description)
        }
        OutputType::Feature => {
            let inputs = strip_inputs(engine, sources, ProcessKind::StyledFeatures)?;
            let concatenated =
                engine.create_process(ProcessKind::ConcatFeatures, inputs, Attributes::new())?;
            let summarized = engine.create_process(
                ProcessKind::FeaturesSummary,
                vec![concatenated],
                Attributes::new(),
            )?;
            engine.materialize(&summarized, &name, &description)
        }
    }
}

/// Unwrap each source's process for composition: style wrappers always come
/// off; cache wrappers only while the source is unpublished (a published
/// source's cache is part of its served identity).
fn strip_inputs(
    engine: &dyn GridEngine,
    sources: &[GeoSource],
    style: ProcessKind,
) -> Result<Vec<Process>> {
    sources
        .iter()
        .map(|source| {
            let mut process = engine.get_process(source)?.strip(style);
            if !source.is_published() {
                process = process.strip(ProcessKind::CoverageCache);
            }
            Ok(process)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geocalc_core::{Field, FieldType, Value};
    use geocalc_engine::{CellIndex, Feature, Geometry, MemoryEngine, ProcessKindTable};

    use super::*;

    fn engine() -> MemoryEngine {
        MemoryEngine::new(ProcessKindTable::default())
    }

    fn coverage(engine: &MemoryEngine, name: &str, cells: &[(i64, i64, f64)]) -> GeoSource {
        let mut lattice = HashMap::new();
        for &(x, y, v) in cells {
            lattice.insert(CellIndex::new(x, y), vec![Value::Double(v)]);
        }
        engine
            .register_coverage(name, vec![Field::new("value", FieldType::Number)], lattice)
            .unwrap()
    }

    #[test]
    fn test_mosaic_of_nothing_is_invalid() {
        let engine = engine();
        assert!(matches!(
            mosaic(&engine, &[]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mosaic_of_one_is_identity() {
        let engine = engine();
        let only = coverage(&engine, "only", &[(0, 0, 1.0)]);
        assert_eq!(mosaic(&engine, &[only.clone()]).unwrap(), only);
    }

    #[test]
    fn test_incompatible_specifications_are_rejected() {
        let engine = engine();
        let numbers = coverage(&engine, "numbers", &[(0, 0, 1.0)]);
        let mut cells = HashMap::new();
        cells.insert(CellIndex::new(0, 0), vec![Value::Str("park".into())]);
        let strings = engine
            .register_coverage("strings", vec![Field::new("class", FieldType::String)], cells)
            .unwrap();
        assert!(matches!(
            mosaic(&engine, &[numbers, strings]),
            Err(Error::IncompatibleSpecification(_))
        ));
    }

    #[test]
    fn test_coverage_mosaic_prefers_leftmost_value() {
        let engine = engine();
        let patch = coverage(&engine, "patch", &[(0, 0, 1.0)]);
        let base = coverage(&engine, "base", &[(0, 0, 9.0), (1, 0, 9.0)]);

        let composite = mosaic(&engine, &[patch, base]).unwrap();
        assert!(composite.metadata.name.contains("(mosaic of 2 GeoSources)"));

        let process = engine.get_process(&composite).unwrap();
        assert_eq!(process.kind, ProcessKind::CoverageCache);
        assert_eq!(
            engine.cell_value(&process, CellIndex::new(0, 0), 0).unwrap(),
            Value::Double(1.0)
        );
        assert_eq!(
            engine.cell_value(&process, CellIndex::new(1, 0), 0).unwrap(),
            Value::Double(9.0)
        );
    }

    #[test]
    fn test_feature_mosaic_concatenates_in_order() {
        let engine = engine();
        let fields = vec![Field::new("name", FieldType::String)];
        let feature = |id: &str, name: &str| Feature {
            id: id.to_string(),
            geometry: Geometry::Cell(CellIndex::new(0, 0)),
            values: [("name".to_string(), Value::Str(name.to_string()))].into(),
        };
        let parks = engine
            .register_features("parks", fields.clone(), vec![feature("p1", "Hyde Park")])
            .unwrap();
        let roads = engine
            .register_features("roads", fields, vec![feature("r1", "Main Street")])
            .unwrap();

        let composite = mosaic(&engine, &[parks, roads]).unwrap();
        let process = engine.get_process(&composite).unwrap();
        assert_eq!(process.kind, ProcessKind::FeaturesSummary);

        let ids: Vec<String> = engine
            .features(&process, None)
            .unwrap()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["p1", "r1"]);
    }
}
