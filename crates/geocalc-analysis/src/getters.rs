//! Read-side accessors: feature enumeration, substring search, and single-cell
//! coverage reads.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use geocalc_core::{GeoSource, Result};
use geocalc_engine::{
    Attributes, CellIndex, Feature, FeatureCollection, Geometry, GridEngine, Process, ProcessKind,
};

const DEFAULT_TAKE: usize = 10;

/// Declarative substring-search request against a feature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturesSearchQuery {
    pub geo_source: GeoSource,
    /// Field names to search through.
    pub fields: Vec<String>,
    pub search: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<usize>,
}

/// Enumerates and searches the features behind one GeoSource.
pub struct FeatureGetter<'a> {
    engine: &'a dyn GridEngine,
    source: GeoSource,
    /// Search indexes by space-joined field list; `None` records a failed
    /// initialization so it is not retried per call.
    indexes: Mutex<HashMap<String, Option<Process>>>,
}

impl<'a> FeatureGetter<'a> {
    pub fn new(engine: &'a dyn GridEngine, source: GeoSource) -> Self {
        Self {
            engine,
            source,
            indexes: Mutex::new(HashMap::new()),
        }
    }

    /// Enumerate features, optionally restricted to a geometry, with
    /// skip/take pagination. Enumeration is a forward pass; the page is
    /// collected without materializing what comes after it.
    pub fn get_features(
        &self,
        geometry: Option<&Geometry>,
        skip: usize,
        take: usize,
    ) -> Result<FeatureCollection> {
        let process = self.engine.get_process(&self.source)?;
        let features = self
            .engine
            .features(&process, geometry)?
            .skip(skip)
            .take(take)
            .collect();
        Ok(FeatureCollection {
            fields: self.source.specification.fields.clone(),
            features,
        })
    }

    /// Feature count without enumeration. Sources that would have to walk
    /// every feature to answer fail with `UnsupportedOperation`.
    pub fn get_features_count(&self) -> Result<u64> {
        let process = self.engine.get_process(&self.source)?;
        self.engine.features_count(&process)
    }

    /// Case-insensitive substring search over the query's fields. The field
    /// index is built on first use; when it cannot be initialized the search
    /// degrades to an empty result set instead of failing the request.
    pub fn search(&self, query: &FeaturesSearchQuery) -> FeatureCollection {
        let fields = self.source.specification.fields.clone();
        let Some(index) = self.index_for(&query.fields) else {
            return FeatureCollection::empty(fields);
        };
        let hits = match self.engine.search(&index, &query.search) {
            Ok(hits) => hits,
            Err(_) => return FeatureCollection::empty(fields),
        };
        let features = hits
            .into_iter()
            .filter(|feature| {
                query
                    .geometry
                    .as_ref()
                    .map_or(true, |g| feature.geometry.intersects(g))
            })
            .skip(query.skip.unwrap_or(0))
            .take(query.take.unwrap_or(DEFAULT_TAKE))
            .collect();
        FeatureCollection { fields, features }
    }

    fn index_for(&self, fields: &[String]) -> Option<Process> {
        let key = fields.join(" ");
        let mut indexes = match self.indexes.lock() {
            Ok(indexes) => indexes,
            Err(_) => return None,
        };
        indexes
            .entry(key.clone())
            .or_insert_with(|| {
                self.engine
                    .get_process(&self.source)
                    .and_then(|process| {
                        self.engine.create_process(
                            ProcessKind::FeatureFieldIndex,
                            vec![process],
                            Attributes::from([("fields".to_string(), key)]),
                        )
                    })
                    .ok()
            })
            .clone()
    }
}

/// Reads individual cell values of a coverage as a one-feature collection.
pub struct CoverageGetter<'a> {
    engine: &'a dyn GridEngine,
    source: GeoSource,
}

impl<'a> CoverageGetter<'a> {
    pub fn new(engine: &'a dyn GridEngine, source: GeoSource) -> Self {
        Self { engine, source }
    }

    /// Every field's value at a single-cell geometry. Anything other than a
    /// single cell, or a cell the coverage holds no values for, yields an
    /// empty collection.
    pub fn get_value(&self, geometry: &Geometry) -> Result<FeatureCollection> {
        let fields = self.source.specification.fields.clone();
        let Some(cell) = single_cell(geometry) else {
            return Ok(FeatureCollection::empty(fields));
        };
        let process = self.engine.get_process(&self.source)?;

        let mut values = std::collections::BTreeMap::new();
        let mut any = false;
        for (index, field) in fields.iter().enumerate() {
            let value = self.engine.cell_value(&process, cell, index)?;
            any |= !value.is_null();
            values.insert(field.name.clone(), value);
        }
        if !any {
            return Ok(FeatureCollection::empty(fields));
        }
        Ok(FeatureCollection {
            fields,
            features: vec![Feature {
                id: format!("{},{}", cell.x, cell.y),
                geometry: Geometry::Cell(cell),
                values,
            }],
        })
    }
}

fn single_cell(geometry: &Geometry) -> Option<CellIndex> {
    match geometry {
        Geometry::Cell(cell) => Some(*cell),
        Geometry::CellSet(cells) if cells.len() == 1 => Some(cells[0]),
        _ => None,
    }
}

/// Search against a query's own GeoSource.
pub fn search(engine: &dyn GridEngine, query: &FeaturesSearchQuery) -> FeatureCollection {
    FeatureGetter::new(engine, query.geo_source.clone()).search(query)
}
