//! Field statistics: histogram reduction into reportable distributions.
//!
//! A `StatisticsCreator` wraps one GeoSource and answers repeated
//! field-statistics calls against it. The underlying process and its output
//! classification are computed once per instance; independent instances are
//! fully parallel. Counts stay [min,max] ranges end to end because the grid
//! engine can only bound cell counts at coarse resolutions.
//!
//! Failure policy: the histogram paths prefer `None` over an error when the
//! failure means "no applicable data" (missing geometry, unknown field,
//! unsupported source, engine fault); exact-value lookups propagate faults.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use geocalc_core::{Error, FieldType, GeoSource, Result, Value};
use geocalc_engine::{
    CountRange, Geometry, GridEngine, Histogram, HistogramScale, Process, SourceKind,
};

/// Fields with fewer observations than this get their bin count raised to
/// the observation count, so sparse data is not over-binned.
const SMALL_HISTOGRAM: f64 = 50.0;

const MIN_BINS: usize = 10;
const MAX_BINS: usize = 200;

/// One reported slice of the value axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub min: Value,
    pub max: Value,
    pub min_count: f64,
    pub max_count: f64,
    /// Midpoint count share of the total; sums to 1.0 across the histogram.
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub histogram: Vec<Bin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStatistics {
    pub min: Value,
    pub max: Value,
    /// Present only for numeric fields.
    pub average: Option<f64>,
    pub sum: Option<f64>,
    pub min_count: f64,
    pub max_count: f64,
    pub distribution: Distribution,
}

pub struct StatisticsCreator<'a> {
    engine: &'a dyn GridEngine,
    source: Option<GeoSource>,
    process: OnceLock<Option<Process>>,
    kind: OnceLock<SourceKind>,
}

impl<'a> StatisticsCreator<'a> {
    pub fn new(engine: &'a dyn GridEngine, source: GeoSource) -> Self {
        Self {
            engine,
            source: Some(source),
            process: OnceLock::new(),
            kind: OnceLock::new(),
        }
    }

    /// Wrap an already-built process directly.
    pub fn from_process(engine: &'a dyn GridEngine, process: Process) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(process));
        Self {
            engine,
            source: None,
            process: cell,
            kind: OnceLock::new(),
        }
    }

    fn process(&self) -> Option<&Process> {
        self.process
            .get_or_init(|| {
                self.source
                    .as_ref()
                    .and_then(|source| self.engine.get_process(source).ok())
            })
            .as_ref()
    }

    /// As [`process`](Self::process), but surfacing the engine fault instead
    /// of swallowing it. Used by the exact-lookup path.
    fn require_process(&self) -> Result<Process> {
        if let Some(process) = self.process() {
            return Ok(process.clone());
        }
        match &self.source {
            Some(source) => self.engine.get_process(source),
            None => Err(Error::EngineFault("statistics source has no process".into())),
        }
    }

    fn kind(&self) -> SourceKind {
        *self.kind.get_or_init(|| {
            self.process()
                .and_then(|process| self.engine.classify(process).ok())
                .unwrap_or(SourceKind::Unsupported)
        })
    }

    /// Distribution of one field over a geometry. Coverage fields holding
    /// boolean or 8-bit values are treated as categorical (no axis
    /// rescaling); other coverage fields bin linearly; feature sources bin
    /// by equal frequency.
    pub fn get_field_statistics(
        &self,
        geometry: Option<&Geometry>,
        field: &str,
        bin_count: usize,
    ) -> Option<FieldStatistics> {
        self.field_statistics(geometry, field, bin_count, false)
    }

    /// As [`get_field_statistics`](Self::get_field_statistics), but coverage
    /// sources also bin by equal frequency.
    pub fn get_field_normalized_statistics(
        &self,
        geometry: Option<&Geometry>,
        field: &str,
        bin_count: usize,
    ) -> Option<FieldStatistics> {
        self.field_statistics(geometry, field, bin_count, true)
    }

    fn field_statistics(
        &self,
        geometry: Option<&Geometry>,
        field: &str,
        bin_count: usize,
        normalized: bool,
    ) -> Option<FieldStatistics> {
        let geometry = geometry?;
        let process = self.process()?.clone();
        let specification = self.engine.specification(&process).ok()?;
        let field_index = specification.field_index(field)?;
        let field_type = specification.fields[field_index].field_type;
        let mut bins = bin_count.clamp(MIN_BINS, MAX_BINS);

        let (histogram, scale) = match self.kind() {
            SourceKind::Coverage => {
                let histogram = self
                    .engine
                    .coverage_histogram(&process, field_index, geometry)
                    .ok()?;
                let scale = if normalized {
                    HistogramScale::Normalized
                } else if field_type == FieldType::Boolean || is_categorical(&histogram) {
                    HistogramScale::None
                } else {
                    HistogramScale::Linear
                };
                (histogram, scale)
            }
            SourceKind::FeatureCollection => {
                let histogram = self
                    .engine
                    .feature_histogram(&process, field_index, Some(geometry))
                    .ok()?;
                (histogram, HistogramScale::Normalized)
            }
            SourceKind::FeatureGroup => {
                let histogram = self
                    .engine
                    .group_histogram(&process, field_index, Some(geometry))
                    .ok()?;
                (histogram, HistogramScale::Normalized)
            }
            SourceKind::Unsupported => return None,
        };

        // Sparse feature sets get one bin per observation.
        if matches!(
            self.kind(),
            SourceKind::FeatureCollection | SourceKind::FeatureGroup
        ) {
            bins = raised_bin_count(bins, &histogram.total);
        }

        let mut statistics = reduce(&histogram, scale, bins)?;
        // Average/sum are only meaningful for plain numeric fields.
        if field_type != FieldType::Number {
            statistics.average = None;
            statistics.sum = None;
        }
        Some(statistics)
    }

    /// Exact-match count of one value: a single-bin statistic answering "how
    /// many features/cells hold exactly this value". Engine faults propagate.
    pub fn get_field_statistics_with_value(
        &self,
        geometry: Option<&Geometry>,
        field: &str,
        value: &str,
    ) -> Result<FieldStatistics> {
        let process = self.require_process()?;
        let specification = self.engine.specification(&process)?;
        let field_index = specification
            .field_index(field)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown field '{field}'")))?;
        let value = Value::parse_as(value, specification.fields[field_index].field_type)?;

        let histogram = match self.kind() {
            SourceKind::Coverage => {
                let geometry = geometry.ok_or_else(|| {
                    Error::InvalidArgument("coverage value lookups need a geometry".into())
                })?;
                self.engine
                    .coverage_histogram(&process, field_index, geometry)?
            }
            SourceKind::FeatureCollection => {
                self.engine
                    .feature_histogram(&process, field_index, geometry)?
            }
            SourceKind::FeatureGroup => {
                self.engine.group_histogram(&process, field_index, geometry)?
            }
            SourceKind::Unsupported => {
                return Err(Error::UnsupportedOperation(
                    "source does not support value lookups".into(),
                ))
            }
        };

        let count = histogram.value_count(&value);
        Ok(FieldStatistics {
            min: value.clone(),
            max: value.clone(),
            average: None,
            sum: None,
            min_count: count.min,
            max_count: count.max,
            distribution: Distribution {
                histogram: vec![Bin {
                    min: value.clone(),
                    max: value,
                    min_count: count.min,
                    max_count: count.max,
                    frequency: 1.0,
                }],
            },
        })
    }
}

/// Boolean and 8-bit values enumerate a small fixed domain; their histograms
/// keep one bin per distinct value regardless of the declared field type.
fn is_categorical(histogram: &Histogram) -> bool {
    matches!(histogram.min, Value::Bool(_) | Value::Byte(_))
}

/// Observation sets smaller than [`SMALL_HISTOGRAM`] get at least one bin per
/// observation, judged by the count's upper bound.
fn raised_bin_count(bins: usize, total: &CountRange) -> usize {
    if total.max < SMALL_HISTOGRAM {
        bins.max(total.max as usize)
    } else {
        bins
    }
}

/// Reduce a raw histogram into a reported distribution at the given scale.
fn reduce(histogram: &Histogram, scale: HistogramScale, bins: usize) -> Option<FieldStatistics> {
    if histogram.is_empty() {
        return None;
    }
    let reported = match scale {
        HistogramScale::None => raw_bins(histogram),
        HistogramScale::Linear => linear_bins(histogram, bins),
        HistogramScale::Normalized => normalized_bins(histogram, bins),
    };

    let total: f64 = reported.iter().map(|b| (b.min_count + b.max_count) / 2.0).sum();
    let reported = reported
        .into_iter()
        .map(|mut bin| {
            bin.frequency = if total > 0.0 {
                (bin.min_count + bin.max_count) / 2.0 / total
            } else {
                0.0
            };
            bin
        })
        .collect();

    Some(FieldStatistics {
        min: histogram.min.clone(),
        max: histogram.max.clone(),
        average: histogram.average,
        sum: histogram.sum,
        min_count: histogram.total.min,
        max_count: histogram.total.max,
        distribution: Distribution { histogram: reported },
    })
}

fn raw_bins(histogram: &Histogram) -> Vec<Bin> {
    histogram
        .bins
        .iter()
        .map(|raw| Bin {
            min: raw.min.clone(),
            max: raw.max.clone(),
            min_count: raw.count.min,
            max_count: raw.count.max,
            frequency: 0.0,
        })
        .collect()
}

/// Equal-width ranges across [min, max]. Falls back to raw bins when the
/// boundaries are not numeric.
fn linear_bins(histogram: &Histogram, bins: usize) -> Vec<Bin> {
    let (Some(min), Some(max)) = (histogram.min.as_f64(), histogram.max.as_f64()) else {
        return raw_bins(histogram);
    };
    let width = (max - min) / bins as f64;
    if width <= 0.0 {
        return raw_bins(histogram);
    }

    let mut counts = vec![(0.0_f64, 0.0_f64); bins];
    for raw in &histogram.bins {
        let Some(value) = raw.min.as_f64() else {
            return raw_bins(histogram);
        };
        let index = (((value - min) / width) as usize).min(bins - 1);
        counts[index].0 += raw.count.min;
        counts[index].1 += raw.count.max;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, (min_count, max_count))| Bin {
            min: Value::Double(min + width * i as f64),
            max: Value::Double(min + width * (i + 1) as f64),
            min_count,
            max_count,
            frequency: 0.0,
        })
        .collect()
}

/// Equal-frequency ranges: each reported bin closes once it holds roughly a
/// `1/bins` share of the total count.
fn normalized_bins(histogram: &Histogram, bins: usize) -> Vec<Bin> {
    let target = histogram.total.midpoint() / bins as f64;
    if target <= 0.0 {
        return raw_bins(histogram);
    }

    let mut reported: Vec<Bin> = Vec::new();
    let mut open: Option<Bin> = None;
    for raw in &histogram.bins {
        let bin = open.get_or_insert_with(|| Bin {
            min: raw.min.clone(),
            max: raw.max.clone(),
            min_count: 0.0,
            max_count: 0.0,
            frequency: 0.0,
        });
        bin.max = raw.max.clone();
        bin.min_count += raw.count.min;
        bin.max_count += raw.count.max;
        if (bin.min_count + bin.max_count) / 2.0 >= target {
            if let Some(closed) = open.take() {
                reported.push(closed);
            }
        }
    }
    if let Some(bin) = open {
        reported.push(bin);
    }
    reported
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use geocalc_core::{Field, Value};
    use geocalc_engine::{CellIndex, Feature, MemoryEngine, ProcessKindTable};

    use super::*;

    fn engine() -> MemoryEngine {
        MemoryEngine::new(ProcessKindTable::default())
    }

    fn ramp_coverage(engine: &MemoryEngine, name: &str, width: i64) -> GeoSource {
        let mut cells = HashMap::new();
        for x in 0..width {
            cells.insert(CellIndex::new(x, 0), vec![Value::Double(x as f64)]);
        }
        engine
            .register_coverage(name, vec![Field::new("value", FieldType::Number)], cells)
            .unwrap()
    }

    fn full_rect(width: i64) -> Geometry {
        Geometry::rect(0, 0, width - 1, 0)
    }

    #[test]
    fn test_bin_count_is_clamped() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 100);
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(100);

        let low = stats.get_field_statistics(Some(&geometry), "value", 1).unwrap();
        let ten = stats.get_field_statistics(Some(&geometry), "value", 10).unwrap();
        assert_eq!(low, ten);

        let high = stats.get_field_statistics(Some(&geometry), "value", 1000).unwrap();
        let two_hundred = stats
            .get_field_statistics(Some(&geometry), "value", 200)
            .unwrap();
        assert_eq!(high, two_hundred);
    }

    #[test]
    fn test_frequencies_sum_to_one() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 64);
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(64);

        let result = stats
            .get_field_statistics(Some(&geometry), "value", 16)
            .unwrap();
        let sum: f64 = result.distribution.histogram.iter().map(|b| b.frequency).sum();
        assert!((sum - 1.0).abs() < 1e-9, "frequencies sum to {sum}");
    }

    #[test]
    fn test_missing_geometry_yields_none() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 10);
        let stats = StatisticsCreator::new(&engine, source);
        assert!(stats.get_field_statistics(None, "value", 10).is_none());
    }

    #[test]
    fn test_unknown_field_yields_none() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 10);
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(10);
        assert!(stats
            .get_field_statistics(Some(&geometry), "nope", 10)
            .is_none());
    }

    #[test]
    fn test_boolean_coverage_is_categorical() {
        let engine = engine();
        let mut cells = HashMap::new();
        for x in 0..20 {
            cells.insert(CellIndex::new(x, 0), vec![Value::Bool(x % 3 == 0)]);
        }
        let source = engine
            .register_coverage("mask", vec![Field::new("flag", FieldType::Boolean)], cells)
            .unwrap();
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(20);

        // Categorical fields keep one bin per distinct value, never a
        // linearly rescaled axis.
        let result = stats.get_field_statistics(Some(&geometry), "flag", 10).unwrap();
        assert_eq!(result.distribution.histogram.len(), 2);
        assert_eq!(result.average, None);
        assert_eq!(result.sum, None);
    }

    #[test]
    fn test_byte_coverage_is_categorical() {
        let engine = engine();
        let mut cells = HashMap::new();
        for x in 0..30 {
            cells.insert(CellIndex::new(x, 0), vec![Value::Byte((x % 3) as u8)]);
        }
        // Declared Number, but the cells hold 8-bit class codes.
        let source = engine
            .register_coverage("landclass", vec![Field::new("class", FieldType::Number)], cells)
            .unwrap();
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(30);

        let result = stats
            .get_field_statistics(Some(&geometry), "class", 10)
            .unwrap();
        assert_eq!(result.distribution.histogram.len(), 3);
    }

    #[test]
    fn test_normalized_coverage_bins_share_frequency() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 100);
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(100);

        let result = stats
            .get_field_normalized_statistics(Some(&geometry), "value", 10)
            .unwrap();
        assert_eq!(result.distribution.histogram.len(), 10);
        for bin in &result.distribution.histogram {
            assert!((bin.frequency - 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_small_feature_sets_raise_bin_count() {
        let engine = engine();
        let fields = vec![Field::new("height", FieldType::Number)];
        let features = (0..15)
            .map(|i| Feature {
                id: format!("f{i}"),
                geometry: Geometry::Cell(CellIndex::new(i, 0)),
                values: [("height".to_string(), Value::Double(i as f64))].into(),
            })
            .collect();
        let source = engine.register_features("towers", fields, features).unwrap();
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(15);

        let result = stats
            .get_field_statistics(Some(&geometry), "height", 10)
            .unwrap();
        assert_eq!(result.distribution.histogram.len(), 15);
    }

    #[test]
    fn test_bin_raise_judges_the_upper_count_bound() {
        // A ranged count whose upper bound reaches the threshold never
        // raises, even when its midpoint falls below it.
        let ranged = CountRange {
            min: 10.0,
            max: 60.0,
        };
        assert_eq!(raised_bin_count(10, &ranged), 10);

        let sparse = CountRange {
            min: 20.0,
            max: 40.0,
        };
        assert_eq!(raised_bin_count(10, &sparse), 40);

        let exact = CountRange::exact(80.0);
        assert_eq!(raised_bin_count(10, &exact), 10);
    }

    #[test]
    fn test_exact_value_lookup() {
        let engine = engine();
        let mut cells = HashMap::new();
        for x in 0..10 {
            cells.insert(
                CellIndex::new(x, 0),
                vec![Value::Double(if x < 4 { 7.0 } else { 1.0 })],
            );
        }
        let source = engine
            .register_coverage("classes", vec![Field::new("class", FieldType::Number)], cells)
            .unwrap();
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(10);

        let result = stats
            .get_field_statistics_with_value(Some(&geometry), "class", "7")
            .unwrap();
        assert_eq!(result.min_count, 4.0);
        assert_eq!(result.max_count, 4.0);
        assert_eq!(result.distribution.histogram.len(), 1);
    }

    #[test]
    fn test_exact_value_lookup_propagates_bad_input() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 10);
        let stats = StatisticsCreator::new(&engine, source);
        let geometry = full_rect(10);

        assert!(matches!(
            stats.get_field_statistics_with_value(Some(&geometry), "value", "not-a-number"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            stats.get_field_statistics_with_value(Some(&geometry), "nope", "1"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_process_classifies_lazily() {
        let engine = engine();
        let source = ramp_coverage(&engine, "ramp", 10);
        let process = engine.get_process(&source).unwrap();
        let stats = StatisticsCreator::from_process(&engine, process);
        let geometry = full_rect(10);
        assert!(stats
            .get_field_statistics(Some(&geometry), "value", 10)
            .is_some());
    }
}
