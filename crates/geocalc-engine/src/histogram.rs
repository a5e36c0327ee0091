//! Raw histograms as reported by the grid engine.
//!
//! Counts are [min,max] ranges: at coarse resolutions the engine can only
//! bound how many cells of a region carry a value, not enumerate them
//! exactly. Exact engines (like `MemoryEngine`) report min == max.

use serde::{Deserialize, Serialize};

use geocalc_core::value::value_cmp;
use geocalc_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: f64,
    pub max: f64,
}

impl CountRange {
    pub fn exact(count: f64) -> Self {
        Self {
            min: count,
            max: count,
        }
    }

    pub fn zero() -> Self {
        Self::exact(0.0)
    }

    pub fn add(&mut self, other: CountRange) {
        self.min += other.min;
        self.max += other.max;
    }

    /// Midpoint estimator used for frequency reduction.
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// One ordered slice of the value axis with its count bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBin {
    pub min: Value,
    pub max: Value,
    pub count: CountRange,
}

/// Ordered histogram over one field of a coverage or feature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: Value,
    pub max: Value,
    /// Sum/average over numeric values; `None` for string-valued fields.
    pub sum: Option<f64>,
    pub average: Option<f64>,
    /// Total cell/feature count bounds across all bins.
    pub total: CountRange,
    pub bins: Vec<RawBin>,
}

/// Axis rescaling applied when extracting report bins from a raw histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistogramScale {
    /// Keep raw per-value bins (categorical data).
    None,
    /// Equal-width numeric ranges across [min, max].
    Linear,
    /// Equal-frequency ranges (each bin carries a comparable share).
    Normalized,
}

impl Histogram {
    /// Build an exact histogram from observed values. Nulls are excluded.
    pub fn from_values<I: IntoIterator<Item = Value>>(values: I) -> Histogram {
        let mut observed: Vec<Value> = values
            .into_iter()
            .filter(|v| !v.is_null())
            .collect();
        observed.sort_by(value_cmp);

        let mut bins: Vec<RawBin> = Vec::new();
        for value in observed {
            match bins.last_mut() {
                Some(bin) if bin.min == value => bin.count.add(CountRange::exact(1.0)),
                _ => bins.push(RawBin {
                    min: value.clone(),
                    max: value,
                    count: CountRange::exact(1.0),
                }),
            }
        }

        let mut total = CountRange::zero();
        let mut sum = 0.0;
        let mut numeric = !bins.is_empty();
        for bin in &bins {
            total.add(bin.count);
            match bin.min.as_f64() {
                Some(v) => sum += v * bin.count.midpoint(),
                None => numeric = false,
            }
        }

        let min = bins.first().map(|b| b.min.clone()).unwrap_or(Value::Null);
        let max = bins.last().map(|b| b.max.clone()).unwrap_or(Value::Null);
        let count = total.midpoint();
        Histogram {
            min,
            max,
            sum: numeric.then_some(sum),
            average: (numeric && count > 0.0).then(|| sum / count),
            total,
            bins,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Count bounds for values equal to `value`.
    pub fn value_count(&self, value: &Value) -> CountRange {
        let mut count = CountRange::zero();
        for bin in &self.bins {
            let above_min = value_cmp(value, &bin.min) != std::cmp::Ordering::Less;
            let below_max = value_cmp(value, &bin.max) != std::cmp::Ordering::Greater;
            if above_min && below_max {
                count.add(bin.count);
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_groups_duplicates() {
        let h = Histogram::from_values(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(1),
            Value::Null,
        ]);
        assert_eq!(h.bins.len(), 2);
        assert_eq!(h.total.midpoint(), 3.0);
        assert_eq!(h.min, Value::Int(1));
        assert_eq!(h.max, Value::Int(2));
    }

    #[test]
    fn test_numeric_summaries() {
        let h = Histogram::from_values(vec![Value::Double(2.0), Value::Double(4.0)]);
        assert_eq!(h.sum, Some(6.0));
        assert_eq!(h.average, Some(3.0));
    }

    #[test]
    fn test_string_histogram_has_no_sum() {
        let h = Histogram::from_values(vec![Value::Str("park".into()), Value::Str("road".into())]);
        assert_eq!(h.sum, None);
        assert_eq!(h.average, None);
    }

    #[test]
    fn test_value_count_matches_exact_bin() {
        let h = Histogram::from_values(vec![Value::Int(1), Value::Int(1), Value::Int(5)]);
        assert_eq!(h.value_count(&Value::Int(1)).midpoint(), 2.0);
        assert_eq!(h.value_count(&Value::Int(3)).midpoint(), 0.0);
    }
}
