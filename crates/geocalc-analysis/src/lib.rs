#![forbid(unsafe_code)]
//! geocalc-analysis: the read/compose side of the calculator.
//!
//! Everything here operates downstream of a resolved GeoSource: mosaics
//! compose several sources into one, `calculate` drives the expression
//! pipeline end to end, `StatisticsCreator` reduces histograms into
//! reportable distributions, and the getters enumerate features and cell
//! values for callers that just want the data.

pub mod calculator;
pub mod getters;
pub mod mosaic;
pub mod stats;
pub mod where_query;

pub use calculator::calculate;
pub use getters::{search, CoverageGetter, FeatureGetter, FeaturesSearchQuery};
pub use mosaic::mosaic;
pub use stats::{Bin, Distribution, FieldStatistics, StatisticsCreator};
pub use where_query::{GeometryOperation, WhereClause, WhereQuery};
