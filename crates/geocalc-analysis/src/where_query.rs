//! Boolean-geometry queries: an ordered clause list evaluated on the grid.

use serde::{Deserialize, Serialize};

use geocalc_core::{Error, Result};
use geocalc_engine::{Geometry, GridEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryOperation {
    Intersection,
    Disjunction,
    Subtraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub operation: GeometryOperation,
    pub geometry: Geometry,
}

impl WhereClause {
    pub fn new(operation: GeometryOperation, geometry: Geometry) -> Self {
        Self {
            operation,
            geometry,
        }
    }
}

/// Accumulates (operation, geometry) clauses and evaluates them left to
/// right. The first clause seeds the accumulated region, so it must be a
/// Disjunction: a leading Intersection is auto-corrected (intersecting with
/// nothing and adding to nothing coincide), while a leading Subtraction is
/// rejected because subtracting from an empty region cannot mean anything.
pub struct WhereQuery<'a> {
    engine: &'a dyn GridEngine,
    clauses: Vec<WhereClause>,
}

impl<'a> WhereQuery<'a> {
    pub fn create(engine: &'a dyn GridEngine, mut clauses: Vec<WhereClause>) -> Result<Self> {
        if let Some(first) = clauses.first_mut() {
            match first.operation {
                GeometryOperation::Disjunction => {}
                GeometryOperation::Intersection => {
                    first.operation = GeometryOperation::Disjunction;
                }
                GeometryOperation::Subtraction => {
                    return Err(Error::InvalidArgument(
                        "a where-query cannot start by subtracting".to_string(),
                    ));
                }
            }
        }
        Ok(Self { engine, clauses })
    }

    pub fn clauses(&self) -> &[WhereClause] {
        &self.clauses
    }

    /// Append a clause. The leading-clause rule only applies at creation;
    /// later clauses may use any operation.
    pub fn clause(mut self, operation: GeometryOperation, geometry: Geometry) -> Self {
        self.clauses.push(WhereClause::new(operation, geometry));
        self
    }

    /// Evaluate the accumulated clauses and intersect the result with
    /// `geometry` (normalized to the grid, optionally at an explicit
    /// resolution). `None` means the query selects nothing there.
    pub fn on(&self, geometry: &Geometry, resolution: Option<u32>) -> Result<Option<Geometry>> {
        let base = self.engine.to_grid_geometry(geometry, resolution)?;
        let mut accumulated: Option<Geometry> = None;
        for clause in &self.clauses {
            let region = self.engine.to_grid_geometry(&clause.geometry, resolution)?;
            accumulated = Some(match (accumulated, clause.operation) {
                (None, _) => region,
                (Some(region_so_far), GeometryOperation::Disjunction) => {
                    region_so_far.union(&region)
                }
                (Some(region_so_far), GeometryOperation::Intersection) => {
                    region_so_far.intersection(&region)
                }
                (Some(region_so_far), GeometryOperation::Subtraction) => {
                    region_so_far.subtraction(&region)
                }
            });
        }
        let Some(accumulated) = accumulated else {
            return Ok(None);
        };
        let result = accumulated.intersection(&base);
        Ok((!result.is_empty()).then_some(result))
    }
}
