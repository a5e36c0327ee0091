//! Geometry over the engine's discrete grid.
//!
//! The production grid engine owns a hierarchical global index; behind this
//! interface a geometry is a region of cells at some resolution. The set
//! algebra here is what the boolean-geometry queries (`WhereQuery`) and the
//! getters need.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellIndex {
    pub x: i64,
    pub y: i64,
}

impl CellIndex {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Geometry {
    /// A single grid cell.
    Cell(CellIndex),
    /// An explicit cell region; kept sorted and deduplicated.
    CellSet(Vec<CellIndex>),
    /// An axis-aligned rectangle of cells, inclusive on both corners.
    Rect { x0: i64, y0: i64, x1: i64, y1: i64 },
}

impl Geometry {
    pub fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Geometry::Rect {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn cell_set(mut cells: Vec<CellIndex>) -> Self {
        cells.sort();
        cells.dedup();
        Geometry::CellSet(cells)
    }

    /// Materialize the covered cells, in sorted order.
    pub fn cells(&self) -> Vec<CellIndex> {
        match self {
            Geometry::Cell(c) => vec![*c],
            Geometry::CellSet(cells) => cells.clone(),
            Geometry::Rect { x0, y0, x1, y1 } => {
                let mut cells = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
                for y in *y0..=*y1 {
                    for x in *x0..=*x1 {
                        cells.push(CellIndex::new(x, y));
                    }
                }
                cells
            }
        }
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        match self {
            Geometry::Cell(c) => *c == cell,
            Geometry::CellSet(cells) => cells.binary_search(&cell).is_ok(),
            Geometry::Rect { x0, y0, x1, y1 } => {
                cell.x >= *x0 && cell.x <= *x1 && cell.y >= *y0 && cell.y <= *y1
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Cell(_) => false,
            Geometry::CellSet(cells) => cells.is_empty(),
            Geometry::Rect { .. } => false,
        }
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        // Rect/Rect short-circuit; everything else goes through cells.
        if let (Geometry::Rect { x0, y0, x1, y1 }, Geometry::Rect { x0: a0, y0: b0, x1: a1, y1: b1 }) =
            (self, other)
        {
            return x0 <= a1 && a0 <= x1 && y0 <= b1 && b0 <= y1;
        }
        let (small, large) = if self.cells().len() <= other.cells().len() {
            (self, other)
        } else {
            (other, self)
        };
        small.cells().into_iter().any(|c| large.contains(c))
    }

    pub fn union(&self, other: &Geometry) -> Geometry {
        let mut cells = self.cells();
        cells.extend(other.cells());
        Geometry::cell_set(cells)
    }

    pub fn intersection(&self, other: &Geometry) -> Geometry {
        let cells = self
            .cells()
            .into_iter()
            .filter(|c| other.contains(*c))
            .collect();
        Geometry::CellSet(cells)
    }

    pub fn subtraction(&self, other: &Geometry) -> Geometry {
        let cells = self
            .cells()
            .into_iter()
            .filter(|c| !other.contains(*c))
            .collect();
        Geometry::CellSet(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_cells_are_inclusive() {
        let rect = Geometry::rect(0, 0, 1, 1);
        assert_eq!(rect.cells().len(), 4);
    }

    #[test]
    fn test_set_algebra() {
        let a = Geometry::rect(0, 0, 2, 0);
        let b = Geometry::rect(1, 0, 3, 0);
        assert_eq!(a.intersection(&b).cells().len(), 2);
        assert_eq!(a.union(&b).cells().len(), 4);
        assert_eq!(a.subtraction(&b).cells(), vec![CellIndex::new(0, 0)]);
    }

    #[test]
    fn test_disjoint_rects_do_not_intersect() {
        let a = Geometry::rect(0, 0, 1, 1);
        let b = Geometry::rect(5, 5, 6, 6);
        assert!(!a.intersects(&b));
        assert!(a.intersection(&b).is_empty());
    }
}
