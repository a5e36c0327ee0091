//! Boolean-geometry query tests.

mod support;

use geocalc_core::Error;
use geocalc_engine::{CellIndex, Geometry};

use geocalc_analysis::{GeometryOperation, WhereClause, WhereQuery};
use support::engine;

#[test]
fn test_leading_intersection_becomes_disjunction() {
    let engine = engine();
    let query = WhereQuery::create(
        &engine,
        vec![WhereClause::new(
            GeometryOperation::Intersection,
            Geometry::rect(0, 0, 2, 2),
        )],
    )
    .unwrap();
    assert_eq!(query.clauses()[0].operation, GeometryOperation::Disjunction);
}

#[test]
fn test_leading_subtraction_is_invalid() {
    let engine = engine();
    assert!(matches!(
        WhereQuery::create(
            &engine,
            vec![WhereClause::new(
                GeometryOperation::Subtraction,
                Geometry::rect(0, 0, 2, 2),
            )],
        ),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_clause_algebra() {
    let engine = engine();
    let query = WhereQuery::create(
        &engine,
        vec![WhereClause::new(
            GeometryOperation::Disjunction,
            Geometry::rect(0, 0, 5, 0),
        )],
    )
    .unwrap()
    .clause(GeometryOperation::Intersection, Geometry::rect(2, 0, 9, 0))
    .clause(GeometryOperation::Subtraction, Geometry::rect(4, 0, 5, 0));

    // (0..=5 ∩ 2..=9) − 4..=5 = {2, 3}
    let result = query
        .on(&Geometry::rect(0, 0, 20, 0), None)
        .unwrap()
        .unwrap();
    assert_eq!(
        result.cells(),
        vec![CellIndex::new(2, 0), CellIndex::new(3, 0)]
    );
}

#[test]
fn test_disjoint_query_returns_none() {
    let engine = engine();
    let query = WhereQuery::create(
        &engine,
        vec![WhereClause::new(
            GeometryOperation::Disjunction,
            Geometry::rect(0, 0, 1, 0),
        )],
    )
    .unwrap();
    assert_eq!(query.on(&Geometry::rect(8, 8, 9, 9), None).unwrap(), None);
}
