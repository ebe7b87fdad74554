//! Tests for BoundingBox parsing and geometry.

use forecast_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// Parsing tests
// ============================================================================

#[test]
fn test_parse_integer_bbox() {
    let bbox: BoundingBox = "6,36,19,47".parse().unwrap();
    assert_eq!(bbox, BoundingBox::DOWNLOAD_REGION);
}

#[test]
fn test_parse_with_whitespace() {
    let bbox = BoundingBox::from_csv(" 6.5 , 44.0, 9.3 ,46.6 ").unwrap();
    assert!((bbox.min_lon - 6.5).abs() < 1e-9);
    assert!((bbox.max_lat - 46.6).abs() < 1e-9);
}

#[test]
fn test_parse_wrong_arity() {
    let result = BoundingBox::from_csv("6,36,19");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_bad_number() {
    let result = BoundingBox::from_csv("6,north,19,47");
    assert!(matches!(result, Err(BboxParseError::InvalidNumber(ref s)) if s == "north"));
}

#[test]
fn test_parse_inverted() {
    let result = BoundingBox::from_csv("19,36,6,47");
    assert!(matches!(result, Err(BboxParseError::Inverted(_))));
}

// ============================================================================
// Geometry tests
// ============================================================================

#[test]
fn test_dimensions() {
    let bbox = BoundingBox::DOWNLOAD_REGION;
    assert_eq!(bbox.width(), 13.0);
    assert_eq!(bbox.height(), 11.0);
}

#[test]
fn test_contains_point_is_inclusive() {
    let bbox = BoundingBox::PIEMONTE_VIEW;
    assert!(bbox.contains_point(6.5, 44.0));
    assert!(bbox.contains_point(9.3, 46.6));
    assert!(bbox.contains_point(7.68, 45.07)); // Torino
    assert!(!bbox.contains_point(12.5, 41.9)); // Roma
}
