//! Tests for BoundingBox operations.

use regrid_common::bbox::{BboxParseError, BoundingBox};
use regrid_common::KeyHasher;

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bbox_new() {
    let bbox = BoundingBox::new(90.0, -180.0, -90.0, 180.0).unwrap();
    assert_eq!(bbox.north, 90.0);
    assert_eq!(bbox.west, -180.0);
    assert_eq!(bbox.south, -90.0);
    assert_eq!(bbox.east, 180.0);
    assert!(bbox.is_global());
}

#[test]
fn test_bbox_default_is_global() {
    let bbox = BoundingBox::default();
    assert!(bbox.is_periodic_west_east());
    assert!(bbox.contains(-90.0, 12.0));
}

// ============================================================================
// from_area_string tests
// ============================================================================

#[test]
fn test_parse_area_floating() {
    let bbox = BoundingBox::from_area_string("50.125/-125.5/24.75/-66.25").unwrap();
    assert!((bbox.north - 50.125).abs() < 1e-12);
    assert!((bbox.west + 125.5).abs() < 1e-12);
    assert!((bbox.south - 24.75).abs() < 1e-12);
    assert!((bbox.east + 66.25).abs() < 1e-12);
}

#[test]
fn test_parse_area_too_few() {
    let result = BoundingBox::from_area_string("0/0/100");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_area_not_a_number() {
    let result = BoundingBox::from_area_string("10/abc/0/20");
    assert!(matches!(result, Err(BboxParseError::InvalidNumber(_))));
}

#[test]
fn test_parse_area_latitude_out_of_range() {
    let result = BoundingBox::from_area_string("95/0/0/20");
    assert!(matches!(result, Err(BboxParseError::LatitudeOutOfRange(_))));
}

// ============================================================================
// Containment and expansion
// ============================================================================

#[test]
fn test_contains_edges_inclusive() {
    let bbox = BoundingBox::new(10.0, 0.0, -10.0, 20.0).unwrap();
    assert!(bbox.contains(10.0, 0.0));
    assert!(bbox.contains(-10.0, 20.0));
    assert!(bbox.contains(0.0, 360.0));
    assert!(!bbox.contains(10.5, 5.0));
}

#[test]
fn test_expand_clamps_at_poles() {
    let bbox = BoundingBox::new(88.0, 0.0, 80.0, 10.0).unwrap();
    let expanded = bbox.expand(5.0);
    assert_eq!(expanded.north, 90.0);
    assert_eq!(expanded.south, 75.0);
    assert_eq!(expanded.west, -5.0);
    assert_eq!(expanded.east, 15.0);
}

#[test]
fn test_expand_becomes_periodic() {
    let bbox = BoundingBox::new(10.0, 0.0, -10.0, 355.0).unwrap();
    assert!(bbox.expand(5.0).is_periodic_west_east());
}

#[test]
fn test_hash_differs_by_area() {
    let a = BoundingBox::new(10.0, 0.0, -10.0, 20.0).unwrap();
    let b = BoundingBox::new(10.0, 0.0, -10.0, 21.0).unwrap();

    let mut ha = KeyHasher::new();
    a.hash(&mut ha);
    let mut hb = KeyHasher::new();
    b.hash(&mut hb);
    assert_ne!(ha.finish(), hb.finish());
}
