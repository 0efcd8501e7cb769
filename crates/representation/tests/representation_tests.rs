//! Tests for representation construction, traversal and cropping.

use regrid_common::{BoundingBox, KeyHasher, RegridError};
use representation::{
    Healpix, Pole, ReducedGaussian, Representation, Rotation, SphericalHarmonics, Unstructured,
};

// ============================================================================
// Point count invariant
// ============================================================================

#[test]
fn test_named_grids_point_counts() {
    for (name, expected) in [("F4", 128), ("O4", 2 * (20 + 24 + 28 + 32)), ("H4", 192), ("2/2", 180 * 91)] {
        let grid = Representation::from_name(name).unwrap();
        assert_eq!(grid.number_of_points(), expected, "{}", name);
        assert_eq!(grid.points().unwrap().count(), expected, "{}", name);
    }
}

#[test]
fn test_spectral_point_count_is_coefficient_count() {
    let grid = Representation::from_name("T21").unwrap();
    assert_eq!(grid.number_of_points(), 22 * 23);
}

// ============================================================================
// Cropping
// ============================================================================

#[test]
fn test_crop_across_date_line() {
    let grid = Representation::from_name("1/1").unwrap();
    let bbox = BoundingBox::new(5.0, 175.0, -5.0, 185.0).unwrap();
    let (cropped, mapping) = grid.crop(&bbox).unwrap();

    assert_eq!(cropped.number_of_points(), 11 * 11);
    assert!(mapping.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_crop_outside_gives_empty() {
    let grid: Representation = Unstructured::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .unwrap()
        .into();
    let bbox = BoundingBox::new(50.0, 100.0, 40.0, 110.0).unwrap();
    let (cropped, mapping) = grid.crop(&bbox).unwrap();
    assert_eq!(cropped.number_of_points(), 0);
    assert!(mapping.is_empty());
}

#[test]
fn test_crop_spectral_unsupported() {
    let grid: Representation = SphericalHarmonics::new(10).into();
    assert!(matches!(
        grid.crop(&BoundingBox::global()),
        Err(RegridError::UnsupportedOperation(_))
    ));
}

// ============================================================================
// Identity and hashing
// ============================================================================

#[test]
fn test_unstructured_identity_is_by_points() {
    let a: Representation = Unstructured::new(vec![1.0, 2.0], vec![3.0, 4.0]).unwrap().into();
    let b: Representation = Unstructured::new(vec![1.0, 2.0], vec![3.0, 4.0]).unwrap().into();
    let c: Representation = Unstructured::new(vec![1.0, 2.0], vec![3.0, 4.5]).unwrap().into();
    assert!(a.same_as(&b));
    assert!(!a.same_as(&c));
}

#[test]
fn test_rotation_changes_key() {
    let plain = Representation::from_name("O8").unwrap();
    let rotated = Representation::rotated(plain.clone(), Rotation::new(-30.0, 0.0, 0.0)).unwrap();

    let key = |r: &Representation| {
        let mut h = KeyHasher::new();
        r.hash(&mut h);
        h.finish()
    };
    assert_ne!(key(&plain), key(&rotated));
    assert_eq!(rotated.number_of_points(), plain.number_of_points());
}

#[test]
fn test_cannot_rotate_healpix() {
    let grid: Representation = Healpix::new(2).unwrap().into();
    assert!(Representation::rotated(grid, Rotation::new(-30.0, 0.0, 0.0)).is_err());
}

#[test]
fn test_reduced_gaussian_needs_matching_pl() {
    assert!(ReducedGaussian::new(2, vec![20, 24, 24]).is_err());
}

#[test]
fn test_global_grids_include_poles() {
    for name in ["F8", "O8", "H2", "1/1"] {
        let grid = Representation::from_name(name).unwrap();
        assert!(grid.includes_pole(Pole::North), "{}", name);
        assert!(grid.includes_pole(Pole::South), "{}", name);
        assert!(grid.is_periodic_west_east(), "{}", name);
    }
}
