//! Integration tests for weight assembly through `Method`.

use point_search::PointSearch;
use regrid::{AssemblyOutcome, MeshGenerator, Method, MethodConfig, MethodKind, StructuredMeshGenerator};
use regrid_common::{BoundingBox, RegridError};
use representation::{Representation, Unstructured};
use test_utils::{
    assert_close, assert_values_close, four_by_four, global_coarse, index_field, random_points_in,
    regular_ll, smooth_field, TempCacheDir,
};
use weight_cache::{CacheConfig, Handle, LoaderKind};

fn cloud(points: &[(f64, f64)]) -> Representation {
    Unstructured::new(
        points.iter().map(|p| p.0).collect(),
        points.iter().map(|p| p.1).collect(),
    )
    .unwrap()
    .into()
}

fn random_cloud(n: usize, seed: u64) -> Representation {
    let points: Vec<(f64, f64)> = random_points_in(n, seed, (-60.0, 60.0), (0.0, 360.0))
        .into_iter()
        .map(|p| (p.lat, p.lon))
        .collect();
    cloud(&points)
}

fn cache_config(tmp: &TempCacheDir, loader: LoaderKind) -> CacheConfig {
    CacheConfig {
        cache_dir: tmp.cache_dir(),
        matrix_loader: loader,
        legendre_loader: LoaderKind::Buffer,
        shm_dir: tmp.shm_dir(),
        memory_cache_entries: 0,
    }
}

// ===== Row sums =====

#[test]
fn test_partition_of_unity_methods() {
    let input = global_coarse();
    let output = random_cloud(300, 11);

    for kind in [
        MethodKind::NearestNeighbour,
        MethodKind::KNearest,
        MethodKind::Linear,
        MethodKind::Bilinear,
        MethodKind::StructuredBilinear,
        MethodKind::PseudoLaplace,
    ] {
        let method = Method::from_kind(kind).unwrap();
        let (matrix, _) = method.assemble(&input, &output).unwrap();
        assert_eq!(matrix.rows(), output.number_of_points());
        assert_eq!(matrix.cols(), input.number_of_points());
        for r in 0..matrix.rows() {
            assert!(!matrix.row_is_empty(r), "{} row {} is empty", kind, r);
            assert_close!(matrix.row_sum(r), 1.0, 1e-9);
        }
    }
}

#[test]
fn test_constant_field_preserved() {
    let input = global_coarse();
    let output = random_cloud(200, 5);
    let field = vec![273.15; input.number_of_points()];

    for kind in [
        MethodKind::KNearest,
        MethodKind::Linear,
        MethodKind::StructuredBilinear,
        MethodKind::PseudoLaplace,
    ] {
        let (matrix, _) = Method::from_kind(kind).unwrap().assemble(&input, &output).unwrap();
        let result = matrix.apply(&field, None).unwrap();
        assert_values_close!(result, vec![273.15; output.number_of_points()], 1e-10);
    }
}

#[test]
fn test_smooth_field_interpolation_error() {
    let input = regular_ll(60.0, 0.0, 2.0, 31);
    let output = regular_ll(55.0, 5.0, 3.0, 15);
    let exact = smooth_field(&output);

    let (matrix, _) = Method::from_kind(MethodKind::StructuredBilinear)
        .unwrap()
        .assemble(&input, &output)
        .unwrap();
    let result = matrix.apply(&smooth_field(&input), None).unwrap();
    for (a, b) in result.iter().zip(&exact) {
        assert!((a - b).abs() < 1e-2);
    }
}

// ===== Nearest neighbour =====

#[test]
fn test_identity_round_trip() {
    let grid = four_by_four();
    let (matrix, _) = Method::from_kind(MethodKind::NearestNeighbour)
        .unwrap()
        .assemble(&grid, &grid)
        .unwrap();
    let result = matrix.apply(&index_field(16), None).unwrap();
    assert_eq!(result, index_field(16));
}

#[test]
fn test_tie_break_lowest_index() {
    let target = cloud(&[(0.0, 0.0)]);
    let method = Method::from_kind(MethodKind::NearestNeighbour).unwrap();

    let forward = cloud(&[(0.0, -1.0), (0.0, 1.0), (10.0, 10.0)]);
    let (m, _) = method.assemble(&forward, &target).unwrap();
    assert_eq!(m.row(0), (&[0usize][..], &[1.0][..]));

    let reversed = cloud(&[(10.0, 10.0), (0.0, 1.0), (0.0, -1.0)]);
    let (m, _) = method.assemble(&reversed, &target).unwrap();
    assert_eq!(m.row(0), (&[1usize][..], &[1.0][..]));
}

#[test]
fn test_fewer_inputs_than_candidates() {
    let input = cloud(&[(0.0, 0.0), (5.0, 5.0)]);
    let output = cloud(&[(1.0, 1.0), (4.0, 4.0)]);
    let (m, _) = Method::from_kind(MethodKind::NearestNeighbour)
        .unwrap()
        .assemble(&input, &output)
        .unwrap();
    assert_eq!(m.row(0).0, &[0]);
    assert_eq!(m.row(1).0, &[1]);
}

// ===== Cropping =====

#[test]
fn test_crop_input_to_output_is_equivalent() {
    let input = global_coarse();
    let outputs = [
        // No input point within the default margin of the output
        regular_ll(44.0, 3.0, 1.0, 4),
        // A handful of input points inside, most rows reach past them
        regular_ll(47.0, 3.0, 5.0, 4),
        regular_ll(62.0, 340.0, 2.0, 12),
    ];

    for kind in [
        MethodKind::NearestNeighbour,
        MethodKind::KNearest,
        MethodKind::PseudoLaplace,
    ] {
        let plain = Method::from_kind(kind).unwrap();
        let cropped = Method::new(&MethodConfig {
            method: kind,
            crop_input_to_output: true,
            ..Default::default()
        })
        .unwrap();

        for output in &outputs {
            let (a, _) = plain.assemble(&input, output).unwrap();
            let (b, _) = cropped.assemble(&input, output).unwrap();
            assert_eq!(plain.cache_key(&input, output), cropped.cache_key(&input, output));
            assert_eq!(a.to_bytes(), b.to_bytes(), "{} to {}", kind, output);
        }
    }
}

#[test]
fn test_crop_input_to_dense_input() {
    let input = regular_ll(70.0, 0.0, 0.5, 121);
    let output = random_points_in(50, 9, (20.0, 40.0), (15.0, 40.0));
    let output = cloud(&output.iter().map(|p| (p.lat, p.lon)).collect::<Vec<_>>());

    let plain = Method::from_kind(MethodKind::KNearest).unwrap();
    let cropped = Method::new(&MethodConfig {
        crop_input_to_output: true,
        ..Default::default()
    })
    .unwrap();

    let (a, _) = plain.assemble(&input, &output).unwrap();
    let (b, _) = cropped.assemble(&input, &output).unwrap();
    assert_eq!(a.to_bytes(), b.to_bytes());
}

#[test]
fn test_index_with_cropping_rejected() {
    let input = global_coarse();
    let output = regular_ll(36.0, 3.0, 1.0, 2);
    let area = "50/-5/35/15";
    let method = Method::new(&MethodConfig {
        cropping: Some(area.to_string()),
        ..Default::default()
    })
    .unwrap();
    let index = PointSearch::from_representation(&input).unwrap();

    let (cropped, _) = method.assemble(&input, &output).unwrap();
    let bbox = BoundingBox::from_area_string(area).unwrap();
    let points: Vec<_> = input.points().unwrap().collect();
    for r in 0..cropped.rows() {
        for &c in cropped.row(r).0 {
            assert!(bbox.contains(points[c].lat, points[c].lon), "row {} uses column {}", r, c);
        }
    }

    assert!(matches!(
        method.assemble_with_index(&input, &output, &index),
        Err(RegridError::UnsupportedOperation(_))
    ));

    let plain = Method::from_kind(MethodKind::KNearest).unwrap();
    let (a, _) = plain.assemble(&input, &output).unwrap();
    let (b, _) = plain.assemble_with_index(&input, &output, &index).unwrap();
    assert_eq!(a.to_bytes(), b.to_bytes());
}

#[test]
fn test_cropping_leaves_outside_rows_empty() {
    let grid = four_by_four();
    let method = Method::new(&MethodConfig {
        cropping: Some("30/0/20/10".to_string()),
        ..Default::default()
    })
    .unwrap();

    let (m, _) = method.assemble(&grid, &grid).unwrap();
    let result = m.apply(&index_field(16), Some(-1.0)).unwrap();
    for (i, p) in grid.points().unwrap().enumerate() {
        let inside = p.lat >= 20.0 && p.lon <= 10.0;
        assert_eq!(m.row_is_empty(i), !inside, "row {}", i);
        if inside {
            assert_close!(result[i], i as f64, 1e-12);
        } else {
            assert_eq!(result[i], -1.0);
        }
    }
}

#[test]
fn test_empty_domain() {
    let grid = four_by_four();
    let method = Method::new(&MethodConfig {
        cropping: Some("10/100/0/110".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(
        method.assemble(&grid, &grid),
        Err(RegridError::EmptyDomain(_))
    ));
}

// ===== Conservative =====

#[test]
fn test_conservative_preserves_integral() {
    let input = regular_ll(40.0, 0.0, 2.0, 11);
    let output = regular_ll(38.0, 2.0, 4.0, 4);
    let (m, _) = Method::from_kind(MethodKind::Conservative)
        .unwrap()
        .assemble(&input, &output)
        .unwrap();

    let m_in = StructuredMeshGenerator.generate(&input).unwrap().lumped_masses();
    let m_out = StructuredMeshGenerator.generate(&output).unwrap().lumped_masses();
    let field = smooth_field(&input);
    let remapped = m.apply(&field, None).unwrap();

    let before: f64 = field.iter().zip(&m_in).map(|(v, w)| v * w).sum();
    let after: f64 = remapped.iter().zip(&m_out).map(|(v, w)| v * w).sum();
    assert_close!(after, before, 1e-9);
}

// ===== Caching =====

#[test]
fn test_cache_idempotent_for_every_loader() {
    let input = global_coarse();
    let output = random_cloud(100, 3);

    for loader in [
        LoaderKind::Buffer,
        LoaderKind::MemoryMapped,
        LoaderKind::SharedMemory,
    ] {
        let tmp = TempCacheDir::new();
        let config = cache_config(&tmp, loader);
        let method = Method::from_configs(&MethodConfig::default(), &config).unwrap();
        let key = method.cache_key(&input, &output);
        let cache = method.cache().unwrap();

        let (first, outcome) = method.assemble(&input, &output).unwrap();
        assert_eq!(outcome, AssemblyOutcome::Cached, "{}", loader);
        let bytes = first.to_bytes();

        if loader == LoaderKind::SharedMemory {
            assert!(cache.load_shared_memory(&key).unwrap());
        }
        let handle = cache.get(&key).unwrap().unwrap();
        if loader != LoaderKind::Buffer {
            assert!(matches!(handle, Handle::Mapped(_)), "{}", loader);
        }
        assert_eq!(handle.payload().unwrap(), &bytes[..], "{}", loader);
        drop(handle);

        let (second, outcome) = method.assemble(&input, &output).unwrap();
        assert_eq!(outcome, AssemblyOutcome::FromCache, "{}", loader);
        assert_eq!(second.to_bytes(), bytes, "{}", loader);
    }
}

#[test]
fn test_disabled_cache_always_computes() {
    let tmp = TempCacheDir::new();
    let config = cache_config(&tmp, LoaderKind::Disabled);
    let method = Method::from_configs(&MethodConfig::default(), &config).unwrap();
    let grid = four_by_four();

    for _ in 0..2 {
        let (_, outcome) = method.assemble(&grid, &grid).unwrap();
        assert_eq!(outcome, AssemblyOutcome::Discarded);
    }
    assert!(!method.cache().unwrap().contains(&method.cache_key(&grid, &grid)));
}

#[test]
fn test_memory_cache_hit() {
    let tmp = TempCacheDir::new();
    let config = CacheConfig {
        memory_cache_entries: 2,
        ..cache_config(&tmp, LoaderKind::Buffer)
    };
    let method = Method::from_configs(&MethodConfig::default(), &config).unwrap();
    let grid = four_by_four();

    assert_eq!(method.assemble(&grid, &grid).unwrap().1, AssemblyOutcome::Cached);
    assert_eq!(method.assemble(&grid, &grid).unwrap().1, AssemblyOutcome::FromMemory);
}

#[test]
fn test_corrupt_entry_is_rebuilt() {
    let tmp = TempCacheDir::new();
    let config = cache_config(&tmp, LoaderKind::Buffer);
    let method = Method::from_configs(&MethodConfig::default(), &config).unwrap();
    let grid = four_by_four();

    let (original, _) = method.assemble(&grid, &grid).unwrap();
    let path = method.cache().unwrap().entry_path(&method.cache_key(&grid, &grid));
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let (rebuilt, outcome) = method.assemble(&grid, &grid).unwrap();
    assert_eq!(outcome, AssemblyOutcome::Cached);
    assert_eq!(*original, *rebuilt);
    assert_eq!(method.cache().unwrap().stats().snapshot().corrupt, 1);

    let (_, outcome) = method.assemble(&grid, &grid).unwrap();
    assert_eq!(outcome, AssemblyOutcome::FromCache);
}

#[test]
fn test_shared_memory_segment_lifecycle() {
    let tmp = TempCacheDir::new();
    let config = cache_config(&tmp, LoaderKind::SharedMemory);
    let method = Method::from_configs(&MethodConfig::default(), &config).unwrap();
    let (input, output) = (global_coarse(), four_by_four());
    let key = method.cache_key(&input, &output);
    let cache = method.cache().unwrap();

    assert!(!cache.load_shared_memory(&key).unwrap());
    let (built, _) = method.assemble(&input, &output).unwrap();
    assert!(cache.load_shared_memory(&key).unwrap());
    assert!(cache.segment_path(&key).exists());

    let (loaded, outcome) = method.assemble(&input, &output).unwrap();
    assert_eq!(outcome, AssemblyOutcome::FromCache);
    assert_eq!(*built, *loaded);

    assert!(cache.unload_shared_memory(&key).unwrap());
    assert!(!cache.unload_shared_memory(&key).unwrap());
}

// ===== Matrix import =====

#[test]
fn test_export_then_import() {
    let tmp = TempCacheDir::new();
    let path = tmp.root().join("weights").join("knn.rgwm");
    let (input, output) = (global_coarse(), four_by_four());

    let (built, _) = Method::from_kind(MethodKind::KNearest)
        .unwrap()
        .assemble(&input, &output)
        .unwrap();
    regrid::export_matrix(&built, &path).unwrap();

    let import = Method::new(&MethodConfig {
        method: MethodKind::MatrixImport,
        matrix_file: Some(path),
        ..Default::default()
    })
    .unwrap();
    let (imported, outcome) = import.assemble(&input, &output).unwrap();
    assert_eq!(outcome, AssemblyOutcome::Imported);
    assert_eq!(*built, *imported);

    assert!(matches!(
        import.assemble(&output, &input),
        Err(RegridError::DimensionMismatch { .. })
    ));
}
