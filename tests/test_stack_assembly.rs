mod common;

use approx::assert_abs_diff_eq;
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use snap_polarimetric::core::{BandTile, StackAssembler};
use snap_polarimetric::io::raster::{self, Window};
use snap_polarimetric::Polarization;
use tempfile::TempDir;

#[test]
fn test_stack_keeps_band_order_and_descriptions() {
    let tmp = TempDir::new().unwrap();
    let scene_dir = tmp.path().join("0a99c5a1-6ded-4d6a-b4d6-52e4a2d3a1c6");
    std::fs::create_dir_all(&scene_dir).unwrap();

    let mut vv = Array2::from_elem((10, 12), 0.25f32);
    vv[[0, 0]] = f32::NAN;
    vv[[9, 11]] = f32::INFINITY;
    let vh = Array2::from_elem((10, 12), 0.05f32);

    common::write_tile(&scene_dir.join("vv.tif"), (13.0, 38.3), 0.001, &vv);
    common::write_tile(&scene_dir.join("vh.tif"), (13.0, 38.3), 0.001, &vh);

    let tiles = vec![
        BandTile::new(Polarization::VV, scene_dir.join("vv.tif")),
        BandTile::new(Polarization::VH, scene_dir.join("vh.tif")),
    ];
    let stack = StackAssembler::default()
        .assemble(&scene_dir, &tiles, false)
        .expect("Failed to assemble stack");

    assert_eq!(stack, tmp.path().join("0a99c5a1-6ded-4d6a-b4d6-52e4a2d3a1c6.tif"));
    assert!(!scene_dir.exists(), "Scene folder should be removed");

    let dataset = Dataset::open(&stack).unwrap();
    assert_eq!(dataset.raster_count(), 2);
    assert_eq!(dataset.raster_size(), (12, 10));

    let window = Window {
        x: 0,
        y: 0,
        width: 12,
        height: 10,
    };
    let band1 = dataset.rasterband(1).unwrap();
    let band2 = dataset.rasterband(2).unwrap();
    assert_eq!(band1.description().unwrap(), "VV");
    assert_eq!(band2.description().unwrap(), "VH");

    let data1 = raster::read_window(&band1, window).unwrap();
    let data2 = raster::read_window(&band2, window).unwrap();
    assert_abs_diff_eq!(data1[[0, 0]], 0.0);
    assert_abs_diff_eq!(data1[[9, 11]], 0.0);
    assert_abs_diff_eq!(data1[[5, 5]], 0.25);
    assert_abs_diff_eq!(data2[[5, 5]], 0.05);

    let gt = dataset.geo_transform().unwrap();
    assert_abs_diff_eq!(gt[0], 13.0, epsilon = 1e-9);
    assert_abs_diff_eq!(gt[3], 38.3, epsilon = 1e-9);
}

#[test]
fn test_mismatched_tiles_rejected() {
    let tmp = TempDir::new().unwrap();
    common::write_tile(&tmp.path().join("vv.tif"), (0.0, 1.0), 0.1, &Array2::ones((4, 4)));
    common::write_tile(&tmp.path().join("vh.tif"), (0.0, 1.0), 0.1, &Array2::ones((5, 4)));

    let tiles = vec![
        BandTile::new(Polarization::VV, tmp.path().join("vv.tif")),
        BandTile::new(Polarization::VH, tmp.path().join("vh.tif")),
    ];
    let result = StackAssembler::default().write_stack(&tiles, &tmp.path().join("stack.tif"));
    assert!(result.is_err());
}

#[test]
fn test_masked_tiles_get_zero_nodata() {
    let tmp = TempDir::new().unwrap();
    let scene_dir = tmp.path().join("scene");
    std::fs::create_dir_all(&scene_dir).unwrap();
    common::write_tile(&scene_dir.join("hh.tif"), (0.0, 1.0), 0.1, &Array2::ones((4, 4)));

    let stack = StackAssembler::default()
        .assemble(
            &scene_dir,
            &[BandTile::new(Polarization::HH, scene_dir.join("hh.tif"))],
            true,
        )
        .unwrap();

    let dataset = Dataset::open(&stack).unwrap();
    assert_eq!(dataset.rasterband(1).unwrap().no_data_value(), Some(0.0));
}
