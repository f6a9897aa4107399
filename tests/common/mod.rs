//! Helpers shared by the integration tests

#![allow(dead_code)]

use gdal::spatial_ref::SpatialRef;
use ndarray::Array2;
use snap_polarimetric::io::raster::{self, GeoTiffOptions, RasterProfile, Window};
use std::path::{Path, PathBuf};

pub const SAFE_NAME: &str = "S1B_IW_GRDH_1SDV_20190220T050359_20190220T050424_015025_01C12F_4EA4.SAFE";

/// Single-band Float32 GeoTIFF in EPSG:4326 with its top-left corner at `origin`
pub fn write_tile(path: &Path, origin: (f64, f64), pixel: f64, data: &Array2<f32>) {
    let (rows, cols) = data.dim();
    let profile = RasterProfile {
        width: cols,
        height: rows,
        band_count: 1,
        geo_transform: Some([origin.0, pixel, 0.0, origin.1, 0.0, -pixel]),
        projection: SpatialRef::from_epsg(4326).unwrap().to_wkt().unwrap(),
        nodata: None,
    };
    let options = GeoTiffOptions {
        compression: "NONE".to_string(),
        bigtiff: false,
    };
    let dataset = raster::create_geotiff(path, &profile, 1, &options).expect("Failed to create tile");
    let mut band = dataset.rasterband(1).unwrap();
    let window = Window {
        x: 0,
        y: 0,
        width: cols,
        height: rows,
    };
    raster::write_window(&mut band, window, data).expect("Failed to write tile");
}

/// Unpacked SAFE product below `<input_root>/<scene_id>/` with one
/// (empty) measurement file per polarization
pub fn add_scene(input_root: &Path, scene_id: &str, pols: &[&str]) -> PathBuf {
    let safe = input_root.join(scene_id).join(SAFE_NAME);
    std::fs::create_dir_all(safe.join("measurement")).unwrap();
    std::fs::write(safe.join("manifest.safe"), "").unwrap();
    for pol in pols {
        let name = format!(
            "s1b-iw-grd-{}-20190220t050359-20190220t050424-015025-01c12f-002.tiff",
            pol
        );
        std::fs::write(safe.join("measurement").join(name), "").unwrap();
    }
    safe
}
