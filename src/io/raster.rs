//! GeoTIFF helpers on top of GDAL
//!
//! All pixel traffic goes through block-sized windows so multi-gigabyte tiles
//! never have to fit in memory.

use crate::types::{BoundingBox, SarError, SarResult};
use gdal::raster::{Buffer, RasterBand, RasterCreationOption};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager, GeoTransform};
use ndarray::Array2;
use std::path::Path;

/// Pixel window in raster coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    fn offset(&self) -> (isize, isize) {
        (self.x as isize, self.y as isize)
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

/// Grid, georeferencing and nodata of an existing raster
#[derive(Debug, Clone)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geo_transform: Option<GeoTransform>,
    pub projection: String,
    pub nodata: Option<f64>,
}

impl RasterProfile {
    pub fn read(dataset: &Dataset) -> SarResult<Self> {
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count().max(0) as usize;
        let nodata = if band_count > 0 {
            dataset.rasterband(1)?.no_data_value()
        } else {
            None
        };
        Ok(Self {
            width,
            height,
            band_count,
            geo_transform: dataset.geo_transform().ok(),
            projection: dataset.projection(),
            nodata,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let dataset = Dataset::open(path.as_ref())?;
        Self::read(&dataset)
    }
}

/// GeoTIFF creation settings
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression type: "LZW", "DEFLATE", "NONE"
    pub compression: String,
    /// BigTIFF for files > 4GB
    pub bigtiff: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "LZW".to_string(),
            bigtiff: true,
        }
    }
}

/// Create an empty Float32 GeoTIFF on the grid of `profile`
pub fn create_geotiff<P: AsRef<Path>>(
    path: P,
    profile: &RasterProfile,
    band_count: usize,
    options: &GeoTiffOptions,
) -> SarResult<Dataset> {
    if band_count == 0 {
        return Err(SarError::Processing(
            "Cannot create a GeoTIFF without bands".to_string(),
        ));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let bigtiff = if options.bigtiff { "YES" } else { "NO" };
    let creation_options = [
        RasterCreationOption {
            key: "COMPRESS",
            value: options.compression.as_str(),
        },
        RasterCreationOption {
            key: "BIGTIFF",
            value: bigtiff,
        },
    ];

    let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
        path.as_ref(),
        profile.width as isize,
        profile.height as isize,
        band_count as isize,
        &creation_options,
    )?;

    if let Some(transform) = &profile.geo_transform {
        dataset.set_geo_transform(transform)?;
    }
    if !profile.projection.is_empty() {
        dataset.set_projection(&profile.projection)?;
    }
    if let Some(nodata) = profile.nodata {
        for index in 1..=band_count {
            dataset.rasterband(index as isize)?.set_no_data_value(Some(nodata))?;
        }
    }

    Ok(dataset)
}

/// Native block windows of a band, clipped at the raster edges
pub fn block_windows(band: &RasterBand) -> Vec<Window> {
    let (width, height) = band.size();
    let (block_w, block_h) = band.block_size();
    let block_w = block_w.max(1);
    let block_h = block_h.max(1);

    let mut windows = Vec::new();
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            windows.push(Window {
                x,
                y,
                width: block_w.min(width - x),
                height: block_h.min(height - y),
            });
            x += block_w;
        }
        y += block_h;
    }
    windows
}

/// Read one window as a `(rows, cols)` array
pub fn read_window(band: &RasterBand, window: Window) -> SarResult<Array2<f32>> {
    let buffer = band.read_as::<f32>(window.offset(), window.size(), window.size(), None)?;
    Array2::from_shape_vec((window.height, window.width), buffer.data)
        .map_err(|e| SarError::Processing(format!("Failed to reshape raster window: {}", e)))
}

pub fn write_window(band: &mut RasterBand, window: Window, data: &Array2<f32>) -> SarResult<()> {
    let flat_data: Vec<f32> = data.iter().cloned().collect();
    let buffer = Buffer::new(window.size(), flat_data);
    band.write(window.offset(), window.size(), &buffer)?;
    Ok(())
}

/// True when no band holds a single valid pixel
///
/// A pixel is invalid when it is non-finite, zero, or equal to the band's
/// nodata value.
pub fn is_empty<P: AsRef<Path>>(path: P) -> SarResult<bool> {
    let dataset = Dataset::open(path.as_ref())?;
    let band_count = dataset.raster_count().max(0);

    for index in 1..=band_count {
        let band = dataset.rasterband(index)?;
        let nodata = band.no_data_value();
        for window in block_windows(&band) {
            let data = read_window(&band, window)?;
            let has_valid = data.iter().any(|&v| {
                v.is_finite() && v != 0.0 && nodata.map_or(true, |nd| (v as f64) != nd)
            });
            if has_valid {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Copy every band of `src` to a new GeoTIFF at `dst` with a fixed nodata value
pub fn rewrite_with_nodata<P: AsRef<Path>, Q: AsRef<Path>>(
    src: P,
    dst: Q,
    nodata: f64,
) -> SarResult<()> {
    let source = Dataset::open(src.as_ref())?;
    let mut profile = RasterProfile::read(&source)?;
    profile.nodata = Some(nodata);

    let options = GeoTiffOptions::default();
    let target = create_geotiff(dst.as_ref(), &profile, profile.band_count, &options)?;

    for index in 1..=profile.band_count as isize {
        let src_band = source.rasterband(index)?;
        let mut dst_band = target.rasterband(index)?;
        for window in block_windows(&src_band) {
            let data = read_window(&src_band, window)?;
            write_window(&mut dst_band, window, &data)?;
        }
    }
    Ok(())
}

/// Extent of a raster in geographic coordinates (EPSG:4326, lon/lat order)
pub fn footprint<P: AsRef<Path>>(path: P) -> SarResult<BoundingBox> {
    let dataset = Dataset::open(path.as_ref())?;
    let (width, height) = dataset.raster_size();
    let gt = dataset.geo_transform()?;

    let mut xs = Vec::with_capacity(4);
    let mut ys = Vec::with_capacity(4);
    for (col, row) in [(0.0, 0.0), (width as f64, 0.0), (0.0, height as f64), (width as f64, height as f64)] {
        xs.push(gt[0] + col * gt[1] + row * gt[2]);
        ys.push(gt[3] + col * gt[4] + row * gt[5]);
    }

    let projection = dataset.projection();
    if !projection.is_empty() {
        let source = SpatialRef::from_wkt(&projection)?;
        let target = SpatialRef::from_epsg(4326)?;
        source.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        target.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        let transform = CoordTransform::new(&source, &target)?;
        let mut zs = vec![0.0; xs.len()];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;
    }

    let fold = |values: &[f64], init: f64, f: fn(f64, f64) -> f64| values.iter().cloned().fold(init, f);
    Ok(BoundingBox {
        min_lon: fold(&xs, f64::INFINITY, f64::min),
        max_lon: fold(&xs, f64::NEG_INFINITY, f64::max),
        min_lat: fold(&ys, f64::INFINITY, f64::min),
        max_lat: fold(&ys, f64::NEG_INFINITY, f64::max),
    })
}
