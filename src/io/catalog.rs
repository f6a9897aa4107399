//! GeoJSON catalog handling for input scenes and output stacks

use crate::io::raster;
use crate::types::{BoundingBox, SarError, SarResult};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use std::path::{Path, PathBuf};

/// Property holding a feature's data location
pub const DATA_PATH_KEY: &str = "up42.data_path";

/// Capability property advertised on processed features
pub const CAPABILITY_KEY: &str = "up42.processing.snap_polarimetric";

/// Read a feature collection; a missing file yields an empty collection
pub fn load_feature_collection<P: AsRef<Path>>(path: P) -> SarResult<FeatureCollection> {
    let path = path.as_ref();
    if !path.exists() {
        log::warn!("No catalog at {}, starting from an empty collection", path.display());
        return Ok(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_feature_collection<P: AsRef<Path>>(
    path: P,
    collection: &FeatureCollection,
) -> SarResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string(collection)?)?;
    Ok(())
}

/// The scene folder name a feature points at
pub fn data_path(feature: &Feature) -> SarResult<String> {
    feature
        .property(DATA_PATH_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            SarError::Processing(format!("Feature has no string property {}", DATA_PATH_KEY))
        })
}

/// Bounding box of a feature: its `bbox` member, else the extent of its geometry
pub fn feature_bbox(feature: &Feature) -> Option<BoundingBox> {
    if let Some(bbox) = &feature.bbox {
        if bbox.len() == 4 {
            return BoundingBox::from_geojson(bbox).ok();
        }
    }

    let mut positions = Vec::new();
    collect_positions(&feature.geometry.as_ref()?.value, &mut positions);
    let first = positions.first()?;
    let init = BoundingBox {
        min_lon: first[0],
        max_lon: first[0],
        min_lat: first[1],
        max_lat: first[1],
    };
    Some(positions.iter().fold(init, |b, p| BoundingBox {
        min_lon: b.min_lon.min(p[0]),
        max_lon: b.max_lon.max(p[0]),
        min_lat: b.min_lat.min(p[1]),
        max_lat: b.max_lat.max(p[1]),
    }))
}

fn collect_positions<'a>(value: &'a Value, out: &mut Vec<&'a Vec<f64>>) {
    let keep = |p: &&Vec<f64>| p.len() >= 2;
    match value {
        Value::Point(p) => out.extend(std::iter::once(p).filter(keep)),
        Value::MultiPoint(ps) | Value::LineString(ps) => out.extend(ps.iter().filter(keep)),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            out.extend(lines.iter().flatten().filter(keep))
        }
        Value::MultiPolygon(polygons) => {
            out.extend(polygons.iter().flatten().flatten().filter(keep))
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_positions(&geometry.value, out);
            }
        }
    }
}

/// Produces the output catalog entries
pub struct CatalogBuilder {
    output_root: PathBuf,
}

impl CatalogBuilder {
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    /// Copy of `input` pointing at `<scene_id>.tif`
    pub fn output_feature(&self, input: &Feature, scene_id: &str) -> Feature {
        let mut feature = input.clone();
        let file_name = format!("{}.tif", scene_id);
        feature.remove_property(DATA_PATH_KEY);
        feature.set_property(DATA_PATH_KEY, file_name.clone());
        feature.set_property(CAPABILITY_KEY, file_name);
        feature
    }

    /// Replace bbox and geometry of each feature with its raster footprint
    pub fn update_extents(&self, collection: &mut FeatureCollection) -> SarResult<()> {
        for feature in &mut collection.features {
            let raster_path = self.output_root.join(data_path(feature)?);
            let bbox = raster::footprint(&raster_path)?;
            log::debug!("Extent of {}: {:?}", raster_path.display(), bbox);
            feature.bbox = Some(bbox.to_geojson());
            feature.geometry = Some(Geometry::new(Value::Polygon(vec![bbox.ring()])));
        }
        Ok(())
    }
}
