//! Substitution values for one (scene, polarization) job

use crate::config::ProcessingConfig;
use crate::io::safe::SafeArchive;
use crate::io::template::Substitutions;
use crate::types::{CalibrationBand, MaskType, Polarization, SarError, SarResult};
use geojson::{Geometry, Value};
use std::path::Path;

/// Derives template variables from the scene and the processing options
pub struct ParameterResolver<'a> {
    config: &'a ProcessingConfig,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(config: &'a ProcessingConfig) -> Self {
        Self { config }
    }

    /// Variables for one job; `tile_base` is the output tile path without extension
    pub fn resolve(
        &self,
        archive: &SafeArchive,
        polarization: Polarization,
        tile_base: &Path,
    ) -> SarResult<Substitutions> {
        let mut substitutions = Substitutions::new();
        substitutions.insert(
            "read_file_manifest_path".to_string(),
            archive.manifest_path().to_string_lossy().into_owned(),
        );
        substitutions.insert(
            "downcase_polarisation".to_string(),
            tile_base.to_string_lossy().into_owned(),
        );
        substitutions.insert("upcase_polarisation".to_string(), polarization.to_string());

        for (key, value) in calibration_flags(self.config.calibration_band) {
            substitutions.insert(key.to_string(), value.to_string());
        }

        match self.config.spatial_filter() {
            Some(filter) => {
                substitutions.insert("polygon".to_string(), geometry_to_wkt(&filter.geometry())?);
            }
            None => log::info!("No ROI set, the engine will process the whole scene."),
        }

        if let Some(flag) = mask_flag(self.config.mask) {
            substitutions.insert("mask_type".to_string(), flag.to_string());
        }

        Ok(substitutions)
    }
}

/// Mutually exclusive calibration band switches plus the band label
pub fn calibration_flags(band: CalibrationBand) -> [(&'static str, &'static str); 4] {
    let flag = |b: CalibrationBand| if b == band { "true" } else { "false" };
    [
        ("sigma_band", flag(CalibrationBand::Sigma)),
        ("gamma_band", flag(CalibrationBand::Gamma)),
        ("beta_band", flag(CalibrationBand::Beta)),
        ("band_type", band.band_type()),
    ]
}

/// `landMask` value of the Land-Sea-Mask operator, unset without a mask
pub fn mask_flag(mask: Option<MaskType>) -> Option<&'static str> {
    match mask {
        Some(MaskType::Sea) => Some("false"),
        Some(MaskType::Land) => Some("true"),
        None => None,
    }
}

/// Well-known text for the geometry types an area of interest can take
pub fn geometry_to_wkt(geometry: &Geometry) -> SarResult<String> {
    fn position(p: &[f64]) -> String {
        p.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
    }
    fn ring(points: &[Vec<f64>]) -> String {
        format!(
            "({})",
            points.iter().map(|p| position(p)).collect::<Vec<_>>().join(", ")
        )
    }
    fn polygon(rings: &[Vec<Vec<f64>>]) -> String {
        format!(
            "({})",
            rings.iter().map(|r| ring(r)).collect::<Vec<_>>().join(", ")
        )
    }

    match &geometry.value {
        Value::Point(p) => Ok(format!("POINT ({})", position(p))),
        Value::LineString(points) => Ok(format!("LINESTRING {}", ring(points))),
        Value::Polygon(rings) => Ok(format!("POLYGON {}", polygon(rings))),
        Value::MultiPolygon(polygons) => Ok(format!(
            "MULTIPOLYGON ({})",
            polygons.iter().map(|p| polygon(p)).collect::<Vec<_>>().join(", ")
        )),
        Value::MultiPoint(_) | Value::MultiLineString(_) | Value::GeometryCollection(_) => {
            Err(SarError::InvalidConfig(
                "Area of interest must be a point, line or (multi)polygon".to_string(),
            ))
        }
    }
}
