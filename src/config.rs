//! Processing options and run locations
//!
//! Options arrive as a JSON document (the block's task parameters). Enumerated
//! options accept a bare string or a one-element list, boolean options accept
//! JSON booleans or the strings `"true"`/`"false"`.

use crate::types::{BoundingBox, CalibrationBand, MaskType, Polarization, SarError, SarResult};
use geojson::{Geometry, Value};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable carrying the JSON task parameters
pub const PARAMS_ENV: &str = "UP42_TASK_PARAMETERS";

/// Environment variable overriding the engine executable
pub const GPT_PATH_ENV: &str = "SNAP_GPT_PATH";

/// Environment variable bounding how many features run at once
pub const WORKERS_ENV: &str = "SNAP_POLARIMETRIC_WORKERS";

/// Number of features processed at once; unset or empty means one
pub fn parse_workers(value: Option<&str>) -> SarResult<usize> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(1),
        Some(v) => match v.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(SarError::InvalidConfig(format!(
                "{} must be a positive integer, got '{}'",
                WORKERS_ENV, v
            ))),
        },
    }
}

/// Worker count from `SNAP_POLARIMETRIC_WORKERS`
pub fn workers_from_env() -> SarResult<usize> {
    parse_workers(std::env::var(WORKERS_ENV).ok().as_deref())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }

    /// At most one value; an empty list counts as unset
    fn single(self, option: &str) -> SarResult<Option<String>> {
        let mut values = self.into_vec();
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.pop()),
            n => Err(SarError::InvalidConfig(format!(
                "{} takes a single value, got {}",
                option, n
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn resolve(self, option: &str) -> SarResult<bool> {
        match self {
            Flag::Bool(b) => Ok(b),
            Flag::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(SarError::InvalidConfig(format!(
                    "{} must be a boolean, got '{}'",
                    option, s
                ))),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawParams {
    calibration_band: Option<OneOrMany>,
    speckle_filter: Option<Flag>,
    linear_to_db: Option<Flag>,
    clip_to_aoi: Option<Flag>,
    mask: Option<OneOrMany>,
    tcorrection: Option<Flag>,
    polarisations: Option<Vec<String>>,
    bbox: Option<Vec<f64>>,
    contains: Option<Geometry>,
    intersects: Option<Geometry>,
}

/// Area-of-interest filter carried along with the query
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    Bbox(BoundingBox),
    Contains(Geometry),
    Intersects(Geometry),
}

impl SpatialFilter {
    /// Geometry the engine should clip to
    pub fn geometry(&self) -> Geometry {
        match self {
            SpatialFilter::Bbox(bbox) => Geometry::new(Value::Polygon(vec![bbox.ring()])),
            SpatialFilter::Contains(g) | SpatialFilter::Intersects(g) => g.clone(),
        }
    }
}

/// Validated processing options for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub calibration_band: CalibrationBand,
    pub speckle_filter: bool,
    pub linear_to_db: bool,
    pub clip_to_aoi: bool,
    pub mask: Option<MaskType>,
    pub tcorrection: bool,
    /// Requested polarizations, in band order
    pub polarisations: Vec<Polarization>,
    pub bbox: Option<BoundingBox>,
    pub contains: Option<Geometry>,
    pub intersects: Option<Geometry>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            calibration_band: CalibrationBand::Sigma,
            speckle_filter: true,
            linear_to_db: true,
            clip_to_aoi: false,
            mask: None,
            tcorrection: true,
            polarisations: vec![Polarization::VV],
            bbox: None,
            contains: None,
            intersects: None,
        }
    }
}

impl ProcessingConfig {
    /// Parse and validate a JSON parameter document
    pub fn from_json(json: &str) -> SarResult<Self> {
        let json = if json.trim().is_empty() { "{}" } else { json };
        let raw: RawParams = serde_json::from_str(json)?;
        let config = Self::from_raw(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read parameters from `UP42_TASK_PARAMETERS`
    pub fn from_env() -> SarResult<Self> {
        let data = std::env::var(PARAMS_ENV).unwrap_or_default();
        log::debug!("Fetching parameters for this block: {}", data);
        Self::from_json(&data)
    }

    fn from_raw(raw: RawParams) -> SarResult<Self> {
        let defaults = Self::default();

        let calibration_band = match raw.calibration_band {
            Some(v) => match v.single("calibration_band")? {
                Some(s) => s.parse()?,
                None => defaults.calibration_band,
            },
            None => defaults.calibration_band,
        };

        let mask = match raw.mask {
            Some(v) => v.single("mask")?.map(|s| s.parse()).transpose()?,
            None => None,
        };

        let flag = |value: Option<Flag>, name: &str, default: bool| -> SarResult<bool> {
            value.map(|f| f.resolve(name)).unwrap_or(Ok(default))
        };

        let polarisations = match raw.polarisations {
            Some(list) if !list.is_empty() => {
                let mut pols: Vec<Polarization> = Vec::with_capacity(list.len());
                for name in &list {
                    let pol: Polarization = name.parse()?;
                    if pols.contains(&pol) {
                        return Err(SarError::InvalidConfig(format!(
                            "Polarization {} requested twice",
                            pol
                        )));
                    }
                    pols.push(pol);
                }
                pols
            }
            _ => defaults.polarisations,
        };

        let bbox = raw
            .bbox
            .as_deref()
            .map(BoundingBox::from_geojson)
            .transpose()?;

        Ok(Self {
            calibration_band,
            speckle_filter: flag(raw.speckle_filter, "speckle_filter", defaults.speckle_filter)?,
            linear_to_db: flag(raw.linear_to_db, "linear_to_db", defaults.linear_to_db)?,
            clip_to_aoi: flag(raw.clip_to_aoi, "clip_to_aoi", defaults.clip_to_aoi)?,
            mask,
            tcorrection: flag(raw.tcorrection, "tcorrection", defaults.tcorrection)?,
            polarisations,
            bbox,
            contains: raw.contains,
            intersects: raw.intersects,
        })
    }

    /// Check the clip-to-AOI / spatial filter invariant
    pub fn validate(&self) -> SarResult<()> {
        let filters = [
            self.bbox.is_some(),
            self.contains.is_some(),
            self.intersects.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if !self.clip_to_aoi && filters > 0 {
            return Err(SarError::InvalidConfig(
                "When clip_to_aoi is set to False, bbox, contains and intersects must be set to null."
                    .to_string(),
            ));
        }
        if self.clip_to_aoi && filters != 1 {
            return Err(SarError::InvalidConfig(format!(
                "When clip_to_aoi is set to True, exactly one of bbox, contains or intersects \
                 must be defined (got {}).",
                filters
            )));
        }
        if self.polarisations.is_empty() {
            return Err(SarError::InvalidConfig(
                "At least one polarization must be requested".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured spatial filter, if any
    pub fn spatial_filter(&self) -> Option<SpatialFilter> {
        if let Some(bbox) = self.bbox {
            Some(SpatialFilter::Bbox(bbox))
        } else if let Some(g) = &self.contains {
            Some(SpatialFilter::Contains(g.clone()))
        } else {
            self.intersects.clone().map(SpatialFilter::Intersects)
        }
    }
}

/// Filesystem locations and the engine executable used by one run
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Scene archives live under `<input_root>/<data_path>/`
    pub input_root: PathBuf,
    /// Stacks and the output catalog are written here
    pub output_root: PathBuf,
    /// Generated job-graph files
    pub graph_dir: PathBuf,
    pub gpt_executable: PathBuf,
}

impl Default for RunPaths {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("/tmp/input"),
            output_root: PathBuf::from("/tmp/output"),
            graph_dir: PathBuf::from("/tmp"),
            gpt_executable: PathBuf::from("gpt"),
        }
    }
}

impl RunPaths {
    /// Defaults with the engine executable taken from `SNAP_GPT_PATH` when set
    pub fn from_env() -> Self {
        let mut paths = Self::default();
        if let Ok(gpt) = std::env::var(GPT_PATH_ENV) {
            if !gpt.is_empty() {
                paths.gpt_executable = PathBuf::from(gpt);
            }
        }
        paths
    }

    /// All roots below one directory (used by tests and local runs)
    pub fn under<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            input_root: root.join("input"),
            output_root: root.join("output"),
            graph_dir: root.join("graphs"),
            gpt_executable: PathBuf::from("gpt"),
        }
    }

    pub fn input_catalog(&self) -> PathBuf {
        self.input_root.join("data.json")
    }

    pub fn output_catalog(&self) -> PathBuf {
        self.output_root.join("data.json")
    }

    pub fn ensure_directories(&self) -> SarResult<()> {
        std::fs::create_dir_all(&self.input_root)?;
        std::fs::create_dir_all(&self.output_root)?;
        std::fs::create_dir_all(&self.graph_dir)?;
        Ok(())
    }
}
