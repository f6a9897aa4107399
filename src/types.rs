use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl Polarization {
    /// Lower-case token used in tile file names
    pub fn lowercase(&self) -> &'static str {
        match self {
            Polarization::VV => "vv",
            Polarization::VH => "vh",
            Polarization::HV => "hv",
            Polarization::HH => "hh",
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(SarError::InvalidConfig(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Radiometric calibration output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationBand {
    #[default]
    Sigma,
    Gamma,
    Beta,
}

impl CalibrationBand {
    /// Band label as it appears in engine band names (e.g. `Sigma0_VV`)
    pub fn band_type(&self) -> &'static str {
        match self {
            CalibrationBand::Sigma => "Sigma0",
            CalibrationBand::Gamma => "Gamma0",
            CalibrationBand::Beta => "Beta0",
        }
    }
}

impl FromStr for CalibrationBand {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sigma" => Ok(CalibrationBand::Sigma),
            "gamma" => Ok(CalibrationBand::Gamma),
            "beta" => Ok(CalibrationBand::Beta),
            _ => Err(SarError::InvalidConfig(format!(
                "Wrong calibration band type: {} (expected sigma, gamma or beta)",
                s
            ))),
        }
    }
}

/// Land/sea masking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskType {
    Land,
    Sea,
}

impl FromStr for MaskType {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "land" => Ok(MaskType::Land),
            "sea" => Ok(MaskType::Sea),
            _ => Err(SarError::InvalidConfig(format!(
                "Wrong mask type: {} (expected land or sea)",
                s
            ))),
        }
    }
}

/// Digital elevation model used by terrain correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dem {
    /// SRTM 3 arc-second, covers -56 to 60 degrees latitude
    #[default]
    Srtm3Sec,
    /// ASTER GDEM 1 arc-second, global
    Aster1Sec,
}

impl Dem {
    /// Name understood by the engine's `demName` parameter
    pub fn engine_name(&self) -> &'static str {
        match self {
            Dem::Srtm3Sec => "SRTM 3Sec",
            Dem::Aster1Sec => "ASTER 1sec GDEM",
        }
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Build from a GeoJSON-ordered `[west, south, east, north]` slice
    pub fn from_geojson(bbox: &[f64]) -> SarResult<Self> {
        if bbox.len() != 4 {
            return Err(SarError::InvalidConfig(format!(
                "Bounding box needs 4 values, got {}",
                bbox.len()
            )));
        }
        Ok(Self {
            min_lon: bbox[0],
            min_lat: bbox[1],
            max_lon: bbox[2],
            max_lat: bbox[3],
        })
    }

    pub fn to_geojson(&self) -> Vec<f64> {
        vec![self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// Closed exterior ring, counter-clockwise
    pub fn ring(&self) -> Vec<Vec<f64>> {
        vec![
            vec![self.min_lon, self.min_lat],
            vec![self.max_lon, self.min_lat],
            vec![self.max_lon, self.max_lat],
            vec![self.min_lon, self.max_lat],
            vec![self.min_lon, self.min_lat],
        ]
    }
}

/// Result of one engine run after inspection of its tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    Produced(PathBuf),
    /// Clipping left no valid pixel
    Empty(PathBuf),
}

/// Error types for SAR pre-processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No .SAFE archive found under {0}")]
    MissingArchive(PathBuf),

    #[error("Polarization missing: requested {requested:?}, available {available:?}")]
    WrongPolarization {
        requested: Vec<Polarization>,
        available: Vec<Polarization>,
    },

    #[error("Processing engine did not finish successfully with error code {code}")]
    EngineFailure { code: i32 },

    #[error("The used input parameters don't result in any output when applied to the provided input images.")]
    NoOutput,

    #[error("Template error: {0}")]
    Template(String),

    #[error("Graph node not found: {0}")]
    NodeNotFound(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("XML parsing error: {0}")]
    XmlParsing(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SarError {
    /// Process exit status for a run aborted by this error
    ///
    /// Engine codes outside 1..=255 would be truncated by the OS (35072
    /// becomes 0), so they map to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            SarError::EngineFailure { code } if (1..=255).contains(code) => *code,
            _ => 1,
        }
    }
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;
