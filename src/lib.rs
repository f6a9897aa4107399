//! snap-polarimetric: Sentinel-1 GRD pre-processing through ESA SNAP
//!
//! For every scene of an input catalog this library renders a SNAP job graph
//! per polarization, runs the external `gpt` tool on it and stacks the
//! resulting single-band GeoTIFFs into one multi-band product per scene.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, CalibrationBand, Dem, MaskType, Polarization, SarError, SarResult, TileOutcome,
};

pub use config::{ProcessingConfig, RunPaths, SpatialFilter};
pub use core::{Engine, GptEngine, SnapPolarimetry};
pub use io::{GraphTemplate, JobGraph};

#[cfg(feature = "python")]
mod python {
    use crate::config::{ProcessingConfig, RunPaths};
    use crate::core::SnapPolarimetry;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    /// Process a GeoJSON feature collection and return the output collection
    ///
    /// `root` places input, output and graph folders below one directory;
    /// without it the block's default locations are used.
    #[pyfunction]
    #[pyo3(signature = (params_json, catalog_json, root = None))]
    fn process(params_json: &str, catalog_json: &str, root: Option<String>) -> PyResult<String> {
        let config = ProcessingConfig::from_json(params_json)
            .map_err(|e| PyValueError::new_err(format!("{}", e)))?;
        let catalog: geojson::FeatureCollection = serde_json::from_str(catalog_json)
            .map_err(|e| PyValueError::new_err(format!("Invalid catalog: {}", e)))?;

        let paths = match root {
            Some(root) => RunPaths {
                gpt_executable: RunPaths::from_env().gpt_executable,
                ..RunPaths::under(root)
            },
            None => RunPaths::from_env(),
        };

        let output = paths
            .ensure_directories()
            .and_then(|_| SnapPolarimetry::new(config, paths))
            .and_then(|pipeline| pipeline.process_collection(&catalog))
            .map_err(|e| PyRuntimeError::new_err(format!("{}", e)))?;

        serde_json::to_string(&output).map_err(|e| PyRuntimeError::new_err(format!("{}", e)))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(process, m)?)?;
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        Ok(())
    }
}
