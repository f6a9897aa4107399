//! Driving the external graph processing tool
//!
//! The engine runs as a blocking subprocess. A non-zero exit aborts the whole
//! run; exit code 35072 from a containerised `gpt` historically meant the
//! container ran out of memory.

use crate::io::raster;
use crate::types::{SarError, SarResult, TileOutcome};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Anything that can execute a job graph against a source product
pub trait Engine: Send + Sync {
    /// Run `graph` on `source`, returning the process exit code
    fn run(&self, graph: &Path, source: &Path) -> SarResult<i32>;
}

/// SNAP's `gpt` command line tool
#[derive(Debug, Clone)]
pub struct GptEngine {
    executable: PathBuf,
}

impl GptEngine {
    pub fn new<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
        }
    }
}

impl Engine for GptEngine {
    fn run(&self, graph: &Path, source: &Path) -> SarResult<i32> {
        log::info!(
            "Running SNAP command: {} {} -e {}",
            self.executable.display(),
            graph.display(),
            source.display()
        );

        let status = Command::new(&self.executable)
            .arg(graph)
            .arg("-e")
            .arg(source)
            .status()
            .map_err(|e| {
                SarError::Processing(format!(
                    "Could not execute '{}': {}",
                    self.executable.display(),
                    e
                ))
            })?;

        Ok(exit_code(&status))
    }
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Runs one job and classifies the tile it produced
pub struct EngineDriver<'a> {
    engine: &'a dyn Engine,
    clip_to_aoi: bool,
}

impl<'a> EngineDriver<'a> {
    pub fn new(engine: &'a dyn Engine, clip_to_aoi: bool) -> Self {
        Self {
            engine,
            clip_to_aoi,
        }
    }

    /// Execute `graph` and inspect the expected output `tile`
    pub fn run(&self, graph: &Path, source: &Path, tile: &Path) -> SarResult<TileOutcome> {
        let code = self.engine.run(graph, source)?;
        if code != 0 {
            log::error!(
                "SNAP did not finish successfully with error code {}",
                code
            );
            return Err(SarError::EngineFailure { code });
        }

        if !tile.exists() {
            return Err(SarError::Processing(format!(
                "Engine finished without writing {}",
                tile.display()
            )));
        }

        // Clipping can leave a tile without a single valid pixel
        if self.clip_to_aoi && raster::is_empty(tile)? {
            log::info!(
                "Output file {} empty, removing it from list of returned images",
                tile.display()
            );
            return Ok(TileOutcome::Empty(tile.to_path_buf()));
        }

        Ok(TileOutcome::Produced(tile.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::raster::test_support::write_tile;
    use ndarray::Array2;
    use tempfile::TempDir;

    struct ExitWith(i32);

    impl Engine for ExitWith {
        fn run(&self, _graph: &Path, _source: &Path) -> SarResult<i32> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_non_zero_exit_is_fatal() {
        let engine = ExitWith(35072);
        let driver = EngineDriver::new(&engine, false);
        let result = driver.run(Path::new("g.xml"), Path::new("src"), Path::new("vv.tif"));
        match result {
            Err(SarError::EngineFailure { code }) => assert_eq!(code, 35072),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_tile_is_error() {
        let tmp = TempDir::new().unwrap();
        let engine = ExitWith(0);
        let driver = EngineDriver::new(&engine, false);
        let result = driver.run(Path::new("g.xml"), Path::new("src"), &tmp.path().join("vv.tif"));
        assert!(matches!(result, Err(SarError::Processing(_))));
    }

    #[test]
    fn test_empty_tile_only_checked_when_clipping() {
        let tmp = TempDir::new().unwrap();
        let tile = tmp.path().join("vv.tif");
        write_tile(&tile, (14.5, 53.5), 0.01, &Array2::<f32>::zeros((8, 8)), None);

        let engine = ExitWith(0);
        let clipped = EngineDriver::new(&engine, true)
            .run(Path::new("g.xml"), Path::new("src"), &tile)
            .unwrap();
        assert_eq!(clipped, TileOutcome::Empty(tile.clone()));

        let full = EngineDriver::new(&engine, false)
            .run(Path::new("g.xml"), Path::new("src"), &tile)
            .unwrap();
        assert_eq!(full, TileOutcome::Produced(tile));
    }

    #[cfg(unix)]
    #[test]
    fn test_gpt_engine_reports_exit_code() {
        let engine = GptEngine::new("false");
        assert_eq!(engine.run(Path::new("g.xml"), Path::new("src")).unwrap(), 1);
        let engine = GptEngine::new("true");
        assert_eq!(engine.run(Path::new("g.xml"), Path::new("src")).unwrap(), 0);
    }
}
