//! Multi-band stack assembly from per-polarization tiles

use crate::io::raster::{self, GeoTiffOptions, RasterProfile};
use crate::types::{Polarization, SarError, SarResult};
use gdal::{Dataset, Metadata};
use std::path::{Path, PathBuf};

/// Name of the stack while it is still inside the per-scene folder
const STACK_FILE: &str = "stack.tif";

/// One single-band tile and the polarization it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTile {
    pub polarization: Polarization,
    pub path: PathBuf,
}

impl BandTile {
    pub fn new<P: AsRef<Path>>(polarization: Polarization, path: P) -> Self {
        Self {
            polarization,
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Merges the tiles of one scene into `<output_root>/<scene_id>.tif`
pub struct StackAssembler {
    options: GeoTiffOptions,
}

impl Default for StackAssembler {
    fn default() -> Self {
        Self::new(GeoTiffOptions::default())
    }
}

impl StackAssembler {
    pub fn new(options: GeoTiffOptions) -> Self {
        Self { options }
    }

    /// Build the final stack for the tiles in `scene_dir` and move it next to it
    ///
    /// With `normalize_nodata` every tile is first rewritten with nodata 0.
    /// Tiles and the scene folder are removed afterwards.
    pub fn assemble(
        &self,
        scene_dir: &Path,
        tiles: &[BandTile],
        normalize_nodata: bool,
    ) -> SarResult<PathBuf> {
        if normalize_nodata {
            Self::normalize_nodata(tiles)?;
        }

        log::info!("Writing started.");
        let stack_path = scene_dir.join(STACK_FILE);
        self.write_stack(tiles, &stack_path)?;
        log::info!("Writing is finished.");

        for tile in tiles {
            std::fs::remove_file(&tile.path)?;
        }

        let final_path = Self::relocate(scene_dir, &stack_path)?;
        Self::remove_scene_dir(scene_dir)?;
        Ok(final_path)
    }

    /// Write one band per tile, in tile order, with block-windowed copies
    ///
    /// Non-finite pixels become 0 and each band is described with its
    /// polarization name.
    pub fn write_stack(&self, tiles: &[BandTile], stack_path: &Path) -> SarResult<()> {
        let first = tiles
            .first()
            .ok_or_else(|| SarError::Processing("No tiles to stack".to_string()))?;
        let profile = RasterProfile::open(&first.path)?;
        let stack = raster::create_geotiff(stack_path, &profile, tiles.len(), &self.options)?;

        for (index, tile) in tiles.iter().enumerate() {
            let source = Dataset::open(&tile.path)?;
            let (width, height) = source.raster_size();
            if (width, height) != (profile.width, profile.height) {
                return Err(SarError::Processing(format!(
                    "Tile {} is {}x{}, expected {}x{}",
                    tile.path.display(),
                    width,
                    height,
                    profile.width,
                    profile.height
                )));
            }

            let src_band = source.rasterband(1)?;
            let mut dst_band = stack.rasterband(index as isize + 1)?;
            for window in raster::block_windows(&src_band) {
                let mut data = raster::read_window(&src_band, window)?;
                data.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
                raster::write_window(&mut dst_band, window, &data)?;
            }
            dst_band.set_description(&tile.polarization.to_string())?;
            log::debug!("Band {} <- {}", index + 1, tile.path.display());
        }

        Ok(())
    }

    /// Rewrite every tile with nodata 0, replacing the original file
    pub fn normalize_nodata(tiles: &[BandTile]) -> SarResult<()> {
        for tile in tiles {
            let file_name = tile
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.tif", tile.polarization.lowercase()));
            let updated = tile.path.with_file_name(format!("updated_{}", file_name));

            raster::rewrite_with_nodata(&tile.path, &updated, 0.0)?;
            std::fs::remove_file(&tile.path)?;
            std::fs::rename(&updated, &tile.path)?;
        }
        Ok(())
    }

    /// Move the stack to `<parent>/<scene_id>.tif`, replacing a previous one
    fn relocate(scene_dir: &Path, stack_path: &Path) -> SarResult<PathBuf> {
        let scene_id = scene_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SarError::Processing(format!("Invalid scene folder {}", scene_dir.display()))
            })?;
        let parent = scene_dir.parent().unwrap_or_else(|| Path::new("."));
        let final_path = parent.join(format!("{}.tif", scene_id));

        if final_path.exists() {
            std::fs::remove_file(&final_path)?;
        }
        std::fs::rename(stack_path, &final_path)?;
        Ok(final_path)
    }

    /// Remove the scene folder; if the OS refuses, delete what is left inside
    fn remove_scene_dir(scene_dir: &Path) -> SarResult<()> {
        if let Err(e) = std::fs::remove_dir_all(scene_dir) {
            log::warn!(
                "Could not remove {} ({}), deleting remaining files",
                scene_dir.display(),
                e
            );
            for entry in std::fs::read_dir(scene_dir)? {
                let path = entry?.path();
                if path.is_file() {
                    std::fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }
}
