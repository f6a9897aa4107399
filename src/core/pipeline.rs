//! Per-feature orchestration of the pre-processing run
//!
//! Failure scopes: a missing polarization skips the feature, an empty clipped
//! tile skips the band, an engine failure ends the run.

use crate::config::{ProcessingConfig, RunPaths};
use crate::core::dem::DemSelector;
use crate::core::engine::{Engine, EngineDriver, GptEngine};
use crate::core::graph_generator::GraphGenerator;
use crate::core::stack::{BandTile, StackAssembler};
use crate::io::catalog::{self, CatalogBuilder};
use crate::io::safe::{validate_polarisations, SafeArchive};
use crate::io::template::GraphTemplate;
use crate::types::{Dem, SarError, SarResult, TileOutcome};
use geojson::{Feature, FeatureCollection};

/// Polarimetric pre-processing of Sentinel-1 GRD scenes through SNAP
pub struct SnapPolarimetry {
    config: ProcessingConfig,
    paths: RunPaths,
    template: GraphTemplate,
    engine: Box<dyn Engine>,
    assembler: StackAssembler,
}

impl SnapPolarimetry {
    /// Validated pipeline using the bundled template and `gpt` from `paths`
    pub fn new(config: ProcessingConfig, paths: RunPaths) -> SarResult<Self> {
        config.validate()?;
        let engine = GptEngine::new(&paths.gpt_executable);
        Ok(Self {
            config,
            paths,
            template: GraphTemplate::bundled()?,
            engine: Box::new(engine),
            assembler: StackAssembler::default(),
        })
    }

    pub fn with_engine(mut self, engine: Box<dyn Engine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Run the engine for every requested polarization of one scene
    ///
    /// Returns the produced tiles in request order; tiles left empty by
    /// clipping are dropped. Fails with `WrongPolarization` before any engine
    /// run if the scene lacks one of the requested polarizations.
    pub fn process_feature(&self, feature: &Feature) -> SarResult<Vec<BandTile>> {
        let scene_id = catalog::data_path(feature)?;
        let archive = SafeArchive::locate(&self.paths.input_root, &scene_id)?;

        let requested = &self.config.polarisations;
        let available = archive.polarizations()?;
        if !validate_polarisations(requested, &available) {
            return Err(SarError::WrongPolarization {
                requested: requested.clone(),
                available,
            });
        }

        let dem = match catalog::feature_bbox(feature) {
            Some(bbox) => DemSelector::select_dem(&bbox),
            None => {
                log::warn!("Feature {} has no extent, keeping default DEM", scene_id);
                Dem::default()
            }
        };

        let scene_dir = self.paths.output_root.join(&scene_id);
        std::fs::create_dir_all(&scene_dir)?;

        let generator = GraphGenerator::new(&self.template, &self.config, &self.paths.graph_dir);
        let driver = EngineDriver::new(self.engine.as_ref(), self.config.clip_to_aoi);

        let mut tiles = Vec::with_capacity(requested.len());
        for &polarization in requested {
            let tile_base = scene_dir.join(polarization.lowercase());
            let tile_path = tile_base.with_extension("tif");
            let graph_path = generator.generate(&archive, &scene_id, polarization, dem, &tile_base)?;

            match driver.run(&graph_path, archive.path(), &tile_path)? {
                TileOutcome::Produced(path) => tiles.push(BandTile::new(polarization, path)),
                TileOutcome::Empty(path) => std::fs::remove_file(path)?,
            }
        }

        log::info!("SNAP processing is finished!");
        Ok(tiles)
    }

    /// Process one feature end to end; `None` when it yields no output
    fn run_feature(&self, feature: &Feature) -> SarResult<Option<Feature>> {
        let tiles = match self.process_feature(feature) {
            Ok(tiles) => tiles,
            Err(SarError::WrongPolarization {
                requested,
                available,
            }) => {
                log::error!(
                    "WrongPolarization: some or all of the polarisations ({:?}) don't exist \
                     in this product ({:?}), skipping.",
                    requested,
                    available
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let scene_id = catalog::data_path(feature)?;
        let scene_dir = self.paths.output_root.join(&scene_id);
        if tiles.is_empty() {
            log::debug!("No processed images returned for {}, will continue", scene_id);
            // Only removes the folder if nothing was left behind
            if let Err(e) = std::fs::remove_dir(&scene_dir) {
                log::debug!("Keeping {}: {}", scene_dir.display(), e);
            }
            return Ok(None);
        }

        let stack = self
            .assembler
            .assemble(&scene_dir, &tiles, self.config.mask.is_some())?;
        log::info!("Stack written to {}", stack.display());

        Ok(Some(
            CatalogBuilder::new(&self.paths.output_root).output_feature(feature, &scene_id),
        ))
    }

    /// Process a collection with at most `workers` features in flight
    ///
    /// Every feature may start its own `gpt` JVM, so anything above one worker
    /// multiplies peak memory. One worker runs features one after another.
    pub fn run(&self, input: &FeatureCollection, workers: usize) -> SarResult<FeatureCollection> {
        if workers > 1 {
            self.run_concurrently(input, workers)
        } else {
            self.process_collection(input)
        }
    }

    #[cfg(feature = "parallel")]
    fn run_concurrently(
        &self,
        input: &FeatureCollection,
        workers: usize,
    ) -> SarResult<FeatureCollection> {
        self.process_collection_parallel(input, workers)
    }

    #[cfg(not(feature = "parallel"))]
    fn run_concurrently(
        &self,
        input: &FeatureCollection,
        workers: usize,
    ) -> SarResult<FeatureCollection> {
        log::warn!(
            "Built without the parallel feature, ignoring {} workers",
            workers
        );
        self.process_collection(input)
    }

    /// Process all features one after another
    pub fn process_collection(&self, input: &FeatureCollection) -> SarResult<FeatureCollection> {
        let mut results = Vec::new();
        for feature in &input.features {
            if let Some(output) = self.run_feature(feature)? {
                results.push(output);
            }
        }
        self.finish(results)
    }

    /// Process features on a pool of `workers` threads; output order follows
    /// input order
    #[cfg(feature = "parallel")]
    pub fn process_collection_parallel(
        &self,
        input: &FeatureCollection,
        workers: usize,
    ) -> SarResult<FeatureCollection> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .map_err(|e| SarError::Processing(format!("Failed to build worker pool: {}", e)))?;
        log::info!("Processing features with {} workers", pool.current_num_threads());

        let outputs = pool.install(|| {
            input
                .features
                .par_iter()
                .map(|feature| self.run_feature(feature))
                .collect::<SarResult<Vec<Option<Feature>>>>()
        })?;
        self.finish(outputs.into_iter().flatten().collect())
    }

    fn finish(&self, features: Vec<Feature>) -> SarResult<FeatureCollection> {
        if features.is_empty() {
            return Err(SarError::NoOutput);
        }

        let mut collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        if self.config.clip_to_aoi {
            CatalogBuilder::new(&self.paths.output_root).update_extents(&mut collection)?;
        }
        Ok(collection)
    }
}
