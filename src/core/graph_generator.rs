use crate::config::ProcessingConfig;
use crate::core::dem::{DemSelector, TERRAIN_CORRECTION_NODE};
use crate::core::substitutions::ParameterResolver;
use crate::io::graph::JobGraph;
use crate::io::safe::SafeArchive;
use crate::io::template::GraphTemplate;
use crate::types::{Dem, Polarization, SarResult};
use std::path::{Path, PathBuf};

pub const SUBSET_NODE: &str = "Subset";
pub const LAND_SEA_MASK_NODE: &str = "Land-Sea-Mask";
pub const SPECKLE_FILTER_NODE: &str = "Speckle-Filter";
pub const LINEAR_TO_DB_NODE: &str = "LinearToFromdB";

/// Optional processing steps switched off by the configuration
pub fn disabled_nodes(config: &ProcessingConfig) -> Vec<&'static str> {
    let steps = [
        (SUBSET_NODE, config.clip_to_aoi),
        (LAND_SEA_MASK_NODE, config.mask.is_some()),
        (SPECKLE_FILTER_NODE, config.speckle_filter),
        (TERRAIN_CORRECTION_NODE, config.tcorrection),
        (LINEAR_TO_DB_NODE, config.linear_to_db),
    ];
    steps
        .iter()
        .filter(|(_, enabled)| !enabled)
        .map(|(node, _)| *node)
        .collect()
}

/// Turns the template into concrete job-graph files
pub struct GraphGenerator<'a> {
    template: &'a GraphTemplate,
    config: &'a ProcessingConfig,
    graph_dir: PathBuf,
}

impl<'a> GraphGenerator<'a> {
    pub fn new<P: AsRef<Path>>(
        template: &'a GraphTemplate,
        config: &'a ProcessingConfig,
        graph_dir: P,
    ) -> Self {
        Self {
            template,
            config,
            graph_dir: graph_dir.as_ref().to_path_buf(),
        }
    }

    /// Job-local graph with the DEM applied and disabled steps removed
    pub fn build(&self, dem: Dem) -> SarResult<JobGraph> {
        let mut graph = self.template.instantiate();
        DemSelector::apply(&mut graph, dem);
        for node in disabled_nodes(self.config) {
            log::info!("{} will be discarded.", node);
            graph.prune_node(node)?;
        }
        Ok(graph)
    }

    /// Where the graph for one job is written
    pub fn graph_path(
        &self,
        archive: &SafeArchive,
        scene_id: &str,
        polarization: Polarization,
    ) -> PathBuf {
        self.graph_dir
            .join(format!("{}_{}_{}.xml", archive.name(), scene_id, polarization))
    }

    /// Write the graph for one (scene, polarization) job and return its path
    pub fn generate(
        &self,
        archive: &SafeArchive,
        scene_id: &str,
        polarization: Polarization,
        dem: Dem,
        tile_base: &Path,
    ) -> SarResult<PathBuf> {
        let substitutions = ParameterResolver::new(self.config).resolve(archive, polarization, tile_base)?;
        let xml = self.build(dem)?.render(&substitutions)?;

        std::fs::create_dir_all(&self.graph_dir)?;
        let path = self.graph_path(archive, scene_id, polarization);
        std::fs::write(&path, xml)?;
        log::debug!("Wrote job graph {}", path.display());
        Ok(path)
    }
}
