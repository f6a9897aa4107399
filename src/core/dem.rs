//! DEM choice for terrain correction
//!
//! SRTM only covers latitudes between 56 degrees south and 60 degrees north.
//! Scenes reaching beyond that are corrected with ASTER GDEM instead. The
//! choice is applied to a job-local graph copy, never to the shared template.

use crate::io::graph::JobGraph;
use crate::types::{BoundingBox, Dem};

/// Node carrying the `demName` parameter
pub const TERRAIN_CORRECTION_NODE: &str = "Terrain-Correction";

/// Southern limit of SRTM coverage (degrees)
pub const SRTM_MIN_LAT: f64 = -56.0;

/// Northern limit of SRTM coverage (degrees)
pub const SRTM_MAX_LAT: f64 = 60.0;

pub struct DemSelector;

impl DemSelector {
    /// Latitude deciding DEM coverage
    ///
    /// Northern scenes use their northern bound, southern scenes their southern
    /// bound. A scene straddling the equator uses whichever bound lies farther
    /// from it.
    pub fn relevant_latitude(bbox: &BoundingBox) -> f64 {
        let (south, north) = (bbox.min_lat.min(bbox.max_lat), bbox.min_lat.max(bbox.max_lat));
        if south >= 0.0 {
            north
        } else if north <= 0.0 {
            south
        } else if north.abs() >= south.abs() {
            north
        } else {
            south
        }
    }

    pub fn select_dem(bbox: &BoundingBox) -> Dem {
        let latitude = Self::relevant_latitude(bbox);
        if (SRTM_MIN_LAT..=SRTM_MAX_LAT).contains(&latitude) {
            Dem::Srtm3Sec
        } else {
            log::info!(
                "Latitude {:.3} is outside SRTM coverage, using {}",
                latitude,
                Dem::Aster1Sec.engine_name()
            );
            Dem::Aster1Sec
        }
    }

    /// Point the terrain correction of `graph` at `dem`
    pub fn apply(graph: &mut JobGraph, dem: Dem) {
        match graph.node_mut(TERRAIN_CORRECTION_NODE) {
            Some(node) => node.set_parameter("demName", dem.engine_name()),
            None => log::debug!(
                "No {} node in graph, DEM {} not applied",
                TERRAIN_CORRECTION_NODE,
                dem.engine_name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::template::GraphTemplate;

    fn bbox(south: f64, north: f64) -> BoundingBox {
        BoundingBox {
            min_lon: 10.0,
            max_lon: 11.0,
            min_lat: south,
            max_lat: north,
        }
    }

    #[test]
    fn test_northern_scene_beyond_srtm() {
        assert_eq!(DemSelector::relevant_latitude(&bbox(59.5, 61.0)), 61.0);
        assert_eq!(DemSelector::select_dem(&bbox(59.5, 61.0)), Dem::Aster1Sec);
    }

    #[test]
    fn test_southern_limit_is_inclusive() {
        assert_eq!(DemSelector::relevant_latitude(&bbox(-56.0, -55.0)), -56.0);
        assert_eq!(DemSelector::select_dem(&bbox(-56.0, -55.0)), Dem::Srtm3Sec);
        assert_eq!(DemSelector::select_dem(&bbox(-57.0, -55.0)), Dem::Aster1Sec);
    }

    #[test]
    fn test_equator_straddling_scene() {
        assert_eq!(DemSelector::relevant_latitude(&bbox(-0.5, 0.5)), 0.5);
        assert_eq!(DemSelector::relevant_latitude(&bbox(-2.0, 1.0)), -2.0);
        assert_eq!(DemSelector::select_dem(&bbox(-0.5, 0.5)), Dem::Srtm3Sec);
        assert_eq!(DemSelector::select_dem(&bbox(0.0, 0.0)), Dem::Srtm3Sec);
    }

    #[test]
    fn test_apply_is_local_to_graph() {
        let template = GraphTemplate::bundled().unwrap();
        let mut graph = template.instantiate();
        DemSelector::apply(&mut graph, Dem::Aster1Sec);

        let dem_of = |g: &JobGraph| {
            g.node(TERRAIN_CORRECTION_NODE)
                .and_then(|n| n.parameter("demName"))
                .map(str::to_string)
        };
        assert_eq!(dem_of(&graph).as_deref(), Some("ASTER 1sec GDEM"));
        assert_eq!(dem_of(template.graph()).as_deref(), Some("SRTM 3Sec"));
    }

    #[test]
    fn test_apply_without_terrain_correction() {
        let mut graph = GraphTemplate::bundled().unwrap().instantiate();
        graph.prune_node(TERRAIN_CORRECTION_NODE).unwrap();
        let before = graph.clone();
        DemSelector::apply(&mut graph, Dem::Aster1Sec);
        assert_eq!(graph, before);
    }
}
