mod common;

use geojson::{Feature, FeatureCollection};
use ndarray::Array2;
use snap_polarimetric::io::catalog;
use snap_polarimetric::io::JobGraph;
use snap_polarimetric::{
    Engine, ProcessingConfig, RunPaths, SarError, SarResult, SnapPolarimetry,
};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Stands in for `gpt`: writes a tile covering the scene wherever the
/// graph's Write node points, and records the graphs it ran
#[derive(Clone, Default)]
struct FakeGpt {
    graphs: Arc<Mutex<Vec<JobGraph>>>,
    exit_code: i32,
}

impl Engine for FakeGpt {
    fn run(&self, graph: &Path, _source: &Path) -> SarResult<i32> {
        let graph = JobGraph::from_xml(&std::fs::read_to_string(graph)?)?;
        if self.exit_code == 0 {
            let base = graph
                .node("Write")
                .and_then(|n| n.parameter("file"))
                .expect("Write node without file")
                .to_string();
            common::write_tile(
                Path::new(&format!("{}.tif", base)),
                (13.3, 38.3),
                0.01,
                &Array2::from_elem((10, 10), 0.5),
            );
        }
        self.graphs.lock().unwrap().push(graph);
        Ok(self.exit_code)
    }
}

fn feature(scene_id: &str) -> Feature {
    serde_json::from_value(json!({
        "type": "Feature",
        "bbox": [13.3, 38.2, 13.4, 38.3],
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[13.3, 38.2], [13.4, 38.2], [13.4, 38.3], [13.3, 38.3], [13.3, 38.2]]]
        },
        "properties": {"up42.data_path": scene_id, "title": "S1B_IW_GRDH"}
    }))
    .unwrap()
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn setup(params: &str, engine: FakeGpt) -> (TempDir, SnapPolarimetry) {
    let tmp = TempDir::new().unwrap();
    let paths = RunPaths::under(tmp.path());
    paths.ensure_directories().unwrap();
    let config = ProcessingConfig::from_json(params).expect("Invalid test parameters");
    let pipeline = SnapPolarimetry::new(config, paths)
        .unwrap()
        .with_engine(Box::new(engine));
    (tmp, pipeline)
}

#[test]
fn test_clipped_run_end_to_end() {
    let engine = FakeGpt::default();
    let (_tmp, snap) = setup(
        r#"{"clip_to_aoi": true, "bbox": [13.35, 38.25, 13.4, 38.3],
            "polarisations": ["VV", "VH"], "mask": ["land"]}"#,
        engine.clone(),
    );
    common::add_scene(&snap.paths().input_root, "scene-1", &["vv", "vh"]);

    let output = snap
        .process_collection(&collection(vec![feature("scene-1")]))
        .expect("Pipeline failed");

    assert_eq!(output.features.len(), 1);
    let out = &output.features[0];
    assert_eq!(catalog::data_path(out).unwrap(), "scene-1.tif");
    assert_eq!(
        out.property(catalog::CAPABILITY_KEY).and_then(|v| v.as_str()),
        Some("scene-1.tif")
    );
    assert_eq!(out.property("title").and_then(|v| v.as_str()), Some("S1B_IW_GRDH"));

    // Extent now follows the written raster: 10 x 0.01 degrees from (13.3, 38.3)
    let bbox = out.bbox.clone().expect("Output feature without bbox");
    let expected = [13.3, 38.2, 13.4, 38.3];
    for (got, want) in bbox.iter().zip(expected.iter()) {
        approx::assert_abs_diff_eq!(*got, *want, epsilon = 1e-6);
    }

    let stack = snap.paths().output_root.join("scene-1.tif");
    let dataset = gdal::Dataset::open(&stack).unwrap();
    assert_eq!(dataset.raster_count(), 2);

    let graphs = engine.graphs.lock().unwrap();
    assert_eq!(graphs.len(), 2);
    for graph in graphs.iter() {
        assert!(graph.node("Subset").is_some());
        assert!(graph.node("Land-Sea-Mask").is_some());
        assert_eq!(
            graph.node("Terrain-Correction").unwrap().parameter("demName"),
            Some("SRTM 3Sec")
        );
    }
}

#[test]
fn test_feature_without_polarization_is_skipped() {
    let engine = FakeGpt::default();
    let (_tmp, snap) = setup(r#"{"polarisations": ["VH"]}"#, engine.clone());
    common::add_scene(&snap.paths().input_root, "has-vh", &["vv", "vh"]);
    common::add_scene(&snap.paths().input_root, "vv-only", &["vv"]);

    let output = snap
        .process_collection(&collection(vec![feature("vv-only"), feature("has-vh")]))
        .unwrap();

    assert_eq!(output.features.len(), 1);
    assert_eq!(catalog::data_path(&output.features[0]).unwrap(), "has-vh.tif");
    assert_eq!(engine.graphs.lock().unwrap().len(), 1);
    assert!(!snap.paths().output_root.join("vv-only").exists());
}

#[test]
fn test_no_usable_feature_is_no_output() {
    let (_tmp, snap) = setup(r#"{"polarisations": ["HH"]}"#, FakeGpt::default());
    common::add_scene(&snap.paths().input_root, "a", &["vv", "vh"]);
    common::add_scene(&snap.paths().input_root, "b", &["vv"]);

    let err = snap
        .process_collection(&collection(vec![feature("a"), feature("b")]))
        .unwrap_err();
    assert!(matches!(err, SarError::NoOutput));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_engine_failure_aborts_run() {
    let engine = FakeGpt {
        exit_code: 35072,
        ..Default::default()
    };
    let (_tmp, snap) = setup("{}", engine);
    common::add_scene(&snap.paths().input_root, "a", &["vv"]);

    let err = snap
        .process_collection(&collection(vec![feature("a")]))
        .unwrap_err();
    assert!(matches!(err, SarError::EngineFailure { code: 35072 }));
    // 35072 would wrap to a successful status
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_missing_archive() {
    let (_tmp, snap) = setup("{}", FakeGpt::default());
    let err = snap.process_feature(&feature("nowhere")).unwrap_err();
    assert!(matches!(err, SarError::MissingArchive(_)));
}

#[test]
fn test_catalog_round_trip_through_files() {
    let (_tmp, snap) = setup("{}", FakeGpt::default());
    common::add_scene(&snap.paths().input_root, "a", &["vv"]);
    catalog::save_feature_collection(
        snap.paths().input_catalog(),
        &collection(vec![feature("a")]),
    )
    .unwrap();

    let input = catalog::load_feature_collection(snap.paths().input_catalog()).unwrap();
    let output = snap.process_collection(&input).unwrap();
    catalog::save_feature_collection(snap.paths().output_catalog(), &output).unwrap();

    let written = catalog::load_feature_collection(snap.paths().output_catalog()).unwrap();
    assert_eq!(written.features.len(), 1);
    // Extents are only rewritten when clipping
    assert_eq!(written.features[0].bbox, Some(vec![13.3, 38.2, 13.4, 38.3]));
}
