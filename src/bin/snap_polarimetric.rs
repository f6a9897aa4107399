//! Block entry point: process `/tmp/input/data.json` into `/tmp/output`

use anyhow::Context;
use snap_polarimetric::config::workers_from_env;
use snap_polarimetric::io::catalog;
use snap_polarimetric::{ProcessingConfig, RunPaths, SarError, SnapPolarimetry};

fn run() -> anyhow::Result<()> {
    let config = ProcessingConfig::from_env().context("Invalid task parameters")?;
    let paths = RunPaths::from_env();
    paths.ensure_directories()?;

    let input = catalog::load_feature_collection(paths.input_catalog())
        .with_context(|| format!("Could not read {}", paths.input_catalog().display()))?;
    log::info!("Processing {} input features", input.features.len());

    let workers = workers_from_env()?;
    let output_catalog = paths.output_catalog();
    let pipeline = SnapPolarimetry::new(config, paths)?;
    let output = pipeline.run(&input, workers)?;

    catalog::save_feature_collection(&output_catalog, &output)?;
    log::info!(
        "Wrote {} features to {}",
        output.features.len(),
        output_catalog.display()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        let code = e
            .downcast_ref::<SarError>()
            .map(SarError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
