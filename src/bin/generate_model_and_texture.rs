//! Load shape and texture pipelines once, then keep turning picked images into
//! textured meshes until the dialog is cancelled.

use anyhow::{Context, Result};
use hy3d_gen::{logging::init_tracing, run_loop, Config, DialogSelector, Flow, RemotePipelineFactory};

fn main() -> Result<()> {
    let config = Config::new();
    init_tracing(config.verbose)?;

    let factory = RemotePipelineFactory::new(&config, Flow::Loop);
    let mut selector = DialogSelector::new(config.initial_dir());

    let outcomes = run_loop(factory, &mut selector, &config).context("mesh generation failed")?;
    println!("No file selected");
    tracing::info!(meshes = outcomes.len(), "done");
    Ok(())
}
