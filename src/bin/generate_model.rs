//! Pick one image and turn it into an untextured, reproducible mesh.

use anyhow::{Context, Result};
use hy3d_gen::{
    logging::init_tracing, run_single, Config, DialogSelector, Flow, RemotePipelineFactory,
    RunOutcome,
};

fn main() -> Result<()> {
    let config = Config::new();
    init_tracing(config.verbose)?;

    let factory = RemotePipelineFactory::new(&config, Flow::Single);
    let mut selector = DialogSelector::new(config.initial_dir());

    match run_single(factory, &mut selector, &config).context("mesh generation failed")? {
        RunOutcome::Cancelled => println!("No file selected"),
        RunOutcome::Processed(outcome) => {
            println!("{}", outcome.output.display());
        }
    }
    Ok(())
}
