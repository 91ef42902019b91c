use crate::config::{Config, Flow, GenerationParams};
use crate::errors::Result;
use crate::export::export_mesh;
use crate::mesh::Mesh;
use crate::preprocess::{load_image, needs_background_removal, prepare_image};
use crate::traits::{FileSelector, PipelineFactory, Selection, ShapeGenerator, TextureGenerator};
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Result of turning one image into an exported mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Wall time of shape generation plus texture painting.
    pub elapsed: Duration,
    pub background_removed: bool,
    pub textured: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Cancelled,
    Processed(Outcome),
}

/// Owns the constructed pipelines for the lifetime of a run.
///
/// Shape (and, for the loop flow, texture) pipelines are built once in [`Session::start`]
/// and reused for every image. The background remover is only built the first time an
/// image without alpha shows up.
pub struct Session<F: PipelineFactory> {
    factory: F,
    flow: Flow,
    params: GenerationParams,
    output_dir: PathBuf,
    remover: Option<F::Remover>,
    shape: F::Shape,
    texture: Option<F::Texture>,
    processed: usize,
}

impl<F: PipelineFactory> Session<F> {
    pub fn start(factory: F, config: &Config, flow: Flow) -> Result<Self> {
        let shape = factory.shape_generator()?;
        let texture = if flow.textured() {
            Some(factory.texture_generator()?)
        } else {
            None
        };
        tracing::debug!(?flow, "session started");

        Ok(Self {
            factory,
            flow,
            params: config.generation_params(flow),
            output_dir: config.output_dir.clone(),
            remover: None,
            shape,
            texture,
            processed: 0,
        })
    }

    pub const fn flow(&self) -> Flow {
        self.flow
    }

    pub const fn processed(&self) -> usize {
        self.processed
    }

    fn remover(&mut self) -> Result<&F::Remover> {
        let remover = match self.remover.take() {
            Some(remover) => remover,
            None => self.factory.background_remover()?,
        };
        Ok(self.remover.insert(remover))
    }

    /// Preprocess, generate, optionally texture, then export a single image.
    pub fn process(&mut self, input: &Path) -> Result<Outcome> {
        let image = load_image(input)?;
        let prepared = if needs_background_removal(image.color()) {
            let remover = self.remover()?;
            prepare_image(image, Some(remover))?
        } else {
            prepare_image(image, None)?
        };

        let spinner = spinner("generating shape");
        let start = Instant::now();

        let mesh = with_spinner(&spinner, || {
            let mesh = self.generate_shape(&prepared.image)?;
            match &self.texture {
                Some(texture) => {
                    spinner.set_message("painting texture");
                    texture.paint(mesh, &prepared.image)
                }
                None => Ok(mesh),
            }
        })?;

        let elapsed = start.elapsed();
        println!("--- {} seconds ---", elapsed.as_secs_f64());
        tracing::info!(elapsed_secs = elapsed.as_secs_f64(), "generation finished");

        let textured = mesh.is_textured();
        let output = export_mesh(mesh, input, &self.output_dir)?;
        self.processed += 1;

        Ok(Outcome {
            input: input.to_path_buf(),
            output,
            elapsed,
            background_removed: prepared.background_removed,
            textured,
        })
    }

    fn generate_shape(&self, image: &image::RgbaImage) -> Result<Mesh> {
        tracing::debug!(params = ?self.params, "shape generation started");
        let mesh = self.shape.generate(image, &self.params)?;
        tracing::debug!(bytes = mesh.as_bytes().len(), "shape generation returned");
        Ok(mesh)
    }

    /// Keep asking for images until the selector is cancelled.
    pub fn run<S: FileSelector>(&mut self, selector: &mut S) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        while let Selection::Chosen(input) = selector.select()? {
            outcomes.push(self.process(&input)?);
        }
        tracing::info!(processed = outcomes.len(), "selection cancelled");
        Ok(outcomes)
    }

    /// Release the pipelines.
    pub fn close(self) {
        tracing::debug!(processed = self.processed, "session closed");
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner().with_finish(ProgressFinish::AndClear);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Run `work` while the spinner ticks, clearing it whether or not `work` succeeds.
fn with_spinner<T>(spinner: &ProgressBar, work: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = work();
    spinner.finish_and_clear();
    result
}

/// One image, untextured. Nothing is constructed if the selection is cancelled.
pub fn run_single<F, S>(factory: F, selector: &mut S, config: &Config) -> Result<RunOutcome>
where
    F: PipelineFactory,
    S: FileSelector,
{
    let input = match selector.select()? {
        Selection::Chosen(input) => input,
        Selection::Cancelled => return Ok(RunOutcome::Cancelled),
    };

    let mut session = Session::start(factory, config, Flow::Single)?;
    let outcome = session.process(&input)?;
    session.close();
    Ok(RunOutcome::Processed(outcome))
}

/// Pipelines loaded once up front, then select → process until cancelled.
pub fn run_loop<F, S>(factory: F, selector: &mut S, config: &Config) -> Result<Vec<Outcome>>
where
    F: PipelineFactory,
    S: FileSelector,
{
    let mut session = Session::start(factory, config, Flow::Loop)?;
    let outcomes = session.run(selector)?;
    session.close();
    Ok(outcomes)
}
