pub mod config;
pub mod errors;
pub mod export;
pub mod imageops_ai;
pub mod logging;
pub mod mesh;
pub mod model;
pub mod preprocess;
pub mod remote;
pub mod selector;
pub mod session;
pub mod traits;

pub mod mocks;

pub use config::{Config, Flow, GenerationParams, ModelSpec};
pub use errors::{Hy3dError, Result};
pub use export::{export_mesh, output_file_name};
pub use mesh::Mesh;
pub use model::OnnxBackgroundRemover;
pub use preprocess::{load_image, prepare_image, PreparedImage};
pub use remote::{
    RemoteBackgroundRemover, RemotePipelineFactory, RemoteShapeGenerator, RemoteTextureGenerator,
    Remover,
};
pub use selector::DialogSelector;
pub use session::{run_loop, run_single, Outcome, RunOutcome, Session};
pub use traits::*;
