use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8081";
pub const DEFAULT_TEXTURE_MODEL: &str = "tencent/Hunyuan3D-2";
pub const DEFAULT_SEED: u64 = 12345;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory the file dialog opens in
    #[arg(long, env = "HY3D_INITIAL_DIR")]
    pub initial_dir: Option<PathBuf>,

    /// Base URL of the Hunyuan3D inference service
    #[arg(long, env = "HY3D_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long)]
    pub shape_model: Option<String>,

    #[arg(long)]
    pub shape_subfolder: Option<String>,

    #[arg(long)]
    pub shape_variant: Option<String>,

    #[arg(long, default_value = DEFAULT_TEXTURE_MODEL)]
    pub texture_model: String,
    /// Local ONNX segmentation model; without it the service removes backgrounds
    /// ONNX segmentation model used when an image has no alpha channel
    #[arg(short = 'm', long, env = "HY3D_REMOVER_MODEL")]
    pub remover_model: Option<PathBuf>,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 50, value_parser = check_positive)]
    pub steps: u32,

    #[arg(long, default_value_t = 380, value_parser = check_positive)]
    pub octree_resolution: u32,

    #[arg(long, default_value_t = 20000, value_parser = check_positive)]
    pub num_chunks: u32,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Default for Config {
    /// Every flag at its default, as if the binary had been started without arguments.
    fn default() -> Self {
        Self {
            initial_dir: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            shape_model: None,
            shape_subfolder: None,
            shape_variant: None,
            texture_model: DEFAULT_TEXTURE_MODEL.to_string(),
            remover_model: None,
            device_id: 0,
            output_dir: PathBuf::from("."),
            steps: 50,
            octree_resolution: 380,
            num_chunks: 20000,
            seed: None,
            verbose: 0,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Dialog start directory: explicit flag, then the user's download directory, then cwd.
    pub fn initial_dir(&self) -> PathBuf {
        self.initial_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Shape model to load, with the flow's defaults filling anything not given.
    pub fn shape_model(&self, flow: Flow) -> ModelSpec {
        let default = flow.default_shape_model();
        match &self.shape_model {
            Some(id) => ModelSpec {
                id: id.clone(),
                subfolder: self.shape_subfolder.clone(),
                variant: self.shape_variant.clone(),
            },
            None => ModelSpec {
                id: default.id,
                subfolder: self.shape_subfolder.clone().or(default.subfolder),
                variant: self.shape_variant.clone().or(default.variant),
            },
        }
    }

    pub fn texture_model(&self) -> ModelSpec {
        ModelSpec::new(&self.texture_model)
    }

    pub fn generation_params(&self, flow: Flow) -> GenerationParams {
        GenerationParams {
            num_inference_steps: self.steps,
            octree_resolution: self.octree_resolution,
            num_chunks: self.num_chunks,
            seed: self.seed.or(flow.default_seed()),
            output_type: OUTPUT_TYPE_TRIMESH.to_string(),
        }
    }
}

/// Which of the two driver flows is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Pick one image, generate an untextured mesh with a fixed seed, exit.
    Single,
    /// Load shape and texture pipelines once, then keep picking images until cancelled.
    Loop,
}

impl Flow {
    pub fn default_shape_model(self) -> ModelSpec {
        match self {
            Self::Single => ModelSpec {
                id: "tencent/Hunyuan3D-2mini".to_string(),
                subfolder: Some("hunyuan3d-dit-v2-mini".to_string()),
                variant: Some("fp16".to_string()),
            },
            Self::Loop => ModelSpec::new("tencent/Hunyuan3D-2"),
        }
    }

    // Only the single-image flow is reproducible; the loop flow leaves seeding to the service.
    pub const fn default_seed(self) -> Option<u64> {
        match self {
            Self::Single => Some(DEFAULT_SEED),
            Self::Loop => None,
        }
    }

    pub const fn textured(self) -> bool {
        matches!(self, Self::Loop)
    }
}

/// Pretrained model identifier, optionally narrowed to a subfolder and weight variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: String,
    pub subfolder: Option<String>,
    pub variant: Option<String>,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subfolder: None,
            variant: None,
        }
    }
}

pub const OUTPUT_TYPE_TRIMESH: &str = "trimesh";

/// Fixed hyperparameters handed to the shape pipeline on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub num_inference_steps: u32,
    pub octree_resolution: u32,
    pub num_chunks: u32,
    pub seed: Option<u64>,
    pub output_type: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Config::default().generation_params(Flow::Single)
    }
}

fn check_positive(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .parse()
        .map_err(|e| format!("`{}` is not a valid number: {}", s, e))?;
    if value == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(value)
}
