use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the image-to-mesh pipeline.
///
/// Each variant carries the context of its failure domain (filesystem, image decoding,
/// background removal model, remote inference service, mesh container) so callers never
/// have to parse error strings. Nothing in this crate retries: every error ends the run.
#[derive(Error, Debug)]
pub enum Hy3dError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Pipeline error: {operation} failed: {message}")]
    Pipeline { operation: String, message: String },

    #[error("Invalid mesh: {reason}")]
    InvalidMesh { reason: String },
}

pub type Result<T> = std::result::Result<T, Hy3dError>;

impl Hy3dError {
    pub fn pipeline(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_mesh(reason: impl Into<String>) -> Self {
        Self::InvalidMesh {
            reason: reason.into(),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Fallback for errors raised without a known path. Callers that know the path and
/// operation construct `Hy3dError::FileSystem` directly.
impl From<std::io::Error> for Hy3dError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for Hy3dError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for Hy3dError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors only happen while building or reading tensors, so they count as
/// model errors.
impl From<ndarray::ShapeError> for Hy3dError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<reqwest::Error> for Hy3dError {
    fn from(err: reqwest::Error) -> Self {
        let operation = err
            .url()
            .map_or_else(|| "http request".to_string(), |url| format!("request to {url}"));
        Self::Pipeline {
            operation,
            message: err.to_string(),
        }
    }
}
