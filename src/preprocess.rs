use crate::errors::{Hy3dError, Result};
use crate::traits::BackgroundRemover;
use image::{ColorType, DynamicImage, RgbaImage};
use std::path::Path;

/// RGBA image ready for the generation pipelines.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub image: RgbaImage,
    pub background_removed: bool,
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| Hy3dError::ImageProcessing {
        path: path.display().to_string(),
        operation: "image load".to_string(),
        source: Box::new(e),
    })
}

/// Only images decoded with exactly three colour channels lack a usable background signal.
pub fn needs_background_removal(color: ColorType) -> bool {
    color.channel_count() == 3
}

/// Convert to RGBA and, if the decoded image was plain RGB, strip its background.
///
/// The decision is made on the native colour type, before conversion.
pub fn prepare_image(
    image: DynamicImage,
    remover: Option<&dyn BackgroundRemover>,
) -> Result<PreparedImage> {
    let native = image.color();
    let rgba = image.into_rgba8();

    if !needs_background_removal(native) {
        tracing::debug!(?native, "image already carries alpha, background kept");
        return Ok(PreparedImage {
            image: rgba,
            background_removed: false,
        });
    }

    let remover = remover.ok_or_else(|| Hy3dError::Configuration {
        message: "image has no alpha channel but no background remover is configured".to_string(),
    })?;
    tracing::info!(?native, "removing background");
    let image = remover.remove_background(&rgba)?;

    Ok(PreparedImage {
        image,
        background_removed: true,
    })
}
