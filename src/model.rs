use std::path::Path;

use crate::{
    errors::{Hy3dError, Result},
    imageops_ai::{mask::replace_alpha, padding},
    traits::BackgroundRemover,
};
use image::{imageops, imageops::FilterType, DynamicImage, ImageBuffer, Luma, Rgb, RgbImage, RgbaImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;

pub const DEFAULT_INPUT_NAME: &str = "img";
pub const DEFAULT_OUTPUT_NAME: &str = "mask";

/// Salient-object segmentation model run through ONNX Runtime.
///
/// The model takes a square `1x3xSxS` RGB tensor in `[0, 1]` and returns a `1x1xSxS`
/// foreground mask, which becomes the alpha channel of the output.
pub struct OnnxBackgroundRemover {
    pub image_size: u32,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

fn model_error(operation: impl Into<String>, err: impl std::fmt::Display) -> Hy3dError {
    Hy3dError::Model {
        operation: operation.into(),
        source: Box::new(std::io::Error::other(err.to_string())),
    }
}

impl OnnxBackgroundRemover {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        Self::with_io_names(model_path, device_id, DEFAULT_INPUT_NAME, DEFAULT_OUTPUT_NAME)
    }

    pub fn with_io_names(
        model_path: &Path,
        device_id: i32,
        input_name: &str,
        output_name: &str,
    ) -> Result<Self> {
        if !model_path.exists() {
            return Err(Hy3dError::FileSystem {
                path: model_path.to_path_buf(),
                operation: "background removal model lookup".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "model file does not exist",
                ),
            });
        }

        // TensorRT, then CUDA; ort falls back to CPU when neither registers
        let mut session = SessionBuilder::new()
            .map_err(|e| model_error("session builder init", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| model_error("execution provider setup", e))?
            .with_memory_pattern(true)
            .map_err(|e| model_error("memory pattern setup", e))?
            .commit_from_file(model_path)
            .map_err(|e| model_error(format!("model load: {}", model_path.display()), e))?;

        let image_size = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .and_then(|shape| shape.get(2).copied())
            .filter(|&side| side > 0)
            .ok_or_else(|| model_error("input shape lookup", "model input has no fixed spatial size"))?
            as u32;

        tracing::debug!(
            model = %model_path.display(),
            image_size,
            "background removal model loaded"
        );

        // warm up
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        session
            .run(ort::inputs![input_name => TensorRef::from_array_view(&data)?])
            .map_err(|e| model_error("warm-up run", e))?;

        Ok(Self {
            image_size,
            input_name: input_name.to_string(),
            output_name: output_name.to_string(),
            session: Mutex::new(session),
        })
    }

    pub fn predict(&self, tensor: &Array4<f32>) -> Result<Array4<f32>> {
        let mut session = self.session.lock();
        let outputs = session.run(
            ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(tensor)?],
        )?;
        Ok(outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .to_owned())
    }
}

impl BackgroundRemover for OnnxBackgroundRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
        let (tensor, crop) = preprocess(&rgb, self.image_size);
        let mask = self.predict(&tensor)?;

        let mask = postprocess_mask(&mask, self.image_size, crop, image.width(), image.height())?;

        let mut output = image.clone();
        replace_alpha(&mut output, &mask).map_err(|e| Hy3dError::ImageProcessing {
            path: "in-memory".to_string(),
            operation: "alpha mask application".to_string(),
            source: e.into(),
        })?;
        Ok(output)
    }
}

/// Longer edge scaled to `image_size`, shorter edge proportionally, never below one pixel.
pub fn fit_within(width: u32, height: u32, image_size: u32) -> (u32, u32) {
    let scale = |edge: u32, longest: u32| {
        ((f64::from(edge) * f64::from(image_size) / f64::from(longest)).round() as u32).max(1)
    };
    if width >= height {
        (image_size, scale(height, width))
    } else {
        (scale(width, height), image_size)
    }
}

/// Resize, pad to a square and lay out as `1x3xSxS`. Returns the tensor and the
/// `[x, y, w, h]` rectangle the image occupies inside the square.
pub fn preprocess(image: &RgbImage, image_size: u32) -> (Array4<f32>, [u32; 4]) {
    let (w, h) = fit_within(image.width(), image.height(), image_size);
    let resized = imageops::resize(image, w, h, FilterType::Lanczos3);
    let (padded, (x, y)) = padding::square(&resized, Rgb([0, 0, 0]));

    let tensor = padded
        .as_ndarray3()
        .mapv(|v| f32::from(v) / 255.0)
        .insert_axis(Axis(0));

    (tensor, [x, y, w, h])
}

pub fn postprocess_mask(
    mask: &Array4<f32>,
    image_size: u32,
    crop: [u32; 4],
    width: u32,
    height: u32,
) -> Result<ImageBuffer<Luma<f32>, Vec<f32>>> {
    let &[_, _, mask_height, mask_width] = mask.shape() else {
        return Err(model_error("mask shape check", "mask is not four-dimensional"));
    };
    let raw = mask
        .slice(s![0, 0, .., ..])
        .as_standard_layout()
        .iter()
        .copied()
        .collect::<Vec<f32>>();
    let mask: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(mask_width as u32, mask_height as u32, raw)
            .ok_or_else(|| model_error("mask buffer creation", "mask data does not fit its shape"))?;

    let mask = if mask.dimensions() == (image_size, image_size) {
        mask
    } else {
        imageops::resize(&mask, image_size, image_size, FilterType::Triangle)
    };

    let [x, y, w, h] = crop;
    let mask = imageops::crop_imm(&mask, x, y, w, h).to_image();
    Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
}
