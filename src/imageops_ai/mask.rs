use anyhow::{ensure, Result};
use image::{GenericImageView, ImageBuffer, Luma, Primitive, Rgba};
use num_traits::AsPrimitive;

use crate::imageops_ai::get_max_value;

/// Overwrite the alpha channel of `image` with `mask`, rescaled to the image's subpixel range.
///
/// Mask values outside the full-scale range are clamped.
pub fn replace_alpha<M, SI, SM>(image: &mut ImageBuffer<Rgba<SI>, Vec<SI>>, mask: &M) -> Result<()>
where
    M: GenericImageView<Pixel = Luma<SM>>,
    Rgba<SI>: image::Pixel<Subpixel = SI>,
    SI: Primitive + AsPrimitive<f32> + 'static,
    SM: Primitive + AsPrimitive<f32> + 'static,
    f32: AsPrimitive<SI>,
{
    ensure!(
        image.dimensions() == mask.dimensions(),
        "Image and mask dimensions do not match: image {:?}, mask {:?}",
        image.dimensions(),
        mask.dimensions()
    );

    let si_max: f32 = get_max_value::<SI>().as_();
    let sm_max: f32 = get_max_value::<SM>().as_();

    for (x, y, Luma([value])) in mask.pixels() {
        let alpha = (value.as_() / sm_max).clamp(0.0, 1.0) * si_max;
        image.get_pixel_mut(x, y).0[3] = alpha.round().as_();
    }
    Ok(())
}
