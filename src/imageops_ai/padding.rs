use image::{imageops, GenericImageView, ImageBuffer, Pixel, Primitive};

/// Offset that centres a `width`x`height` image on a `pad_width`x`pad_height` canvas.
pub fn center_offset(width: u32, height: u32, pad_width: u32, pad_height: u32) -> Option<(u32, u32)> {
    if width > pad_width || height > pad_height {
        return None;
    }
    Some(((pad_width - width) / 2, (pad_height - height) / 2))
}

pub fn padding<I, P, S>(
    image: &I,
    pad_width: u32,
    pad_height: u32,
    color: P,
) -> Option<(ImageBuffer<P, Vec<S>>, (u32, u32))>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S>,
    S: Primitive,
{
    let (width, height) = image.dimensions();

    center_offset(width, height, pad_width, pad_height).map(|(x, y)| {
        let mut canvas = ImageBuffer::from_pixel(pad_width, pad_height, color);
        imageops::overlay(&mut canvas, image, i64::from(x), i64::from(y));
        (canvas, (x, y))
    })
}

/// Pad to a square whose side is the longer edge, image centred.
pub fn square<I, P, S>(image: &I, color: P) -> (ImageBuffer<P, Vec<S>>, (u32, u32))
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S>,
    S: Primitive,
{
    let (width, height) = image.dimensions();
    let side = width.max(height);

    // side >= both edges, so the offset always exists
    padding(image, side, side, color).unwrap_or_else(|| {
        let mut canvas = ImageBuffer::from_pixel(side, side, color);
        imageops::overlay(&mut canvas, image, 0, 0);
        (canvas, (0, 0))
    })
}
