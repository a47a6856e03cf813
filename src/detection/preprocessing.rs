use std::path::Path;

use anyhow::Context;
use image::{ImageReader, RgbImage, imageops::FilterType};
use rten_tensor::NdTensor;

/// Decode an image file into 8-bit RGB
pub fn load_rgb(path: &Path) -> anyhow::Result<RgbImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open image {:?}", path))?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    Ok(img.to_rgb8())
}

/// Resize to the square model input
pub fn resize_for_model(rgb: &RgbImage, input_size: u32) -> RgbImage {
    image::imageops::resize(rgb, input_size, input_size, FilterType::Triangle)
}

/// Pack RGB pixels into a `[1, 3, H, W]` tensor scaled to `[0, 1]`
pub fn to_nchw_tensor(rgb: &RgbImage) -> NdTensor<f32, 4> {
    let (width, height) = rgb.dimensions();
    let mut input = NdTensor::zeros([1, 3, height as usize, width as usize]);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    input
}
