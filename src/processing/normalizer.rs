use crate::utils::VerifyError;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::contrast::threshold;
use imageproc::map::map_colors;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Linear contrast gain applied before thresholding.
    pub contrast_gain: f32,
    pub contrast_offset: f32,
    /// Side of the square neighbourhood used for the adaptive mean. Must be odd.
    pub block_size: u32,
    /// Subtracted from the neighbourhood mean to get the local threshold.
    pub threshold_bias: i32,
    /// Rasters narrower than this are upscaled to it.
    pub min_width: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            contrast_gain: 1.8,
            contrast_offset: 10.0,
            block_size: 31,
            threshold_bias: 12,
            min_width: 1300,
        }
    }
}

/// Binarized single-channel raster ready for OCR. Pixels are always 0 or 255.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRaster {
    image: GrayImage,
}

impl NormalizedRaster {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn to_png(&self) -> Result<Vec<u8>, VerifyError> {
        let mut buffer = Vec::new();
        DynamicImage::ImageLuma8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| {
                VerifyError::ImageProcessingError(format!("Failed to encode raster: {}", e))
            })?;
        Ok(buffer)
    }
}

/// ImageNormalizer prepares card photos for character recognition.
pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl ImageNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        ImageNormalizer { config }
    }

    /// Decode an uploaded payload and normalize it.
    pub fn normalize(&self, image_bytes: &[u8]) -> Result<NormalizedRaster, VerifyError> {
        if image_bytes.is_empty() {
            return Err(VerifyError::UnprocessableImage(
                "empty image payload".to_string(),
            ));
        }

        let image = image::load_from_memory(image_bytes).map_err(|e| {
            VerifyError::UnprocessableImage(format!("Failed to decode image: {}", e))
        })?;

        Ok(self.normalize_image(&image))
    }

    pub fn normalize_image(&self, image: &DynamicImage) -> NormalizedRaster {
        let gray = image.to_luma8();
        debug!("Normalizing {}x{} image", gray.width(), gray.height());

        let stretched = self.stretch_contrast(&gray);
        let binary = self.adaptive_threshold(&stretched);
        let closed = close_2x2(&binary);

        NormalizedRaster {
            image: self.upscale(closed),
        }
    }

    fn stretch_contrast(&self, gray: &GrayImage) -> GrayImage {
        let gain = self.config.contrast_gain;
        let offset = self.config.contrast_offset;
        map_colors(gray, |pixel: Luma<u8>| {
            let value = (gain * pixel[0] as f32 + offset).abs().round();
            Luma([value.min(255.0) as u8])
        })
    }

    /// Mean-C adaptive threshold. The window is truncated at the image border.
    fn adaptive_threshold(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let radius = self.config.block_size / 2;
        let bias = self.config.threshold_bias as f64;

        // Summed-area table with a zero row and column in front.
        let stride = width as usize + 1;
        let mut integral = vec![0u64; stride * (height as usize + 1)];
        for y in 0..height as usize {
            let mut row_sum = 0u64;
            for x in 0..width as usize {
                row_sum += gray.get_pixel(x as u32, y as u32)[0] as u64;
                integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
            }
        }

        GrayImage::from_fn(width, height, |x, y| {
            let x0 = x.saturating_sub(radius) as usize;
            let y0 = y.saturating_sub(radius) as usize;
            let x1 = (x + radius).min(width - 1) as usize + 1;
            let y1 = (y + radius).min(height - 1) as usize + 1;

            let sum = (integral[y1 * stride + x1] + integral[y0 * stride + x0])
                - (integral[y0 * stride + x1] + integral[y1 * stride + x0]);
            let count = ((x1 - x0) * (y1 - y0)) as f64;
            let local_threshold = sum as f64 / count - bias;

            if gray.get_pixel(x, y)[0] as f64 > local_threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    fn upscale(&self, image: GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        if width == 0 || width >= self.config.min_width {
            return image;
        }

        let scale = self.config.min_width as f64 / width as f64;
        let new_height = ((height as f64 * scale).round() as u32).max(1);
        debug!(
            "Upscaling raster from {}x{} to {}x{}",
            width, height, self.config.min_width, new_height
        );

        let resized = imageops::resize(&image, self.config.min_width, new_height, FilterType::CatmullRom);
        // Cubic interpolation leaves grey edges; snap them back to two levels.
        threshold(&resized, 127)
    }
}

/// Morphological closing with a 2x2 square: dilate towards the top-left, erode back.
fn close_2x2(image: &GrayImage) -> GrayImage {
    let dilated = morph_2x2(image, -1, u8::max);
    morph_2x2(&dilated, 1, u8::min)
}

fn morph_2x2(image: &GrayImage, step: i64, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let clamp = |value: i64, limit: u32| value.clamp(0, limit as i64 - 1) as u32;

    GrayImage::from_fn(width, height, |x, y| {
        let nx = clamp(x as i64 + step, width);
        let ny = clamp(y as i64 + step, height);
        let value = [(nx, y), (x, ny), (nx, ny)]
            .iter()
            .fold(image.get_pixel(x, y)[0], |acc, &(px, py)| {
                pick(acc, image.get_pixel(px, py)[0])
            });
        Luma([value])
    })
}
