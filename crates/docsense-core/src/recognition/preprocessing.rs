//! Image normalization before text recognition.

use std::io::Cursor;

use image::{imageops, DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::config::PreprocessConfig;
use crate::models::document::RawImage;

/// Smoothing kernel used as the "degenerate" image for sharpness.
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

/// Image preprocessor for the recognition pipeline.
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self::from_config(PreprocessConfig::default())
    }

    /// Create a preprocessor from explicit settings.
    pub fn from_config(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Normalize an encoded image.
    ///
    /// Never fails: any decode or encode error returns the input unchanged.
    pub fn preprocess(&self, image: &RawImage) -> RawImage {
        if !self.config.enabled {
            return image.clone();
        }

        match self.try_preprocess(image) {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Preprocessing failed, using original image: {}", e);
                image.clone()
            }
        }
    }

    fn try_preprocess(&self, image: &RawImage) -> Result<RawImage> {
        let decoded = image::load_from_memory(&image.bytes)?;
        let normalized = self.normalize(&decoded);

        let mut out = Cursor::new(Vec::new());
        normalized.write_to(&mut out, ImageFormat::Png)?;

        Ok(RawImage::new(out.into_inner(), "image/png"))
    }

    /// Resize into the target width band, then adjust contrast, sharpness
    /// and brightness, then apply a mild denoising blur.
    pub fn normalize(&self, image: &DynamicImage) -> DynamicImage {
        let (orig_width, orig_height) = image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return image.clone();
        }

        let (new_width, new_height) = self.calculate_resize_dimensions(orig_width, orig_height);
        debug!(
            "Normalizing image {}x{} -> {}x{}",
            orig_width, orig_height, new_width, new_height
        );

        let resized = if (new_width, new_height) != (orig_width, orig_height) {
            image.resize_exact(new_width, new_height, imageops::FilterType::Lanczos3)
        } else {
            image.clone()
        };

        let rgb = resized.to_rgb8();
        let rgb = adjust_contrast(&rgb, self.config.contrast);
        let rgb = adjust_sharpness(&rgb, self.config.sharpness);
        let rgb = adjust_brightness(&rgb, self.config.brightness);
        let rgb = if self.config.blur_sigma > 0.0 {
            imageops::blur(&rgb, self.config.blur_sigma)
        } else {
            rgb
        };

        DynamicImage::ImageRgb8(rgb)
    }

    fn calculate_resize_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let target = if width < self.config.min_width {
            self.config.min_width
        } else if width > self.config.max_width {
            self.config.max_width
        } else {
            return (width, height);
        };

        let scale = target as f32 / width as f32;
        let new_height = (height as f32 * scale).round() as u32;

        (target.max(1), new_height.max(1))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Blend every pixel with `degenerate`: `degenerate + (pixel - degenerate) * factor`.
fn blend(image: &RgbImage, factor: f32, degenerate: impl Fn(u32, u32, usize) -> f32) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut out = RgbImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let mut channels = [0u8; 3];
        for (c, channel) in channels.iter_mut().enumerate() {
            let base = degenerate(x, y, c);
            *channel = clamp_channel(base + (pixel[c] as f32 - base) * factor);
        }
        out.put_pixel(x, y, Rgb(channels));
    }

    out
}

/// Scale the distance of every channel from the mean luminance.
fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let pixel_count = (image.width() as u64 * image.height() as u64).max(1);
    let luminance_sum: u64 = image
        .pixels()
        .map(|p| (299 * p[0] as u64 + 587 * p[1] as u64 + 114 * p[2] as u64) / 1000)
        .sum();
    let mean = luminance_sum as f32 / pixel_count as f32;

    blend(image, factor, |_, _, _| mean)
}

/// Scale the difference between the image and a smoothed copy.
fn adjust_sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let smoothed: RgbImage = imageops::filter3x3(image, &SMOOTH_KERNEL);
    blend(image, factor, |x, y, c| smoothed.get_pixel(x, y)[c] as f32)
}

/// Scale every channel towards or away from black.
fn adjust_brightness(image: &RgbImage, factor: f32) -> RgbImage {
    blend(image, factor, |_, _, _| 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(image: &RgbImage) -> RawImage {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        RawImage::new(out.into_inner(), "image/png")
    }

    #[test]
    fn test_resize_dimensions() {
        let preprocessor = ImagePreprocessor::new();

        // Inside the band
        assert_eq!(preprocessor.calculate_resize_dimensions(1200, 1600), (1200, 1600));

        // Too narrow: upscale to the minimum width
        assert_eq!(preprocessor.calculate_resize_dimensions(400, 300), (800, 600));

        // Too wide: downscale to the maximum width
        let (w, h) = preprocessor.calculate_resize_dimensions(5000, 2000);
        assert_eq!((w, h), (2500, 1000));
    }

    #[test]
    fn test_small_image_is_upscaled() {
        let preprocessor = ImagePreprocessor::new();
        let input = encode_png(&RgbImage::from_pixel(200, 100, Rgb([128, 128, 128])));

        let output = preprocessor.preprocess(&input);
        let decoded = image::load_from_memory(&output.bytes).unwrap();

        assert_eq!(output.mime_type, "image/png");
        assert_eq!(decoded.dimensions(), (800, 400));
    }

    #[test]
    fn test_invalid_bytes_returned_unchanged() {
        let preprocessor = ImagePreprocessor::new();
        let input = RawImage::new(b"definitely not an image".to_vec(), "image/png");

        let output = preprocessor.preprocess(&input);
        assert_eq!(output.bytes, input.bytes);
    }

    #[test]
    fn test_disabled_is_identity() {
        let config = PreprocessConfig {
            enabled: false,
            ..PreprocessConfig::default()
        };
        let preprocessor = ImagePreprocessor::from_config(config);
        let input = encode_png(&RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));

        assert_eq!(preprocessor.preprocess(&input).bytes, input.bytes);
    }

    #[test]
    fn test_brightness_and_contrast() {
        let image = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let brighter = adjust_brightness(&image, 1.1);
        assert_eq!(brighter.get_pixel(0, 0)[0], 110);

        let mut two_tone = RgbImage::from_pixel(2, 1, Rgb([100, 100, 100]));
        two_tone.put_pixel(1, 0, Rgb([200, 200, 200]));
        let contrasted = adjust_contrast(&two_tone, 1.5);
        assert!(contrasted.get_pixel(0, 0)[0] < 100);
        assert!(contrasted.get_pixel(1, 0)[0] > 200);
    }
}
