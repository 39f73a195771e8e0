//! Image Preprocessing Module
//!
//! Decodes an encoded source image and produces the fixed-size normalized
//! tensor the rest of the pipeline operates on. Resizing stretches to the
//! target dimensions (no cropping), matching the training-time preprocessing
//! of the upstream model.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use tracing::debug;

use crate::error::{Error, Result};

/// Tensor width in pixels
pub const TENSOR_WIDTH: usize = 224;
/// Tensor height in pixels
pub const TENSOR_HEIGHT: usize = 224;
/// Number of color channels
pub const TENSOR_CHANNELS: usize = 3;

/// A fixed-shape 224x224x3 image tensor with channel values in [0, 1].
///
/// Stored as a flat HWC vector. Owned by the classification call that
/// created it and dropped once the pipeline finishes; nothing caches it.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    /// Wraps a raw HWC buffer. The buffer length must match the fixed shape.
    pub fn from_raw(data: Vec<f32>) -> Result<Self> {
        let expected = TENSOR_WIDTH * TENSOR_HEIGHT * TENSOR_CHANNELS;
        if data.len() != expected {
            return Err(Error::Config(format!(
                "tensor buffer has {} values, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(Self { data })
    }

    /// Builds a tensor filled with a single RGB color. Test and fixture helper.
    pub fn solid(r: f32, g: f32, b: f32) -> Self {
        let mut data = Vec::with_capacity(TENSOR_WIDTH * TENSOR_HEIGHT * TENSOR_CHANNELS);
        for _ in 0..TENSOR_WIDTH * TENSOR_HEIGHT {
            data.push(r);
            data.push(g);
            data.push(b);
        }
        Self { data }
    }

    /// Channel value at (x, y, c), with c in 0..3 for R/G/B
    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[(y * TENSOR_WIDTH + x) * TENSOR_CHANNELS + c]
    }

    /// Mutable channel value accessor, used by fixture builders
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, c: usize, value: f32) {
        self.data[(y * TENSOR_WIDTH + x) * TENSOR_CHANNELS + c] = value;
    }

    /// Flat HWC view of the tensor data
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Total number of pixels (width * height)
    pub fn pixel_count(&self) -> usize {
        TENSOR_WIDTH * TENSOR_HEIGHT
    }
}

/// Decodes and normalizes source images into [`ImageTensor`]s.
#[derive(Debug, Default, Clone)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Creates a new preprocessor
    pub fn new() -> Self {
        Self
    }

    /// Decodes an encoded image (PNG/JPEG/BMP/GIF) and preprocesses it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageDecode`] if the bytes cannot be decoded or the
    /// decoded image has zero width or height.
    pub fn decode(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let img = image::load_from_memory(bytes)?;
        self.from_image(&img)
    }

    /// Preprocesses an already-decoded image.
    pub fn from_image(&self, img: &DynamicImage) -> Result<ImageTensor> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::ImageDecode(format!(
                "image has zero dimensions ({}x{})",
                width, height
            )));
        }
        debug!(width, height, "preprocessing source image");

        // Stretch to the fixed shape; triangle filtering matches the
        // bilinear resize used when the model was trained.
        let rgb = img.to_rgb8();
        let resized = image::imageops::resize(
            &rgb,
            TENSOR_WIDTH as u32,
            TENSOR_HEIGHT as u32,
            FilterType::Triangle,
        );

        let mut data = Vec::with_capacity(TENSOR_WIDTH * TENSOR_HEIGHT * TENSOR_CHANNELS);
        for pixel in resized.pixels() {
            data.push(pixel[0] as f32 / 255.0);
            data.push(pixel[1] as f32 / 255.0);
            data.push(pixel[2] as f32 / 255.0);
        }

        ImageTensor::from_raw(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid_image(w: u32, h: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb(rgb)))
    }

    #[test]
    fn test_from_image_resizes_to_fixed_shape() {
        let preprocessor = ImagePreprocessor::new();
        let tensor = preprocessor.from_image(&solid_image(10, 10, [255, 0, 0])).unwrap();
        assert_eq!(tensor.as_slice().len(), 224 * 224 * 3);
    }

    #[test]
    fn test_channel_values_are_normalized() {
        let preprocessor = ImagePreprocessor::new();
        let tensor = preprocessor
            .from_image(&solid_image(50, 80, [255, 128, 0]))
            .unwrap();

        assert!((tensor.get(100, 100, 0) - 1.0).abs() < 1e-6);
        assert!((tensor.get(100, 100, 1) - 128.0 / 255.0).abs() < 1e-6);
        assert!(tensor.get(100, 100, 2).abs() < 1e-6);
        assert!(tensor.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_decode_rejects_garbage_bytes() {
        let preprocessor = ImagePreprocessor::new();
        let result = preprocessor.decode(&[0u8, 1, 2, 3, 4]);
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn test_decode_roundtrip_png() {
        let img = solid_image(32, 32, [10, 200, 30]);
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .unwrap();

        let preprocessor = ImagePreprocessor::new();
        let tensor = preprocessor.decode(&bytes).unwrap();
        assert!((tensor.get(0, 0, 1) - 200.0 / 255.0).abs() < 0.01);
    }

    #[test]
    fn test_from_raw_validates_length() {
        assert!(ImageTensor::from_raw(vec![0.0; 7]).is_err());
        assert!(ImageTensor::from_raw(vec![0.0; 224 * 224 * 3]).is_ok());
    }
}
