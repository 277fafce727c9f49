//! Image normalization
//!
//! Turns arbitrary raster bytes into the fixed `[1, 128, 128, 3]` float
//! tensor the classifier consumes.
//!
//! The resampling filter is fixed to Catmull-Rom (bicubic). Changing it
//! shifts confidence scores, so it is not configurable.

use std::io::Cursor;

use image::{
    imageops, imageops::FilterType, ColorType, DynamicImage, ImageReader, Limits, RgbImage,
};

use crate::utils::error::{CropError, Result};

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 128;

/// Number of color channels in the model input
pub const INPUT_CHANNELS: usize = 3;

/// Resampling filter used to reach `INPUT_SIZE`
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Largest accepted width or height of an encoded image.
///
/// Checked against the header before any pixel buffer is allocated.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Normalized image batch in NHWC layout, values in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    /// Tensor shape: `[batch, height, width, channels]`
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

    /// Number of values in the tensor
    pub const LEN: usize = INPUT_SIZE as usize * INPUT_SIZE as usize * INPUT_CHANNELS;

    /// Wrap raw NHWC data; the length must match [`Self::SHAPE`]
    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(CropError::Inference(format!(
                "tensor has {} values, expected {}",
                data.len(),
                Self::LEN
            )));
        }
        Ok(Self { data })
    }

    pub fn shape(&self) -> [usize; 4] {
        Self::SHAPE
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at `(y, x, channel)` of the single batch entry
    pub fn get(&self, y: usize, x: usize, channel: usize) -> Option<f32> {
        let [_, height, width, channels] = Self::SHAPE;
        if y >= height || x >= width || channel >= channels {
            return None;
        }
        self.data.get((y * width + x) * channels + channel).copied()
    }
}

/// Decodes and normalizes input images
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageNormalizer;

impl ImageNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decode raw image bytes and normalize them
    pub fn normalize(&self, raw: &[u8]) -> Result<ImageTensor> {
        let image = decode_image(raw)?;
        self.normalize_image(&image)
    }

    /// Normalize an already decoded image
    pub fn normalize_image(&self, image: &DynamicImage) -> Result<ImageTensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CropError::ImageDecode(format!(
                "image has zero size ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let rgb = to_rgb(image)?;
        let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);

        // Pixels iterate row-major, giving HWC order
        let data: Vec<f32> = resized
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|value| value as f32 / 255.0)
            .collect();

        ImageTensor::from_vec(data)
    }
}

/// Decode bytes of any format `image` can sniff
pub fn decode_image(raw: &[u8]) -> Result<DynamicImage> {
    if raw.is_empty() {
        return Err(CropError::ImageDecode("empty input".to_string()));
    }

    let mut reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|e| CropError::ImageDecode(e.to_string()))?;

    if reader.format().is_none() {
        return Err(CropError::ImageDecode("unrecognized image format".to_string()));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    reader.limits(limits);

    Ok(reader.decode()?)
}

/// Convert to 8-bit RGB, rejecting color types without an RGB mapping
fn to_rgb(image: &DynamicImage) -> Result<RgbImage> {
    match image.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16
        | ColorType::Rgb32F
        | ColorType::Rgba32F => Ok(image.to_rgb8()),
        // ColorType is non-exhaustive; this only catches variants added by later image releases
        other => Err(CropError::UnsupportedMode(format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn assert_valid(tensor: &ImageTensor) {
        assert_eq!(tensor.shape(), [1, 128, 128, 3]);
        assert_eq!(tensor.as_slice().len(), 128 * 128 * 3);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_shape_for_various_resolutions() {
        let normalizer = ImageNormalizer::new();
        for (w, h) in [(1, 1), (37, 500), (128, 128), (640, 480), (1024, 17)] {
            let image = RgbImage::from_fn(w, h, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
            });
            let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);
            let tensor = normalizer.normalize(&bytes).unwrap();
            assert_valid(&tensor);
        }
    }

    #[test]
    fn test_scaling_divides_by_255() {
        let image = RgbImage::from_pixel(64, 64, Rgb([255, 0, 51]));
        let tensor = ImageNormalizer::new()
            .normalize_image(&DynamicImage::ImageRgb8(image))
            .unwrap();

        let eps = 1e-6;
        assert!((tensor.get(10, 20, 0).unwrap() - 1.0).abs() < eps);
        assert!(tensor.get(10, 20, 1).unwrap().abs() < eps);
        assert!((tensor.get(10, 20, 2).unwrap() - 0.2).abs() < eps);
    }

    #[test]
    fn test_nhwc_layout() {
        // Left half red, right half blue
        let image = RgbImage::from_fn(128, 128, |x, _| {
            if x < 64 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let tensor = ImageNormalizer::new()
            .normalize_image(&DynamicImage::ImageRgb8(image))
            .unwrap();

        assert_eq!(tensor.get(5, 0, 0), Some(1.0));
        assert_eq!(tensor.get(5, 0, 2), Some(0.0));
        assert_eq!(tensor.get(5, 127, 0), Some(0.0));
        assert_eq!(tensor.get(5, 127, 2), Some(1.0));
        assert_eq!(tensor.get(128, 0, 0), None);
    }

    #[test]
    fn test_grayscale_and_alpha_convert_to_rgb() {
        let normalizer = ImageNormalizer::new();

        let gray = GrayImage::from_pixel(50, 80, Luma([128]));
        let tensor = normalizer
            .normalize(&encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png))
            .unwrap();
        assert_valid(&tensor);
        let v = tensor.get(0, 0, 0).unwrap();
        assert_eq!(tensor.get(0, 0, 1), Some(v));
        assert_eq!(tensor.get(0, 0, 2), Some(v));

        let rgba = RgbaImage::from_pixel(30, 30, Rgba([10, 20, 30, 0]));
        let tensor = normalizer
            .normalize(&encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png))
            .unwrap();
        assert_valid(&tensor);
    }

    #[test]
    fn test_jpeg_input() {
        let image = RgbImage::from_pixel(200, 150, Rgb([40, 160, 60]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg);
        let tensor = ImageNormalizer::new().normalize(&bytes).unwrap();
        assert_valid(&tensor);
    }

    #[test]
    fn test_undecodable_bytes() {
        let normalizer = ImageNormalizer::new();
        assert!(matches!(
            normalizer.normalize(b"definitely not an image"),
            Err(CropError::ImageDecode(_))
        ));
        assert!(matches!(normalizer.normalize(&[]), Err(CropError::ImageDecode(_))));
    }

    #[test]
    fn test_truncated_png() {
        let image = RgbImage::from_pixel(64, 64, Rgb([1, 2, 3]));
        let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ImageNormalizer::new().normalize(truncated),
            Err(CropError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_oversized_dimensions_rejected_before_decoding() {
        let wide = GrayImage::from_pixel(MAX_IMAGE_DIMENSION + 1, 1, Luma([0]));
        let bytes = encode(DynamicImage::ImageLuma8(wide), ImageFormat::Png);
        assert!(matches!(
            ImageNormalizer::new().normalize(&bytes),
            Err(CropError::ImageDecode(_))
        ));

        let tall = GrayImage::from_pixel(1, MAX_IMAGE_DIMENSION + 1, Luma([0]));
        let bytes = encode(DynamicImage::ImageLuma8(tall), ImageFormat::Png);
        assert!(matches!(decode_image(&bytes), Err(CropError::ImageDecode(_))));
    }

    #[test]
    fn test_high_depth_color_types_convert() {
        let images = [
            DynamicImage::new_luma16(4, 4),
            DynamicImage::new_luma_a16(4, 4),
            DynamicImage::new_rgb16(4, 4),
            DynamicImage::new_rgba16(4, 4),
            DynamicImage::new_rgb32f(4, 4),
            DynamicImage::new_rgba32f(4, 4),
        ];
        for image in &images {
            let rgb = to_rgb(image).unwrap();
            assert_eq!(rgb.dimensions(), (4, 4));
        }
    }

    #[test]
    fn test_tensor_length_checked() {
        assert!(ImageTensor::from_vec(vec![0.0; 10]).is_err());
        assert!(ImageTensor::from_vec(vec![0.0; ImageTensor::LEN]).is_ok());
    }
}
