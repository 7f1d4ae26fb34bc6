//! Grayscale image intake: validation, decoding, and model-input conversion.

use std::io::Cursor;

use burn::prelude::*;
use burn::tensor::TensorData;
use image::imageops::FilterType;
use image::{GrayImage, ImageFormat, Rgb, RgbImage};

use crate::error::{CoreError, Result, ValidationError};

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_BYTES: usize = 20 * 1024 * 1024;

/// Formats accepted by [`ImageValidator::default`].
pub const DEFAULT_FORMATS: [ImageFormat; 6] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Single-channel 8-bit image, shape (height, width).
///
/// Immutable once built; owned by one request for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayscaleImage {
    inner: GrayImage,
}

impl GrayscaleImage {
    /// Wrap an already-decoded luma buffer.
    #[must_use]
    pub fn new(inner: GrayImage) -> Self {
        Self { inner }
    }

    /// Build from a row-major pixel buffer.
    ///
    /// # Errors
    ///
    /// Fails if `pixels.len() != width * height`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        let got = pixels.len();
        GrayImage::from_raw(width, height, pixels)
            .map(Self::new)
            .ok_or(CoreError::InvalidBuffer {
                width,
                height,
                expected,
                got,
            })
    }

    /// Image filled with one intensity.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(GrayImage::from_pixel(width, height, image::Luma([value])))
    }

    /// Pixel width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    /// Pixel height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// `(width, height)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Intensity at `(x, y)`.
    #[must_use]
    pub fn intensity(&self, x: u32, y: u32) -> u8 {
        self.inner.get_pixel(x, y)[0]
    }

    /// Underlying luma buffer.
    #[must_use]
    pub fn as_luma(&self) -> &GrayImage {
        &self.inner
    }

    /// Replicate the single channel into RGB.
    #[must_use]
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let v = self.intensity(x, y);
            Rgb([v, v, v])
        })
    }

    /// Convert to a normalized model input of shape `[1, 1, size, size]`.
    ///
    /// The image is resized with bilinear filtering, scaled to `[0, 1]` and
    /// normalized with mean 0.5 and std 0.5, giving values in `[-1, 1]`.
    pub fn to_model_input<B: Backend>(&self, size: usize, device: &B::Device) -> Tensor<B, 4> {
        let side = size as u32;
        let resized = image::imageops::resize(&self.inner, side, side, FilterType::Triangle);
        let values: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|p| (f32::from(p) / 255.0 - 0.5) / 0.5)
            .collect();
        let data = TensorData::new(values, [1, 1, size, size]);
        Tensor::from_data(data.convert::<B::FloatElem>(), device)
    }
}

impl From<GrayImage> for GrayscaleImage {
    fn from(inner: GrayImage) -> Self {
        Self::new(inner)
    }
}

/// Rejects uploads that are empty, oversized, or not an accepted image format.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_bytes: usize,
    formats: Vec<ImageFormat>,
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            formats: DEFAULT_FORMATS.to_vec(),
        }
    }
}

impl ImageValidator {
    /// Create a validator with a custom size limit and the default formats.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Default::default()
        }
    }

    /// Restrict accepted formats.
    #[must_use]
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = ImageFormat>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }

    /// Upload size limit in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate raw upload bytes and decode them to grayscale.
    ///
    /// The format is sniffed from the content, never from a file name.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing why the upload was rejected.
    pub fn validate(&self, bytes: &[u8]) -> std::result::Result<GrayscaleImage, ValidationError> {
        if bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let format = image::guess_format(bytes).map_err(|_| ValidationError::UnknownFormat)?;
        if !self.formats.contains(&format) {
            return Err(ValidationError::UnsupportedFormat(
                format.to_mime_type().to_string(),
            ));
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ValidationError::Decode(e.to_string()))?;
        tracing::debug!(
            format = format.to_mime_type(),
            width = decoded.width(),
            height = decoded.height(),
            "decoded upload"
        );
        Ok(GrayscaleImage::new(decoded.into_luma8()))
    }
}

/// Encode an RGB image as PNG bytes.
///
/// # Errors
///
/// Returns [`CoreError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CoreError::Encode(e.to_string()))?;
    Ok(buf)
}
