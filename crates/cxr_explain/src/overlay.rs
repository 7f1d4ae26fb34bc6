//! False-color overlay of a heatmap onto a grayscale image.

use cxr_core::GrayscaleImage;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, Result};
use crate::heatmap::Heatmap;

/// Default heatmap opacity.
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Maps intensity in [0, 1] to an RGB color.
///
/// Intensity is quantized to 8 bits (truncating) before lookup, so every
/// map is a 256-entry table and rendering is byte-deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMap {
    /// Dark blue through cyan and yellow to dark red.
    #[default]
    Jet,
    /// Intensity replicated on all channels.
    Gray,
}

impl ColorMap {
    /// Color for an 8-bit level.
    #[must_use]
    pub fn level(self, level: u8) -> Rgb<u8> {
        match self {
            Self::Jet => {
                let v = f32::from(level) / 255.0;
                // Each channel is a tent of height 1.5 clipped to [0, 1].
                let channel = |center: f32| {
                    let c = (1.5 - (4.0 * v - center).abs()).clamp(0.0, 1.0);
                    (c * 255.0).round() as u8
                };
                Rgb([channel(3.0), channel(2.0), channel(1.0)])
            }
            Self::Gray => Rgb([level, level, level]),
        }
    }

    /// Color for an intensity in [0, 1].
    #[must_use]
    pub fn color(self, intensity: f32) -> Rgb<u8> {
        self.level(quantize(intensity))
    }

    /// Full lookup table.
    #[must_use]
    pub fn lut(self) -> Vec<Rgb<u8>> {
        (0..=255u8).map(|l| self.level(l)).collect()
    }
}

fn quantize(intensity: f32) -> u8 {
    (intensity.clamp(0.0, 1.0) * 255.0) as u8
}

/// Overlay rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Heatmap opacity in [0, 1].
    pub alpha: f32,
    /// Color scheme for heatmap intensities.
    pub colormap: ColorMap,
    /// Leave pixels with zero intensity untouched.
    pub transparent_zero: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            colormap: ColorMap::Jet,
            transparent_zero: true,
        }
    }
}

impl OverlayConfig {
    /// Check that `alpha` is in [0, 1].
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::InvalidParameter`] otherwise.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ExplainError::InvalidParameter(format!(
                "alpha {} outside [0, 1]",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Map every heatmap cell through a color map.
#[must_use]
pub fn colorize(heatmap: &Heatmap, colormap: ColorMap) -> RgbImage {
    let lut = colormap.lut();
    let (height, width) = heatmap.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        lut[usize::from(quantize(heatmap[[y as usize, x as usize]]))]
    })
}

/// Alpha-blend a color-mapped heatmap over a grayscale image.
///
/// `output = alpha * color + (1 - alpha) * gray`, rounded half to even and
/// clamped per channel.
///
/// # Errors
///
/// Returns [`ExplainError::DimensionMismatch`] if the heatmap is not the
/// image's size, and [`ExplainError::InvalidParameter`] for an invalid alpha.
pub fn render_overlay(
    image: &GrayscaleImage,
    heatmap: &Heatmap,
    config: &OverlayConfig,
) -> Result<RgbImage> {
    config.validate()?;
    let (map_height, map_width) = heatmap.dim();
    let image_width = image.width() as usize;
    let image_height = image.height() as usize;
    if (map_height, map_width) != (image_height, image_width) {
        return Err(ExplainError::DimensionMismatch {
            image_width,
            image_height,
            map_width,
            map_height,
        });
    }

    let lut = config.colormap.lut();
    let alpha = config.alpha;
    let blend = |c: u8, g: u8| {
        (alpha * f32::from(c) + (1.0 - alpha) * f32::from(g))
            .round_ties_even()
            .clamp(0.0, 255.0) as u8
    };

    let output = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let gray = image.intensity(x, y);
        let intensity = heatmap[[y as usize, x as usize]];
        if config.transparent_zero && intensity == 0.0 {
            return Rgb([gray, gray, gray]);
        }
        let Rgb([r, g, b]) = lut[usize::from(quantize(intensity))];
        Rgb([blend(r, gray), blend(g, gray), blend(b, gray)])
    });
    Ok(output)
}

/// Renders overlays with a fixed, validated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl OverlayRenderer {
    /// Create a renderer.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::InvalidParameter`] for an invalid alpha.
    pub fn new(config: OverlayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The renderer's configuration.
    #[must_use]
    pub const fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Render `heatmap` over `image`.
    ///
    /// # Errors
    ///
    /// See [`render_overlay`].
    pub fn render(&self, image: &GrayscaleImage, heatmap: &Heatmap) -> Result<RgbImage> {
        render_overlay(image, heatmap, &self.config)
    }
}
