//! Heatmap post-processing: resizing, thresholding, dense/sparse conversion.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::cam::ClassActivationMap;
use crate::error::{ExplainError, Result};

/// Default minimum intensity kept by [`threshold`].
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Dense heatmap of shape (height, width) with values in [0, 1].
pub type Heatmap = Array2<f32>;

/// One non-zero heatmap cell.
///
/// Serialized as the tuple `[x, y, intensity]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(usize, usize, f32)", into = "(usize, usize, f32)")]
pub struct HeatmapPoint {
    /// Column, in `[0, width)`.
    pub x: usize,
    /// Row, in `[0, height)`.
    pub y: usize,
    /// Intensity, in `(0, 1]`.
    pub intensity: f32,
}

impl HeatmapPoint {
    /// Create a point.
    #[must_use]
    pub const fn new(x: usize, y: usize, intensity: f32) -> Self {
        Self { x, y, intensity }
    }
}

impl From<(usize, usize, f32)> for HeatmapPoint {
    fn from((x, y, intensity): (usize, usize, f32)) -> Self {
        Self { x, y, intensity }
    }
}

impl From<HeatmapPoint> for (usize, usize, f32) {
    fn from(p: HeatmapPoint) -> Self {
        (p.x, p.y, p.intensity)
    }
}

/// Per-axis bilinear taps: (lower index, upper index, upper weight).
fn bilinear_taps(len_in: usize, len_out: usize) -> Vec<(usize, usize, f32)> {
    let scale = len_in as f32 / len_out as f32;
    (0..len_out)
        .map(|dst| {
            // Half-pixel centers, edges clamped.
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let lo = (src.floor() as usize).min(len_in - 1);
            let hi = (lo + 1).min(len_in - 1);
            let frac = (src - lo as f32).clamp(0.0, 1.0);
            (lo, hi, frac)
        })
        .collect()
}

/// Resize a map to `(target_height, target_width)` with bilinear interpolation.
///
/// Pixel centers are aligned (no corner alignment), matching the usual
/// upsampling convention for activation maps. Output stays in `[0, 1]`.
///
/// # Errors
///
/// Returns [`ExplainError::InvalidParameter`] if either the source map or the
/// target size is empty.
pub fn resize(map: &Array2<f32>, target_height: usize, target_width: usize) -> Result<Heatmap> {
    let (in_h, in_w) = map.dim();
    if in_h == 0 || in_w == 0 {
        return Err(ExplainError::InvalidParameter(
            "cannot resize an empty map".to_string(),
        ));
    }
    if target_height == 0 || target_width == 0 {
        return Err(ExplainError::InvalidParameter(format!(
            "invalid target size {target_width}x{target_height}"
        )));
    }

    let rows = bilinear_taps(in_h, target_height);
    let cols = bilinear_taps(in_w, target_width);

    // Lerp form keeps flat regions exact.
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let out = Array2::from_shape_fn((target_height, target_width), |(y, x)| {
        let (y0, y1, fy) = rows[y];
        let (x0, x1, fx) = cols[x];
        let top = lerp(map[[y0, x0]], map[[y0, x1]], fx);
        let bottom = lerp(map[[y1, x0]], map[[y1, x1]], fx);
        lerp(top, bottom, fy).clamp(0.0, 1.0)
    });
    Ok(out)
}

/// Zero every cell below `t`; cells at or above `t` keep their value.
///
/// # Errors
///
/// Returns [`ExplainError::InvalidParameter`] if `t` is not in `[0, 1]`.
pub fn threshold(map: &Array2<f32>, t: f32) -> Result<Heatmap> {
    if !(0.0..=1.0).contains(&t) {
        return Err(ExplainError::InvalidParameter(format!(
            "threshold {t} outside [0, 1]"
        )));
    }
    Ok(map.mapv(|v| if v < t { 0.0 } else { v }))
}

/// Enumerate non-zero cells in row-major order.
#[must_use]
pub fn to_sparse(map: &Array2<f32>) -> Vec<HeatmapPoint> {
    map.indexed_iter()
        .filter(|(_, &v)| v != 0.0)
        .map(|((y, x), &v)| HeatmapPoint::new(x, y, v))
        .collect()
}

/// Rebuild a `(height, width)` map from points; absent cells are zero.
///
/// # Errors
///
/// Returns [`ExplainError::PointOutOfBounds`] for a point outside the grid.
pub fn to_dense(points: &[HeatmapPoint], width: usize, height: usize) -> Result<Heatmap> {
    let mut map = Array2::zeros((height, width));
    for p in points {
        if p.x >= width || p.y >= height {
            return Err(ExplainError::PointOutOfBounds {
                x: p.x,
                y: p.y,
                width,
                height,
            });
        }
        map[[p.y, p.x]] = p.intensity;
    }
    Ok(map)
}

/// Resize-then-threshold step applied to every explained CAM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapProcessor {
    threshold: f32,
}

impl Default for HeatmapProcessor {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl HeatmapProcessor {
    /// Create a processor with a custom threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::InvalidParameter`] if `threshold` is not in `[0, 1]`.
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ExplainError::InvalidParameter(format!(
                "threshold {threshold} outside [0, 1]"
            )));
        }
        Ok(Self { threshold })
    }

    /// Configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Resize a CAM to the image's pixel size and apply the threshold.
    ///
    /// # Errors
    ///
    /// Propagates [`resize`] errors.
    pub fn process(&self, cam: &ClassActivationMap, height: usize, width: usize) -> Result<Heatmap> {
        let resized = resize(cam.values(), height, width)?;
        threshold(&resized, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn random_map(rng: &mut ChaCha8Rng, h: usize, w: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |_| rng.gen_range(0.0..=1.0))
    }

    #[test]
    fn test_resize_output_shape_and_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let map = random_map(&mut rng, 7, 7);

        let out = resize(&map, 224, 180).unwrap();

        assert_eq!(out.dim(), (224, 180));
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_resize_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let map = random_map(&mut rng, 5, 9);

        let a = resize(&map, 33, 17).unwrap();
        let b = resize(&map, 33, 17).unwrap();

        let bits = |m: &Array2<f32>| m.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_resize_constant_map_stays_constant() {
        let map = Array2::from_elem((2, 2), 1.0f32);
        let out = resize(&map, 5, 3).unwrap();
        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_resize_interpolates_between_centers() {
        // 1x2 -> 1x4: source centers sit at output x = 0.5 and 2.5.
        let map = array![[0.0f32, 1.0]];
        let out = resize(&map, 1, 4).unwrap();
        let expected = [0.0, 0.25, 0.75, 1.0];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
    }

    #[test]
    fn test_resize_rejects_empty_target() {
        let map = Array2::from_elem((2, 2), 0.5f32);
        assert!(matches!(resize(&map, 0, 4), Err(ExplainError::InvalidParameter(_))));
    }

    #[test]
    fn test_threshold_zero_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let map = random_map(&mut rng, 6, 6);
        assert_eq!(threshold(&map, 0.0).unwrap(), map);
    }

    #[test]
    fn test_threshold_one_keeps_only_exact_ones() {
        let map = array![[1.0f32, 0.999], [0.5, 1.0]];
        let out = threshold(&map, 1.0).unwrap();
        assert_eq!(out, array![[1.0f32, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_threshold_does_not_rescale() {
        let map = array![[0.05f32, 0.1, 0.3]];
        let out = threshold(&map, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(out, array![[0.0f32, 0.1, 0.3]]);
    }

    #[test]
    fn test_threshold_rejects_out_of_range() {
        let map = array![[0.5f32]];
        assert!(threshold(&map, 1.5).is_err());
        assert!(threshold(&map, -0.1).is_err());
        assert!(threshold(&map, f32::NAN).is_err());
    }

    #[test]
    fn test_sparse_skips_zero_cells() {
        let map = array![[0.0f32, 0.4], [0.9, 0.0]];
        let points = to_sparse(&map);
        assert_eq!(
            points,
            vec![HeatmapPoint::new(1, 0, 0.4), HeatmapPoint::new(0, 1, 0.9)]
        );
        assert!(to_sparse(&Array2::zeros((3, 3))).is_empty());
    }

    #[test]
    fn test_sparse_dense_reproduces_thresholded_map() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let map = threshold(&random_map(&mut rng, 12, 10), 0.5).unwrap();

        let points = to_sparse(&map);
        let rebuilt = to_dense(&points, 10, 12).unwrap();

        assert_eq!(rebuilt, map);
    }

    #[test]
    fn test_to_dense_rejects_out_of_bounds() {
        let points = [HeatmapPoint::new(4, 0, 0.5)];
        assert!(matches!(
            to_dense(&points, 4, 4),
            Err(ExplainError::PointOutOfBounds { x: 4, .. })
        ));
    }

    #[test]
    fn test_point_serializes_as_tuple() {
        let json = serde_json::to_string(&HeatmapPoint::new(3, 5, 0.5)).unwrap();
        assert_eq!(json, "[3,5,0.5]");
    }

    #[test]
    fn test_processor_uses_image_dimensions() {
        let cam = ClassActivationMap::from_raw(array![[0.0f32, 1.0], [0.0, 0.0]]);
        let processor = HeatmapProcessor::default();

        let heatmap = processor.process(&cam, 6, 8).unwrap();

        assert_eq!(heatmap.dim(), (6, 8));
        assert_eq!(heatmap[[5, 0]], 0.0);
        assert_eq!(heatmap[[0, 7]], 1.0);
    }

    #[test]
    fn test_processor_rejects_bad_threshold() {
        assert!(HeatmapProcessor::new(2.0).is_err());
        assert_eq!(HeatmapProcessor::new(0.0).unwrap().threshold(), 0.0);
    }
}
