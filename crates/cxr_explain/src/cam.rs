//! Gradient-weighted class activation maps.

use burn::prelude::*;
use ndarray::Array2;

use crate::error::{ExplainError, Result};

/// Single-channel evidence map of shape (h, w), values in [0, 1].
///
/// Either the maximum is exactly 1.0, or the map is all zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassActivationMap {
    values: Array2<f32>,
}

impl ClassActivationMap {
    /// Rectify and normalize a raw weighted-sum map.
    ///
    /// Negative cells become zero. If the maximum is positive every cell is
    /// divided by it; otherwise the all-zero map is returned as is.
    pub fn from_raw(raw: Array2<f32>) -> Self {
        let rectified = raw.mapv(|v| v.max(0.0));
        let max = rectified.iter().copied().fold(0.0f32, f32::max);
        let values = if max > 0.0 {
            rectified.mapv(|v| v / max)
        } else {
            rectified
        };
        Self { values }
    }

    /// The normalized values.
    #[must_use]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Consume self and return the normalized values.
    #[must_use]
    pub fn into_values(self) -> Array2<f32> {
        self.values
    }

    /// `(height, width)` of the map.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Largest value: 1.0, or 0.0 for a degenerate map.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0f32, f32::max)
    }

    /// Whether no cell carries evidence.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Compute Grad-CAM for one sample.
///
/// # Arguments
///
/// * `activations` - Output of the explained layer (channels, h, w)
/// * `gradients` - Gradient of the class score w.r.t. that output (channels, h, w)
///
/// # Returns
///
/// A normalized [`ClassActivationMap`] of shape (h, w).
///
/// # Errors
///
/// Returns [`ExplainError::ShapeMismatch`] if the shapes differ, and
/// [`ExplainError::InvalidParameter`] for an empty shape.
pub fn grad_cam<B: Backend>(
    activations: Tensor<B, 3>,
    gradients: Tensor<B, 3>,
) -> Result<ClassActivationMap> {
    let activation_dims = activations.dims();
    let gradient_dims = gradients.dims();
    if activation_dims != gradient_dims {
        return Err(ExplainError::ShapeMismatch {
            activation: activation_dims,
            gradient: gradient_dims,
        });
    }
    if activation_dims.contains(&0) {
        return Err(ExplainError::InvalidParameter(format!(
            "empty activation shape {activation_dims:?}"
        )));
    }
    let [_, height, width] = activation_dims;

    // Global average pool the gradients: (channels, h, w) -> (channels, 1, 1)
    let weights = gradients.mean_dim(2).mean_dim(1);

    // Weighted sum over channels: (channels, h, w) -> (h, w)
    let cam = (activations * weights)
        .sum_dim(0)
        .reshape([height, width])
        .clamp_min(0.0);

    let values: Vec<f32> = cam
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| ExplainError::Tensor(format!("{e:?}")))?;
    let raw = Array2::from_shape_vec((height, width), values)
        .map_err(|e| ExplainError::Tensor(e.to_string()))?;

    Ok(ClassActivationMap::from_raw(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::NdArray;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    type TestBackend = NdArray;

    fn tensor(values: Vec<f32>, shape: [usize; 3]) -> Tensor<TestBackend, 3> {
        let device = Default::default();
        Tensor::from_data(burn::tensor::TensorData::new(values, shape), &device)
    }

    #[test]
    fn test_grad_cam_constant_single_channel() {
        let activations = tensor(vec![2.0; 4], [1, 2, 2]);
        let gradients = tensor(vec![1.0; 4], [1, 2, 2]);

        let cam = grad_cam(activations, gradients).unwrap();

        assert_eq!(cam.dim(), (2, 2));
        assert!(cam.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_grad_cam_zero_gradients_is_all_zero() {
        let activations = tensor((0..48).map(|i| i as f32).collect(), [3, 4, 4]);
        let gradients = tensor(vec![0.0; 48], [3, 4, 4]);

        let cam = grad_cam(activations, gradients).unwrap();

        assert!(cam.is_degenerate());
        assert!(cam.values().iter().all(|v| !v.is_nan()));
        assert_eq!(cam.max(), 0.0);
    }

    #[test]
    fn test_grad_cam_negative_evidence_is_rectified() {
        // Channel weight is -1, activation positive: every product is negative.
        let activations = tensor(vec![1.0, 2.0, 3.0, 4.0], [1, 2, 2]);
        let gradients = tensor(vec![-1.0; 4], [1, 2, 2]);

        let cam = grad_cam(activations, gradients).unwrap();
        assert!(cam.is_degenerate());
    }

    #[test]
    fn test_grad_cam_weights_are_spatial_mean() {
        // Two channels; weights are mean(grad) = 0.5 and 0.0.
        let activations = tensor(vec![1.0, 0.0, 0.0, 3.0, 9.0, 9.0, 9.0, 9.0], [2, 2, 2]);
        let gradients = tensor(vec![1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0], [2, 2, 2]);

        let cam = grad_cam(activations, gradients).unwrap();
        let values = cam.values();

        assert!((values[[0, 0]] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(values[[0, 1]], 0.0);
        assert_eq!(values[[1, 1]], 1.0);
    }

    #[test]
    fn test_grad_cam_shape_mismatch() {
        let activations = tensor(vec![1.0; 8], [2, 2, 2]);
        let gradients = tensor(vec![1.0; 4], [1, 2, 2]);

        let err = grad_cam(activations, gradients).unwrap_err();
        assert_eq!(
            err,
            ExplainError::ShapeMismatch {
                activation: [2, 2, 2],
                gradient: [1, 2, 2],
            }
        );
    }

    #[test]
    fn test_grad_cam_range_on_random_inputs() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..20 {
            let channels = rng.gen_range(1..6);
            let h = rng.gen_range(1..8);
            let w = rng.gen_range(1..8);
            let n = channels * h * w;
            let act: Vec<f32> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
            let grad: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();

            let cam = grad_cam(tensor(act, [channels, h, w]), tensor(grad, [channels, h, w]))
                .unwrap();

            assert!(cam.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
            assert!(cam.max() == 1.0 || cam.is_degenerate());
        }
    }

    #[test]
    fn test_from_raw_normalizes() {
        let raw = Array2::from_shape_vec((1, 3), vec![-4.0, 2.0, 8.0]).unwrap();
        let cam = ClassActivationMap::from_raw(raw);
        assert_eq!(cam.values().as_slice().unwrap(), &[0.0, 0.25, 1.0]);
    }
}
