//! Integration tests for the explanation chain.
//!
//! Grad-CAM output flows through resize, threshold, sparse conversion and
//! overlay rendering exactly as it does for a served request.

use burn::prelude::*;
use burn::tensor::TensorData;
use cxr_core::backend::NdArray;
use cxr_core::GrayscaleImage;
use cxr_explain::heatmap::to_sparse;
use cxr_explain::{grad_cam, HeatmapPoint, HeatmapProcessor, OverlayRenderer};

type TestBackend = NdArray;

fn tensor(values: Vec<f32>, shape: [usize; 3]) -> Tensor<TestBackend, 3> {
    let device = Default::default();
    Tensor::from_data(TensorData::new(values, shape), &device)
}

#[test]
fn test_uniform_evidence_keeps_every_pixel() {
    let activations = tensor(vec![2.0; 4], [1, 2, 2]);
    let gradients = tensor(vec![1.0; 4], [1, 2, 2]);
    let image = GrayscaleImage::filled(2, 2, 60);

    let cam = grad_cam(activations, gradients).unwrap();
    let heatmap = HeatmapProcessor::new(0.1).unwrap().process(&cam, 2, 2).unwrap();
    let points = to_sparse(&heatmap);

    assert_eq!(
        points,
        vec![
            HeatmapPoint::new(0, 0, 1.0),
            HeatmapPoint::new(1, 0, 1.0),
            HeatmapPoint::new(0, 1, 1.0),
            HeatmapPoint::new(1, 1, 1.0),
        ]
    );

    let overlay = OverlayRenderer::default().render(&image, &heatmap).unwrap();
    assert_eq!(overlay.dimensions(), (2, 2));
    assert_ne!(overlay, image.to_rgb());
}

#[test]
fn test_zero_gradients_leave_image_unchanged() {
    let activations = tensor((0..48).map(|i| i as f32).collect(), [3, 4, 4]);
    let gradients = tensor(vec![0.0; 48], [3, 4, 4]);
    let pixels = (0..6 * 5).map(|i| (i * 9 % 256) as u8).collect();
    let image = GrayscaleImage::from_raw(6, 5, pixels).unwrap();

    let cam = grad_cam(activations, gradients).unwrap();
    assert!(cam.is_degenerate());

    let heatmap = HeatmapProcessor::new(0.1).unwrap().process(&cam, 5, 6).unwrap();
    assert!(to_sparse(&heatmap).is_empty());

    let overlay = OverlayRenderer::default().render(&image, &heatmap).unwrap();
    assert_eq!(overlay, image.to_rgb());
}
