//! Compact convolutional network for chest X-ray classification.
//!
//! The network is a stack of convolutional blocks (the explained feature
//! extractor) followed by global average pooling and a linear classifier.
//! Blocks carry no batch normalization, so a forward pass never mutates the
//! model and one instance can serve every request.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use cxr_core::GradCamClassifier;
use serde::{Deserialize, Serialize};

/// Name under which the feature extractor's output is captured.
pub const FEATURES_LAYER: &str = "features";

/// Configuration for the CxrNet model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CxrNetConfig {
    /// Number of input channels (1 for grayscale).
    pub in_channels: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Output channels of each convolutional block.
    pub channels: Vec<usize>,
    /// Convolution kernel size (odd).
    pub kernel_size: usize,
}

impl Default for CxrNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            n_classes: 3,
            channels: vec![32, 64, 128, 256],
            kernel_size: 3,
        }
    }
}

impl CxrNetConfig {
    /// Create a new config with the given number of classes.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            ..Default::default()
        }
    }

    /// Set the block widths.
    #[must_use]
    pub fn with_channels(mut self, channels: Vec<usize>) -> Self {
        self.channels = channels;
        self
    }

    /// Spatial reduction factor of the feature extractor.
    #[must_use]
    pub fn stride(&self) -> usize {
        1 << self.channels.len()
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CxrNet<B> {
        CxrNet::new(self.clone(), device)
    }
}

/// A single convolutional block: Conv2d -> ReLU -> MaxPool(2)
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    /// Convolutional layer.
    conv: Conv2d<B>,
    /// Downsampling.
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self { conv, pool }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = Relu::new().forward(out);
        self.pool.forward(out)
    }
}

/// Convolutional chest X-ray classifier.
///
/// Architecture:
/// - N x [Conv2d(k, same) -> ReLU -> MaxPool(2)]  (the `features` layer)
/// - Global Average Pooling
/// - Linear(channels[N-1], n_classes)
///
/// # Example
///
/// ```rust,ignore
/// use cxr_models::CxrNetConfig;
///
/// let model = CxrNetConfig::new(3).init::<Autodiff<NdArray>>(&device);
/// let x = Tensor::zeros([1, 1, 224, 224], &device);
/// let logits = model.forward(x);
/// // logits shape: [1, 3]
/// ```
#[derive(Module, Debug)]
pub struct CxrNet<B: Backend> {
    /// Feature extractor blocks.
    blocks: Vec<ConvBlock<B>>,
    /// Global average pooling.
    gap: AdaptiveAvgPool2d,
    /// Final linear classifier.
    fc: Linear<B>,
}

impl<B: Backend> CxrNet<B> {
    /// Create a new CxrNet model.
    pub fn new(config: CxrNetConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.channels.len());
        let mut in_channels = config.in_channels;
        for &out_channels in &config.channels {
            blocks.push(ConvBlock::new(
                in_channels,
                out_channels,
                config.kernel_size,
                device,
            ));
            in_channels = out_channels;
        }

        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(in_channels, config.n_classes).init(device);

        Self { blocks, gap, fc }
    }

    /// Feature extractor output of shape (batch, channels, h / stride, w / stride).
    pub fn extract(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |out, block| block.forward(out))
    }

    /// Classifier head producing logits of shape (batch, n_classes).
    pub fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(features);
        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);
        self.fc.forward(out)
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, 1, height, width)
    ///
    /// # Returns
    ///
    /// Output tensor of shape (batch, n_classes) with logits
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(self.extract(x))
    }
}

impl<B: AutodiffBackend> GradCamClassifier<B> for CxrNet<B> {
    fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.extract(x)
    }

    fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    #[test]
    fn test_cxrnet_config_default() {
        let config = CxrNetConfig::default();
        assert_eq!(config.in_channels, 1);
        assert_eq!(config.n_classes, 3);
        assert_eq!(config.channels, vec![32, 64, 128, 256]);
        assert_eq!(config.stride(), 16);
    }

    #[test]
    fn test_cxrnet_config_serde() {
        let config = CxrNetConfig::new(2).with_channels(vec![4, 8]);
        let json = serde_json::to_string(&config).unwrap();
        let decoded: CxrNetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.n_classes, 2);
        assert_eq!(decoded.channels, vec![4, 8]);
    }

    #[test]
    fn test_cxrnet_forward_shape() {
        let device = Default::default();
        let model = CxrNetConfig::new(3)
            .with_channels(vec![4, 8])
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([2, 1, 32, 32], &device);
        let features = model.extract(x.clone());
        assert_eq!(features.dims(), [2, 8, 8, 8]);

        let logits = model.forward(x);
        assert_eq!(logits.dims(), [2, 3]);
    }

    #[test]
    fn test_cxrnet_as_classifier() {
        type AD = Autodiff<TestBackend>;
        let device = Default::default();
        let model = CxrNetConfig::new(3)
            .with_channels(vec![4])
            .init::<AD>(&device);

        let x = Tensor::<AD, 4>::ones([1, 1, 16, 16], &device);
        let probs = model.forward_probs(x);
        let total: f32 = probs.sum().into_scalar().elem();
        assert!((total - 1.0).abs() < 1e-5);
    }
}
