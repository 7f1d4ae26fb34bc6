//! Classifier boundary consumed by the explanation pipeline.
//!
//! A classifier is split at the layer whose output is explained: `features`
//! produces that layer's activation, `classify` maps it to raw logits.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// A chest X-ray classifier that exposes its explained layer.
///
/// Implementations must be free of side effects in `features` and `classify`
/// (no running statistics updated during inference), because the same
/// instance serves every request.
pub trait GradCamClassifier<B: AutodiffBackend>: Send {
    /// Forward pass up to and including the explained layer.
    ///
    /// # Arguments
    ///
    /// * `x` - Normalized input of shape (1, 1, height, width)
    ///
    /// # Returns
    ///
    /// Activation of shape (1, channels, h, w)
    fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Remainder of the network.
    ///
    /// # Returns
    ///
    /// Raw (pre-softmax) logits of shape (1, n_classes)
    fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Full forward pass returning probabilities.
    fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.classify(self.features(x));
        burn::tensor::activation::softmax(logits, 1)
    }
}
