//! A loaded classifier together with the captures attached to its explained layer.

use std::marker::PhantomData;

use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use cxr_core::GradCamClassifier;
use cxr_explain::{ActivationCapture, BackwardHook, ForwardHook, GradientCapture};

use crate::error::{InferError, Result};

/// Pass counters, readable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookStats {
    /// Forward passes run.
    pub forward_passes: usize,
    /// Backward passes run.
    pub backward_passes: usize,
    /// Whether an activation is waiting to be read.
    pub activation_pending: bool,
    /// Whether a gradient is waiting to be read.
    pub gradient_pending: bool,
}

/// Output of one forward pass, consumed by at most one backward pass.
#[derive(Debug)]
pub struct ForwardPass<B: AutodiffBackend> {
    /// Explained layer output, re-rooted as a gradient-tracked leaf.
    features: Tensor<B, 4>,
    /// Raw logits (1, n_classes).
    logits: Tensor<B, 2>,
}

impl<B: AutodiffBackend> ForwardPass<B> {
    /// Number of logits.
    pub fn n_classes(&self) -> usize {
        self.logits.dims()[1]
    }

    /// Softmax over the raw logits, without touching the autodiff graph.
    pub fn probabilities(&self) -> Result<Vec<f32>> {
        softmax(self.logits.clone().inner(), 1)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| InferError::ForwardError(format!("{e:?}")))
    }
}

/// Owns a classifier and the capture slots of its explained layer.
///
/// Capture slots hold the most recent tensors only; callers serialize access
/// to a `HookedModel` for the whole forward-to-CAM region.
pub struct HookedModel<B: AutodiffBackend, M> {
    model: M,
    layer: String,
    attached: bool,
    activations: ActivationCapture<B::InnerBackend>,
    gradients: GradientCapture<B::InnerBackend>,
    forward_passes: usize,
    backward_passes: usize,
    _backend: PhantomData<B>,
}

impl<B, M> HookedModel<B, M>
where
    B: AutodiffBackend,
    M: GradCamClassifier<B>,
{
    /// Attach captures to `layer` of `model`.
    pub fn attach(model: M, layer: &str) -> Self {
        tracing::debug!(layer, "attaching capture hooks");
        Self {
            model,
            layer: layer.to_string(),
            attached: true,
            activations: ActivationCapture::tracking(layer),
            gradients: GradientCapture::tracking(layer),
            forward_passes: 0,
            backward_passes: 0,
            _backend: PhantomData,
        }
    }

    /// Stop capturing. Safe to call any number of times.
    pub fn detach(&mut self) {
        if self.attached {
            tracing::debug!(layer = %self.layer, "detaching capture hooks");
        }
        self.attached = false;
        self.clear_captures();
    }

    /// Whether captures are attached.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Explained layer name.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// The wrapped classifier.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run the classifier, capturing the explained layer's output.
    pub fn forward(&mut self, input: Tensor<B, 4>) -> ForwardPass<B> {
        self.forward_passes += 1;
        let features = self.model.features(input);
        if self.attached {
            self.activations.on_forward(&self.layer, features.clone().inner());
        }

        // Cut the graph here so the backward pass stops at this layer and
        // its gradient is retained.
        let features = features.detach().require_grad();
        let logits = self.model.classify(features.clone());
        ForwardPass { features, logits }
    }

    /// Back-propagate the raw logit of `class_index`, capturing the gradient
    /// at the explained layer.
    pub fn backward(&mut self, pass: ForwardPass<B>, class_index: usize) -> Result<()> {
        let n_classes = pass.n_classes();
        if class_index >= n_classes {
            return Err(InferError::BackwardError(format!(
                "class index {class_index} out of range for {n_classes} logits"
            )));
        }

        self.backward_passes += 1;
        let score = pass
            .logits
            .slice([0..1, class_index..class_index + 1])
            .sum();
        let grads = score.backward();

        if self.attached {
            match pass.features.grad(&grads) {
                Some(gradient) => self.gradients.on_backward(&self.layer, gradient),
                None => tracing::warn!(layer = %self.layer, "no gradient reached the explained layer"),
            }
        }
        Ok(())
    }

    /// Remove and return the captured activation.
    pub fn take_activation(&mut self) -> Option<Tensor<B::InnerBackend, 4>> {
        self.activations.take(&self.layer)
    }

    /// Remove and return the captured gradient.
    pub fn take_gradient(&mut self) -> Option<Tensor<B::InnerBackend, 4>> {
        self.gradients.take(&self.layer)
    }

    /// Empty both capture slots.
    pub fn clear_captures(&mut self) {
        self.activations.clear();
        self.gradients.clear();
    }

    /// Current counters and slot state.
    pub fn stats(&self) -> HookStats {
        HookStats {
            forward_passes: self.forward_passes,
            backward_passes: self.backward_passes,
            activation_pending: self.activations.is_populated(&self.layer),
            gradient_pending: self.gradients.is_populated(&self.layer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::backend::{Autodiff, NdArray};
    use cxr_models::{CxrNet, CxrNetConfig, FEATURES_LAYER};

    type TestBackend = Autodiff<NdArray>;

    fn hooked() -> HookedModel<TestBackend, CxrNet<TestBackend>> {
        let device = Default::default();
        let model = CxrNetConfig::new(3)
            .with_channels(vec![4, 8])
            .init::<TestBackend>(&device);
        HookedModel::attach(model, FEATURES_LAYER)
    }

    fn input() -> Tensor<TestBackend, 4> {
        let device = Default::default();
        Tensor::random([1, 1, 16, 16], burn::tensor::Distribution::Normal(0.0, 1.0), &device)
    }

    #[test]
    fn test_forward_populates_activation_only() {
        let mut model = hooked();
        let pass = model.forward(input());

        assert_eq!(pass.n_classes(), 3);
        let stats = model.stats();
        assert_eq!(stats.forward_passes, 1);
        assert_eq!(stats.backward_passes, 0);
        assert!(stats.activation_pending);
        assert!(!stats.gradient_pending);

        let activation = model.take_activation().unwrap();
        assert_eq!(activation.dims(), [1, 8, 4, 4]);
    }

    #[test]
    fn test_backward_populates_matching_gradient() {
        let mut model = hooked();
        let pass = model.forward(input());
        model.backward(pass, 2).unwrap();

        let activation = model.take_activation().unwrap();
        let gradient = model.take_gradient().unwrap();
        assert_eq!(activation.dims(), gradient.dims());
        assert_eq!(model.stats().backward_passes, 1);
    }

    #[test]
    fn test_backward_rejects_bad_class_index() {
        let mut model = hooked();
        let pass = model.forward(input());
        let err = model.backward(pass, 3).unwrap_err();
        assert!(matches!(err, InferError::BackwardError(_)));
        assert_eq!(model.stats().backward_passes, 0);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let mut model = hooked();
        let pass = model.forward(input());
        let probs = pass.probabilities().unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_detach_is_idempotent_and_stops_capture() {
        let mut model = hooked();
        model.detach();
        model.detach();
        assert!(!model.is_attached());

        let pass = model.forward(input());
        model.backward(pass, 0).unwrap();
        assert!(model.take_activation().is_none());
        assert!(model.take_gradient().is_none());
    }

    #[test]
    fn test_next_forward_overwrites_activation() {
        let mut model = hooked();
        let _ = model.forward(input());
        let _ = model.forward(input());
        assert_eq!(model.stats().forward_passes, 2);
        assert!(model.take_activation().is_some());
        assert!(model.take_activation().is_none());
    }
}
