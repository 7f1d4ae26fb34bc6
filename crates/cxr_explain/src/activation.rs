//! Activation and gradient capture hooks.
//!
//! A capture owns one optional slot per tracked layer. The model-execution
//! side calls [`ForwardHook::on_forward`] / [`BackwardHook::on_backward`];
//! the pipeline reads each slot at most once with `take`.

use std::collections::HashMap;

use burn::prelude::*;

/// Receives a layer's output during a forward pass.
pub trait ForwardHook<B: Backend> {
    /// Called with a detached copy of `layer`'s output.
    fn on_forward(&mut self, layer: &str, activation: Tensor<B, 4>);
}

/// Receives the gradient flowing into a layer's output during a backward pass.
pub trait BackwardHook<B: Backend> {
    /// Called with a detached copy of the gradient w.r.t. `layer`'s output.
    fn on_backward(&mut self, layer: &str, gradient: Tensor<B, 4>);
}

/// Captured activations from model layers.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend> {
    /// Activation slot per tracked layer.
    activations: HashMap<String, Option<Tensor<B, 4>>>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Create a capture with no tracked layers.
    pub fn new() -> Self {
        Self {
            activations: HashMap::new(),
        }
    }

    /// Create a capture tracking a single layer.
    pub fn tracking(layer: &str) -> Self {
        let mut capture = Self::new();
        capture.track(layer);
        capture
    }

    /// Start tracking a layer. Existing slots are left as they are.
    pub fn track(&mut self, layer: &str) {
        self.activations.entry(layer.to_string()).or_insert(None);
    }

    /// Store an activation, overwriting the previous one. Untracked layers are ignored.
    pub fn store(&mut self, layer: &str, activation: Tensor<B, 4>) {
        if let Some(slot) = self.activations.get_mut(layer) {
            *slot = Some(activation);
        }
    }

    /// Get an activation by layer name.
    pub fn get(&self, layer: &str) -> Option<&Tensor<B, 4>> {
        self.activations.get(layer).and_then(Option::as_ref)
    }

    /// Remove and return an activation, leaving the slot empty.
    pub fn take(&mut self, layer: &str) -> Option<Tensor<B, 4>> {
        self.activations.get_mut(layer).and_then(Option::take)
    }

    /// Whether the layer's slot currently holds a tensor.
    pub fn is_populated(&self, layer: &str) -> bool {
        self.get(layer).is_some()
    }

    /// Get all tracked layer names.
    pub fn names(&self) -> Vec<&str> {
        self.activations.keys().map(|s| s.as_str()).collect()
    }

    /// Empty every slot while keeping the layers tracked.
    pub fn clear(&mut self) {
        self.activations.values_mut().for_each(|slot| *slot = None);
    }
}

impl<B: Backend> Default for ActivationCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> ForwardHook<B> for ActivationCapture<B> {
    fn on_forward(&mut self, layer: &str, activation: Tensor<B, 4>) {
        tracing::trace!(layer, dims = ?activation.dims(), "activation captured");
        self.store(layer, activation);
    }
}

/// Captured gradients from model layers.
#[derive(Debug, Clone)]
pub struct GradientCapture<B: Backend> {
    /// Gradient slot per tracked layer.
    gradients: HashMap<String, Option<Tensor<B, 4>>>,
}

impl<B: Backend> GradientCapture<B> {
    /// Create a capture with no tracked layers.
    pub fn new() -> Self {
        Self {
            gradients: HashMap::new(),
        }
    }

    /// Create a capture tracking a single layer.
    pub fn tracking(layer: &str) -> Self {
        let mut capture = Self::new();
        capture.track(layer);
        capture
    }

    /// Start tracking a layer.
    pub fn track(&mut self, layer: &str) {
        self.gradients.entry(layer.to_string()).or_insert(None);
    }

    /// Store a gradient, overwriting the previous one. Untracked layers are ignored.
    pub fn store(&mut self, layer: &str, gradient: Tensor<B, 4>) {
        if let Some(slot) = self.gradients.get_mut(layer) {
            *slot = Some(gradient);
        }
    }

    /// Get a gradient by layer name.
    pub fn get(&self, layer: &str) -> Option<&Tensor<B, 4>> {
        self.gradients.get(layer).and_then(Option::as_ref)
    }

    /// Remove and return a gradient, leaving the slot empty.
    pub fn take(&mut self, layer: &str) -> Option<Tensor<B, 4>> {
        self.gradients.get_mut(layer).and_then(Option::take)
    }

    /// Whether the layer's slot currently holds a tensor.
    pub fn is_populated(&self, layer: &str) -> bool {
        self.get(layer).is_some()
    }

    /// Get all tracked layer names.
    pub fn names(&self) -> Vec<&str> {
        self.gradients.keys().map(|s| s.as_str()).collect()
    }

    /// Empty every slot while keeping the layers tracked.
    pub fn clear(&mut self) {
        self.gradients.values_mut().for_each(|slot| *slot = None);
    }
}

impl<B: Backend> Default for GradientCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> BackwardHook<B> for GradientCapture<B> {
    fn on_backward(&mut self, layer: &str, gradient: Tensor<B, 4>) {
        tracing::trace!(layer, dims = ?gradient.dims(), "gradient captured");
        self.store(layer, gradient);
    }
}
