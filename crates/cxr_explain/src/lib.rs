//! # cxr_explain
//!
//! Explainability tools for cxr-rs: activation/gradient capture, Grad-CAM,
//! heatmap post-processing and overlay rendering.
//!
//! This crate provides:
//! - Activation and gradient capture hooks
//! - [`grad_cam`] producing a normalized [`ClassActivationMap`]
//! - Heatmap resize, threshold and dense/sparse conversion
//! - False-color overlay compositing

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod cam;
mod error;
pub mod heatmap;
pub mod overlay;

pub use activation::{ActivationCapture, BackwardHook, ForwardHook, GradientCapture};
pub use cam::{grad_cam, ClassActivationMap};
pub use error::{ExplainError, Result};
pub use heatmap::{Heatmap, HeatmapPoint, HeatmapProcessor, DEFAULT_THRESHOLD};
pub use overlay::{ColorMap, OverlayConfig, OverlayRenderer, DEFAULT_ALPHA};
