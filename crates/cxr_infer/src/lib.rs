//! # cxr_infer
//!
//! Request pipeline for cxr-rs: classify a chest X-ray and, when the
//! prediction carries localized evidence, explain it with Grad-CAM.
//!
//! This crate provides:
//! - [`InferencePipeline`] serving concurrent requests against one model
//! - [`HookedModel`] owning the classifier and its capture slots
//! - [`PipelineConfig`] loaded from JSON with defaults
//! - [`AnalysisResult`] and its serializable [`AnalysisReport`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use cxr_infer::{InferencePipeline, PipelineConfig};
//! use cxr_models::CxrNetConfig;
//!
//! let model = CxrNetConfig::default().init::<Autodiff<NdArray>>(&device);
//! let pipeline = InferencePipeline::new(model, PipelineConfig::default(), device)?;
//!
//! let result = pipeline.analyze_bytes(&upload)?;
//! println!("{}", serde_json::to_string(&result.report())?);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
mod hooked;
mod pipeline;
pub mod result;

pub use config::PipelineConfig;
pub use error::{InferError, Result};
pub use hooked::{ForwardPass, HookStats, HookedModel};
pub use pipeline::{Classification, Evidence, InferencePipeline, UnexplainedReason};
pub use result::{AnalysisReport, AnalysisResult, Explanation, OverlayInfo, OVERLAY_MIME};
