//! # cxr
//!
//! Chest X-ray classification with Grad-CAM explanations.
//!
//! cxr-rs classifies a grayscale chest radiograph as normal, viral pneumonia or
//! bacterial pneumonia and, for pneumonia predictions, highlights the image
//! regions that drove the decision:
//!
//! - **Core**: diagnostic classes, grayscale image intake, classifier boundary
//! - **Explain**: activation/gradient capture, Grad-CAM, heatmaps, overlays
//! - **Models**: the CxrNet classifier and weight checkpoints
//! - **Infer**: the request pipeline and its results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cxr::prelude::*;
//!
//! let model = load_model(&CxrNetConfig::default(), "cxrnet.mpk", &device)?;
//! let pipeline = InferencePipeline::new(model, PipelineConfig::default(), device)?;
//!
//! let result = pipeline.analyze_bytes(&std::fs::read("chest.png")?)?;
//! println!("{}", result.diagnosis);
//! if let Some(explanation) = &result.explanation {
//!     std::fs::write("chest_cam.png", encode_png(&explanation.overlay)?)?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use cxr_core as core;
pub use cxr_explain as explain;
pub use cxr_infer as infer;
pub use cxr_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cxr::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use cxr_core::{
        encode_png, ClassScores, ClassSet, Diagnosis, GradCamClassifier, GrayscaleImage,
        ImageValidator,
    };

    // Explain
    pub use cxr_explain::{ColorMap, HeatmapPoint, OverlayConfig};

    // Models
    pub use cxr_models::{load_model, save_model, CxrNet, CxrNetConfig};

    // Inference
    pub use cxr_infer::{AnalysisResult, Explanation, InferError, InferencePipeline, PipelineConfig};
}
