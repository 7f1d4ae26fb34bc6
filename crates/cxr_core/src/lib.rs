//! # cxr_core
//!
//! Core types and traits for cxr-rs chest X-ray classification.
//!
//! This crate provides:
//! - [`Diagnosis`], [`ClassSet`] and [`ClassScores`] for diagnostic classes
//! - [`GrayscaleImage`] and [`ImageValidator`] for image intake
//! - [`GradCamClassifier`], the model boundary used by the explanation pipeline
//! - Error types and backend aliases
//!
//! ## Example
//!
//! ```rust,ignore
//! use cxr_core::{ImageValidator, ClassSet};
//!
//! let image = ImageValidator::default().validate(&bytes)?;
//! let classes = ClassSet::default();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod diagnosis;
mod error;
mod imaging;
mod model_trait;

pub use diagnosis::{ClassScores, ClassSet, Diagnosis};
pub use error::{CoreError, Result, ValidationError};
pub use imaging::{encode_png, GrayscaleImage, ImageValidator, DEFAULT_FORMATS, DEFAULT_MAX_BYTES};
pub use model_trait::GradCamClassifier;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(any(feature = "backend-ndarray", feature = "backend-wgpu"))]
    pub use burn_autodiff::Autodiff;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;
}
