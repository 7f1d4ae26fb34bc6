//! # cxr_models
//!
//! Chest X-ray classifiers for cxr-rs.
//!
//! - [`CxrNet`] - compact CNN whose convolutional stack is the explained layer
//! - [`checkpoint`] - loading and saving weights

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
mod cxrnet;

pub use checkpoint::{load_model, save_model, CheckpointError};
pub use cxrnet::{ConvBlock, CxrNet, CxrNetConfig, FEATURES_LAYER};
