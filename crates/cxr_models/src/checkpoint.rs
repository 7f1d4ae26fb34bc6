//! Model checkpointing and serialization utilities.
//!
//! Weights are stored with Burn's named MessagePack recorder at full precision.
//!
//! # Example
//!
//! ```rust,ignore
//! use cxr_models::checkpoint::{save_model, load_model};
//! use cxr_models::CxrNetConfig;
//!
//! let config = CxrNetConfig::new(3);
//! let model = config.init::<NdArray>(&device);
//!
//! save_model(&model, "cxrnet.mpk")?;
//! let loaded = load_model(&config, "cxrnet.mpk", &device)?;
//! ```

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};

use crate::cxrnet::{CxrNet, CxrNetConfig};

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// Checkpoint file does not exist.
    #[error("Checkpoint not found: {0}")]
    NotFound(String),
}

/// Save a model to a checkpoint file.
///
/// # Arguments
///
/// * `model` - The model to save
/// * `path` - Output path; the recorder appends its own extension
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let record = model.clone().into_record();
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
        .record(record, path.as_ref().to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))
}

/// Load a model record from a checkpoint file.
pub fn load_record<B, M>(path: impl AsRef<Path>, device: &B::Device) -> Result<M::Record>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
        .load(path.to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

/// Build a [`CxrNet`] from `config` and load its weights from `path`.
///
/// # Errors
///
/// Returns [`CheckpointError::NotFound`] if neither `path` nor `path.mpk`
/// exists, and [`CheckpointError::Load`] if the record does not match the
/// configured architecture.
pub fn load_model<B: Backend>(
    config: &CxrNetConfig,
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<CxrNet<B>> {
    let path = path.as_ref();
    if !path.exists() && !path.with_extension("mpk").exists() {
        return Err(CheckpointError::NotFound(path.display().to_string()));
    }
    let record = load_record::<B, CxrNet<B>>(path, device)?;
    tracing::info!(path = %path.display(), "loaded model weights");
    Ok(config.init::<B>(device).load_record(record))
}
