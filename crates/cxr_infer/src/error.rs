//! Error types for inference.

use cxr_core::{CoreError, ValidationError};
use cxr_explain::ExplainError;
use thiserror::Error;

/// Result type alias for inference operations.
pub type Result<T> = std::result::Result<T, InferError>;

/// Errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum InferError {
    /// Upload rejected before inference.
    #[error("Rejected upload: {0}")]
    Rejected(#[from] ValidationError),

    /// Model forward pass produced unusable output.
    #[error("Forward pass failed: {0}")]
    ForwardError(String),

    /// Backward pass could not be run.
    #[error("Backward pass failed: {0}")]
    BackwardError(String),

    /// Explanation step failed.
    #[error("Explanation failed: {0}")]
    ExplainError(#[from] ExplainError),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] CoreError),

    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl InferError {
    /// Whether the request was refused because of its input.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected(_) | Self::CoreError(CoreError::Validation(_))
        )
    }

    /// Whether the failure indicates a bug or integration fault inside inference.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::ForwardError(_) | Self::BackwardError(_) | Self::ExplainError(_)
        ) || matches!(self, Self::CoreError(e) if !matches!(e, CoreError::Validation(_)))
    }
}

impl From<serde_json::Error> for InferError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}
