//! Error types for cxr_core.

use thiserror::Error;

use crate::diagnosis::Diagnosis;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in cxr_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The no-finding class is not part of the class list.
    #[error("No-finding class {0} is not among the model classes")]
    MissingNoFinding(Diagnosis),

    /// A class appears more than once in the class list.
    #[error("Duplicate class in class set: {0}")]
    DuplicateClass(Diagnosis),

    /// Probability vector length does not match the class set.
    #[error("Score count mismatch: expected {expected} classes, got {got}")]
    ScoreCount {
        /// Number of declared classes.
        expected: usize,
        /// Number of scores provided.
        got: usize,
    },

    /// Raw pixel buffer does not match the declared dimensions.
    #[error("Invalid image buffer: {width}x{height} needs {expected} bytes, got {got}")]
    InvalidBuffer {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Required buffer length.
        expected: usize,
        /// Actual buffer length.
        got: usize,
    },

    /// Upload rejected by the image validator.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Image encoding failed.
    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// Tensor data could not be read back from the device.
    #[error("Tensor readback failed: {0}")]
    Readback(String),
}

/// Reasons an uploaded image is rejected before it reaches inference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Zero-length upload.
    #[error("Invalid file size: empty upload")]
    Empty,

    /// Upload exceeds the configured limit.
    #[error("Invalid file size: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Upload size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Content does not match any known image signature.
    #[error("Invalid file type: unrecognized content")]
    UnknownFormat,

    /// Recognized format that is not on the allow-list.
    #[error("Invalid file type: {0} is not accepted")]
    UnsupportedFormat(String),

    /// Signature matched but decoding failed.
    #[error("Invalid image: {0}")]
    Decode(String),
}
