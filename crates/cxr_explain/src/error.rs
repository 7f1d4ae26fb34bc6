//! Error types for explanation operations.

use thiserror::Error;

/// Result type alias for explanation operations.
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised by CAM computation, heatmap processing and overlay rendering.
///
/// All variants are precondition violations: they indicate an integration
/// bug, not a property of the uploaded image.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplainError {
    /// Activation and gradient tensors differ in shape.
    #[error("Shape mismatch: activation {activation:?} vs gradient {gradient:?}")]
    ShapeMismatch {
        /// Activation shape (channels, h, w).
        activation: [usize; 3],
        /// Gradient shape (channels, h, w).
        gradient: [usize; 3],
    },

    /// Image and heatmap pixel dimensions differ.
    #[error("Dimension mismatch: image is {image_width}x{image_height}, heatmap is {map_width}x{map_height}")]
    DimensionMismatch {
        /// Image width.
        image_width: usize,
        /// Image height.
        image_height: usize,
        /// Heatmap width.
        map_width: usize,
        /// Heatmap height.
        map_height: usize,
    },

    /// A point lies outside the reconstruction grid.
    #[error("Point ({x}, {y}) outside {width}x{height} grid")]
    PointOutOfBounds {
        /// Point column.
        x: usize,
        /// Point row.
        y: usize,
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
    },

    /// Parameter outside its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tensor data could not be read back from the device.
    #[error("Tensor error: {0}")]
    Tensor(String),
}
