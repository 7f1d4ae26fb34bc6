//! Pipeline configuration.

use std::path::Path;

use cxr_core::{ClassSet, DEFAULT_MAX_BYTES};
use cxr_explain::{OverlayConfig, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};

use crate::error::{InferError, Result};

/// Configuration for the [`InferencePipeline`](crate::InferencePipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side length of the square model input.
    pub input_size: usize,
    /// Minimum heatmap intensity kept after resizing.
    pub threshold: f32,
    /// Overlay rendering options.
    pub overlay: OverlayConfig,
    /// Name of the layer whose output is explained.
    pub target_layer: String,
    /// Model name reported with each result.
    pub base_model_name: String,
    /// Classes in model output order, with the no-finding class.
    pub class_set: ClassSet,
    /// Upload size limit in bytes.
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            threshold: DEFAULT_THRESHOLD,
            overlay: OverlayConfig::default(),
            target_layer: "features".to_string(),
            base_model_name: "cxrnet-small".to_string(),
            class_set: ClassSet::default(),
            max_upload_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Set the heatmap threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the overlay opacity.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.overlay.alpha = alpha;
        self
    }

    /// Set the model input size.
    #[must_use]
    pub fn with_input_size(mut self, input_size: usize) -> Self {
        self.input_size = input_size;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(InferError::ConfigError("input_size must be > 0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(InferError::ConfigError(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay.alpha) {
            return Err(InferError::ConfigError(format!(
                "alpha {} outside [0, 1]",
                self.overlay.alpha
            )));
        }
        if self.target_layer.is_empty() {
            return Err(InferError::ConfigError("target_layer is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::Diagnosis;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.input_size, 224);
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.overlay.alpha, 0.5);
        assert_eq!(config.class_set.no_finding(), Diagnosis::Normal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json(r#"{"threshold": 0.25, "overlay": {"alpha": 0.4}}"#)
            .unwrap();
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.overlay.alpha, 0.4);
        assert_eq!(config.input_size, 224);
        assert!(config.overlay.transparent_zero);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_json(r#"{"threshold": 1.5}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"input_size": 0}"#).is_err());
        assert!(PipelineConfig::default().with_alpha(-0.1).validate().is_err());
    }

    #[test]
    fn test_invalid_class_set_rejected() {
        let json = r#"{"class_set": {"classes": ["viral_pneumonia"], "no_finding": "normal"}}"#;
        assert!(matches!(
            PipelineConfig::from_json(json),
            Err(InferError::SerializationError(_))
        ));
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = PipelineConfig::default().with_threshold(0.3).with_input_size(128);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
    }
}
