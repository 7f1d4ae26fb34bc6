//! Request results and their transport view.

use std::time::Duration;

use cxr_core::{ClassScores, Diagnosis};
use cxr_explain::HeatmapPoint;
use image::RgbImage;
use serde::Serialize;

/// MIME type of the encoded overlay.
pub const OVERLAY_MIME: &str = "image/png";

/// Visual explanation of a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    /// Heatmap composited over the source image.
    pub overlay: RgbImage,
    /// Non-zero heatmap cells after thresholding.
    pub points: Vec<HeatmapPoint>,
}

/// Outcome of one request.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Predicted class.
    pub diagnosis: Diagnosis,
    /// Probability per class.
    pub probabilities: ClassScores,
    /// Present only when the predicted class carries localized evidence.
    pub explanation: Option<Explanation>,
    /// Name of the classifier.
    pub base_model_name: String,
    /// Wall time spent on the request.
    pub processing_time: Duration,
    /// Device the model ran on.
    pub processing_device: String,
}

impl AnalysisResult {
    /// Serializable view of the result.
    pub fn report(&self) -> AnalysisReport<'_> {
        AnalysisReport {
            diagnosis: self.diagnosis,
            probabilities: &self.probabilities,
            heatmap_image: self.explanation.as_ref().map(|e| OverlayInfo {
                mime: OVERLAY_MIME,
                dimensions: e.overlay.dimensions(),
            }),
            heatmap_points: self.explanation.as_ref().map(|e| e.points.as_slice()),
            base_model_name: &self.base_model_name,
            processing_time: self.processing_time.as_secs_f64(),
            processing_device: &self.processing_device,
        }
    }
}

/// Overlay metadata; the bytes travel separately.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OverlayInfo {
    /// Encoding of the overlay.
    pub mime: &'static str,
    /// `(width, height)` in pixels.
    pub dimensions: (u32, u32),
}

/// JSON-ready view of an [`AnalysisResult`].
#[derive(Debug, Serialize)]
pub struct AnalysisReport<'a> {
    /// Predicted class.
    pub diagnosis: Diagnosis,
    /// Probability per class.
    pub probabilities: &'a ClassScores,
    /// Overlay metadata, if explained.
    pub heatmap_image: Option<OverlayInfo>,
    /// Sparse heatmap, if explained.
    pub heatmap_points: Option<&'a [HeatmapPoint]>,
    /// Name of the classifier.
    pub base_model_name: &'a str,
    /// Seconds spent on the request.
    pub processing_time: f64,
    /// Device the model ran on.
    pub processing_device: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_core::ClassSet;

    fn result(explanation: Option<Explanation>) -> AnalysisResult {
        AnalysisResult {
            diagnosis: Diagnosis::ViralPneumonia,
            probabilities: ClassScores::new(&ClassSet::default(), &[0.1, 0.2, 0.7]).unwrap(),
            explanation,
            base_model_name: "cxrnet-small".to_string(),
            processing_time: Duration::from_millis(250),
            processing_device: "cpu".to_string(),
        }
    }

    #[test]
    fn test_report_without_explanation() {
        let json = serde_json::to_value(result(None).report()).unwrap();
        assert_eq!(json["diagnosis"], "viral_pneumonia");
        assert!(json["heatmap_image"].is_null());
        assert!(json["heatmap_points"].is_null());
        assert_eq!(json["processing_time"], 0.25);
    }

    #[test]
    fn test_report_with_explanation() {
        let explanation = Explanation {
            overlay: RgbImage::new(4, 2),
            points: vec![HeatmapPoint::new(1, 1, 0.5)],
        };
        let json = serde_json::to_value(result(Some(explanation)).report()).unwrap();
        assert_eq!(json["heatmap_image"]["mime"], "image/png");
        assert_eq!(json["heatmap_image"]["dimensions"][0], 4);
        assert_eq!(json["heatmap_points"][0][2], 0.5);
        assert_eq!(json["probabilities"]["viral_pneumonia"], 0.7f32 as f64);
    }
}
