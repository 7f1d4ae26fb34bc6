//! One-request inference: classify, then explain when the prediction carries
//! localized evidence.
//!
//! ```text
//! Received -> Validated -> Classified -> Explained   -> Completed
//!                                     \-> Unexplained -/
//! ```
//!
//! Forward pass, class selection, the optional backward pass and CAM
//! extraction run under one lock per model. Resizing, thresholding and overlay
//! rendering run after the lock is released, on the request's own CAM.

use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use cxr_core::{ClassScores, Diagnosis, GradCamClassifier, GrayscaleImage, ImageValidator};
use cxr_explain::heatmap::to_sparse;
use cxr_explain::{grad_cam, ClassActivationMap, HeatmapProcessor, OverlayRenderer};
use parking_lot::Mutex;

use crate::config::PipelineConfig;
use crate::error::{InferError, Result};
use crate::hooked::{HookStats, HookedModel};
use crate::result::{AnalysisResult, Explanation};

/// Why a classified request carries no explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnexplainedReason {
    /// The prediction is the no-finding class.
    NoFinding,
    /// The explained layer's capture was empty.
    MissingCapture,
}

/// Branch taken after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// A CAM was extracted for the predicted class.
    Explained(ClassActivationMap),
    /// No backward pass was run, or its capture was unavailable.
    Unexplained(UnexplainedReason),
}

/// State reached once the forward pass and class selection are done.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Probability per class.
    pub scores: ClassScores,
    /// Predicted class.
    pub diagnosis: Diagnosis,
    /// Extracted evidence, private to this request.
    pub evidence: Evidence,
}

/// Serves classification requests against one loaded model.
pub struct InferencePipeline<B: AutodiffBackend, M> {
    model: Mutex<HookedModel<B, M>>,
    config: PipelineConfig,
    validator: ImageValidator,
    processor: HeatmapProcessor,
    renderer: OverlayRenderer,
    device: B::Device,
}

impl<B, M> InferencePipeline<B, M>
where
    B: AutodiffBackend,
    M: GradCamClassifier<B>,
{
    /// Take ownership of `model` and attach captures to the configured layer.
    ///
    /// # Errors
    ///
    /// Returns [`InferError::ConfigError`] for an invalid configuration.
    pub fn new(model: M, config: PipelineConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        let processor = HeatmapProcessor::new(config.threshold)?;
        let renderer = OverlayRenderer::new(config.overlay)?;
        let validator = ImageValidator::new(config.max_upload_bytes);
        let model = HookedModel::attach(model, &config.target_layer);

        Ok(Self {
            model: Mutex::new(model),
            config,
            validator,
            processor,
            renderer,
            device,
        })
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Label of the compute device.
    pub fn device_label(&self) -> String {
        format!("{:?}", self.device).to_lowercase()
    }

    /// Pass counters and capture slot state.
    pub fn hook_stats(&self) -> HookStats {
        self.model.lock().stats()
    }

    /// Detach the capture hooks; later requests are never explained.
    pub fn detach_hooks(&self) {
        self.model.lock().detach();
    }

    /// Validate raw upload bytes, then [`analyze`](Self::analyze) them.
    ///
    /// # Errors
    ///
    /// Returns [`InferError::Rejected`] for an invalid upload; other errors
    /// as for [`analyze`](Self::analyze).
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<AnalysisResult> {
        let start = Instant::now();
        let image = self.validator.validate(bytes)?;
        self.complete(&image, start)
    }

    /// Classify `image` and explain the prediction when it has local evidence.
    ///
    /// # Errors
    ///
    /// Any error is internal and final for this request; nothing is retried.
    pub fn analyze(&self, image: &GrayscaleImage) -> Result<AnalysisResult> {
        self.complete(image, Instant::now())
    }

    fn complete(&self, image: &GrayscaleImage, start: Instant) -> Result<AnalysisResult> {
        let Classification {
            scores,
            diagnosis,
            evidence,
        } = self.classify(image)?;

        let explanation = match evidence {
            Evidence::Explained(cam) => Some(self.explain(image, &cam)?),
            Evidence::Unexplained(reason) => {
                tracing::debug!(%diagnosis, ?reason, "skipping explanation");
                None
            }
        };

        let result = AnalysisResult {
            diagnosis,
            probabilities: scores,
            explanation,
            base_model_name: self.config.base_model_name.clone(),
            processing_time: start.elapsed(),
            processing_device: self.device_label(),
        };
        tracing::info!(
            diagnosis = %result.diagnosis,
            explained = result.explanation.is_some(),
            elapsed_ms = result.processing_time.as_millis() as u64,
            device = %result.processing_device,
            "request completed"
        );
        Ok(result)
    }

    /// Run the critical region: forward pass, class selection, optional
    /// backward pass and CAM extraction.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the model output or captures are unusable.
    pub fn classify(&self, image: &GrayscaleImage) -> Result<Classification> {
        let input = image.to_model_input::<B>(self.config.input_size, &self.device);

        let mut model = self.model.lock();
        model.clear_captures();
        let outcome = self.classify_locked(&mut model, input);
        // Leave no tensors behind for the next request, even on error.
        model.clear_captures();
        outcome
    }

    fn classify_locked(
        &self,
        model: &mut HookedModel<B, M>,
        input: burn::tensor::Tensor<B, 4>,
    ) -> Result<Classification> {
        let pass = model.forward(input);
        let probabilities = pass.probabilities()?;
        let scores = ClassScores::new(&self.config.class_set, &probabilities)?;
        let diagnosis = scores.argmax();
        tracing::debug!(%diagnosis, "classified");

        if self.config.class_set.is_no_finding(diagnosis) {
            return Ok(Classification {
                scores,
                diagnosis,
                evidence: Evidence::Unexplained(UnexplainedReason::NoFinding),
            });
        }

        let Some(activation) = model.take_activation() else {
            tracing::warn!(layer = model.layer(), "activation capture empty");
            return Ok(Classification {
                scores,
                diagnosis,
                evidence: Evidence::Unexplained(UnexplainedReason::MissingCapture),
            });
        };

        let class_index = self
            .config
            .class_set
            .index_of(diagnosis)
            .ok_or_else(|| InferError::BackwardError(format!("{diagnosis} has no logit")))?;
        model.backward(pass, class_index)?;

        let Some(gradient) = model.take_gradient() else {
            tracing::warn!(layer = model.layer(), "gradient capture empty");
            return Ok(Classification {
                scores,
                diagnosis,
                evidence: Evidence::Unexplained(UnexplainedReason::MissingCapture),
            });
        };

        let [batch, ..] = activation.dims();
        if batch != 1 {
            return Err(InferError::ForwardError(format!(
                "expected a single-sample activation, got batch {batch}"
            )));
        }
        let cam = grad_cam(activation.squeeze::<3>(0), gradient.squeeze::<3>(0))?;

        Ok(Classification {
            scores,
            diagnosis,
            evidence: Evidence::Explained(cam),
        })
    }

    fn explain(&self, image: &GrayscaleImage, cam: &ClassActivationMap) -> Result<Explanation> {
        let heatmap = self.processor.process(
            cam,
            image.height() as usize,
            image.width() as usize,
        )?;
        let points = to_sparse(&heatmap);
        let overlay = self.renderer.render(image, &heatmap)?;
        tracing::debug!(points = points.len(), degenerate = cam.is_degenerate(), "explained");
        Ok(Explanation { overlay, points })
    }
}
