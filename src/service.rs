//! Classification Service Module
//!
//! Orchestrates the full pipeline behind one `classify` call: decode and
//! normalize the image, gate on relevance, resolve the model source, score,
//! and format the result the UI layer renders. Each call is self-contained;
//! the only shared state is the model source resolver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crops::{CropProfile, CropProfileRegistry};
use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::model::{ModelSource, ModelSourceResolver, ResolverConfig};
use crate::preprocess::ImagePreprocessor;
use crate::relevance::RelevanceGate;
use crate::scoring::{HealthScorer, SCORE_MAX, SCORE_MIN};

/// Decision threshold separating healthy from affected
pub const CLASSIFICATION_THRESHOLD: f32 = 0.5;

/// Final classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// Raw score above the threshold
    Healthy,
    /// Raw score at or below the threshold
    Affected,
    /// Rejected by the relevance gate; no scoring happened
    Irrelevant,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Healthy => write!(f, "Healthy Plant"),
            Label::Affected => write!(f, "Affected Plant (Pest/Disease detected)"),
            Label::Irrelevant => write!(f, "Not a plant image"),
        }
    }
}

/// Which inference path produced a result's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreSource {
    /// Converted real-model artifact
    RealModel,
    /// Heuristic rule-table scorer
    Heuristic,
    /// Scoring was skipped (irrelevant image)
    Skipped,
}

impl std::fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreSource::RealModel => write!(f, "real model"),
            ScoreSource::Heuristic => write!(f, "heuristic simulation"),
            ScoreSource::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one classification call. Constructed fresh per call, owned by
/// the caller, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Final label
    pub label: Label,
    /// Probability-like score in [0.05, 0.95], or 0 for irrelevant images
    pub raw_score: f32,
    /// Confidence of the winning side as an integer percent
    pub confidence: u8,
    /// Decision threshold the label was derived against
    pub threshold: f32,
    /// Actionable recommendation text for the grower
    pub recommendation: String,
    /// Inference path that produced the score
    pub source: ScoreSource,
    /// Crop the recommendation was keyed by
    pub crop: String,
}

/// Cooperative cancellation flag for an in-flight classification.
///
/// Cloneable and shareable across tasks; cancelling flips the shared flag
/// and the pipeline bails out with [`Error::Cancelled`] at its next stage
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// New, not-yet-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the work holding this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The public entry point of the classification core.
pub struct ClassificationService {
    preprocessor: ImagePreprocessor,
    extractor: FeatureExtractor,
    gate: RelevanceGate,
    registry: CropProfileRegistry,
    scorer: HealthScorer,
    resolver: Arc<ModelSourceResolver>,
}

impl Default for ClassificationService {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl ClassificationService {
    /// Service with default components and the given resolver config
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_components(
            CropProfileRegistry::builtin(),
            HealthScorer::new(),
            Arc::new(ModelSourceResolver::new(config)),
        )
    }

    /// Service assembled from externally built components. Sharing the
    /// resolver `Arc` lets callers watch `status()` independently.
    pub fn with_components(
        registry: CropProfileRegistry,
        scorer: HealthScorer,
        resolver: Arc<ModelSourceResolver>,
    ) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(),
            extractor: FeatureExtractor::new(),
            gate: RelevanceGate::new(),
            registry,
            scorer,
            resolver,
        }
    }

    /// Classifies an encoded leaf image for the given crop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageDecode`] when the image cannot be decoded.
    /// Every other condition, including an irrelevant image and an
    /// unavailable model artifact, resolves to a completed
    /// [`ClassificationResult`].
    pub async fn classify(
        &self,
        image: &[u8],
        crop_type: Option<&str>,
    ) -> Result<ClassificationResult> {
        self.classify_with_cancel(image, crop_type, &CancelToken::new())
            .await
    }

    /// [`classify`](Self::classify) with cooperative cancellation. A
    /// cancelled call returns [`Error::Cancelled`].
    pub async fn classify_with_cancel(
        &self,
        image: &[u8],
        crop_type: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<ClassificationResult> {
        cancel.check()?;
        let tensor = self.preprocessor.decode(image)?;
        let features = self.extractor.extract(&tensor);
        drop(tensor);

        cancel.check()?;
        let relevance = self.gate.evaluate(&features);
        if !relevance.is_relevant {
            info!(confidence = relevance.confidence, "image rejected as irrelevant");
            return Ok(ClassificationResult {
                label: Label::Irrelevant,
                raw_score: 0.0,
                confidence: relevance.confidence,
                threshold: CLASSIFICATION_THRESHOLD,
                recommendation: relevance.reason,
                source: ScoreSource::Skipped,
                crop: self.registry.lookup(crop_type).id,
            });
        }

        cancel.check()?;
        let profile = self.registry.lookup(crop_type);
        let (raw_score, source) = match self.resolver.resolve().await {
            ModelSource::RealArtifact(model) => {
                // The artifact's logistic output can sit arbitrarily close
                // to 0 or 1; raw scores share the heuristic clamp.
                let p = model.predict(&features).clamp(SCORE_MIN, SCORE_MAX);
                debug!(raw_score = p, "real model inference");
                (p, ScoreSource::RealModel)
            }
            _ => {
                let score = self.scorer.score(&features, &profile);
                (score.raw_score, ScoreSource::Heuristic)
            }
        };

        cancel.check()?;
        Ok(self.build_result(raw_score, source, &profile))
    }

    /// Current model source status ("unresolved", "real model",
    /// "heuristic simulation")
    pub async fn status(&self) -> String {
        self.resolver.status().await
    }

    /// The resolver behind this service, for reset or independent status
    pub fn resolver(&self) -> &Arc<ModelSourceResolver> {
        &self.resolver
    }

    /// Crops the registry carries dedicated profiles for
    pub fn supported_crops(&self) -> Vec<String> {
        self.registry.supported_crops()
    }

    fn build_result(
        &self,
        raw_score: f32,
        source: ScoreSource,
        profile: &CropProfile,
    ) -> ClassificationResult {
        let label = if raw_score > CLASSIFICATION_THRESHOLD {
            Label::Healthy
        } else {
            Label::Affected
        };
        let winning = raw_score.max(1.0 - raw_score);
        let confidence = (winning * 100.0).round() as u8;

        ClassificationResult {
            label,
            raw_score,
            confidence,
            threshold: CLASSIFICATION_THRESHOLD,
            recommendation: format_recommendation(label, profile),
            source,
            crop: profile.id.clone(),
        }
    }
}

/// Assembles the grower-facing recommendation from the shared framing
/// sentences and the crop profile's template for the outcome.
fn format_recommendation(label: Label, profile: &CropProfile) -> String {
    match label {
        Label::Healthy => format!(
            "Your {} appears healthy! {} Monitor regularly for any changes \
             in leaf color or texture, and check for pests weekly as prevention.",
            profile.id, profile.recommendations.healthy
        ),
        Label::Affected => {
            let issues = if profile.common_issues.is_empty() {
                String::new()
            } else {
                format!(" Common issues for this crop: {}.", profile.common_issues.join(", "))
            };
            format!(
                "Your {} shows signs of pest or disease. Isolate the plant to \
                 prevent spread and inspect leaves and stems carefully. {}{} \
                 Consider applying an organic treatment like neem oil and \
                 monitor closely for 48-72 hours.",
                profile.id, profile.recommendations.affected, issues
            )
        }
        Label::Irrelevant => String::new(),
    }
}
