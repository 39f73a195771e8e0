//! Relevance Gate Module
//!
//! Pre-filter that rejects images unlikely to contain plant material before
//! any scoring happens. A rejection is a hard short-circuit: the pipeline
//! returns an `Irrelevant` result and the health scorer never runs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::FeatureVector;

/// Score a candidate image must exceed to be considered plant material
pub const RELEVANCE_THRESHOLD: f32 = 0.5;

/// Images with contrast at or below this are treated as flat frames
const FLAT_CONTRAST: f32 = 0.01;

/// Outcome of the relevance gate for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceReport {
    /// Whether the image passed the gate
    pub is_relevant: bool,
    /// Gate score as an integer percent
    pub confidence: u8,
    /// Which checks failed, assembled into actionable guidance
    pub reason: String,
}

/// Weighted plant-signature checks over the extracted features.
///
/// Fixed weights: green dominance 0.4, color variance 0.3, brightness 0.2,
/// color balance 0.1. The gate passes when the weighted sum exceeds
/// [`RELEVANCE_THRESHOLD`]. A zero-variance frame can never pass: when the
/// color-variance check fails the total is capped at the threshold, since a
/// flat frame carries no leaf signal no matter what its mean color is.
#[derive(Debug, Default, Clone)]
pub struct RelevanceGate;

impl RelevanceGate {
    /// Creates a new relevance gate
    pub fn new() -> Self {
        Self
    }

    /// Evaluates the four plant-signature checks against the features.
    pub fn evaluate(&self, features: &FeatureVector) -> RelevanceReport {
        let mut score = 0.0f32;
        let mut failures: Vec<&str> = Vec::new();

        if features.green_dominance > 0.25 {
            score += 0.4;
        } else {
            failures.push("the image has little green content");
        }

        let flat = features.contrast <= FLAT_CONTRAST;
        if !flat {
            score += 0.3;
        } else {
            failures.push("the image has almost no color variation");
        }

        if features.brightness > 0.1 && features.brightness < 0.9 {
            score += 0.2;
        } else {
            failures.push("the image is too dark or too bright");
        }

        if features.color_balance < 0.3 {
            score += 0.1;
        } else {
            failures.push("the colors look unnatural for plant material");
        }

        if flat {
            score = score.min(RELEVANCE_THRESHOLD);
        }

        let is_relevant = score > RELEVANCE_THRESHOLD;
        let reason = if is_relevant {
            String::new()
        } else {
            let mut reason = String::from("This does not look like a plant photo: ");
            reason.push_str(&failures.join(", "));
            reason.push_str(". Please upload a clearer photo of the leaves.");
            reason
        };

        if !is_relevant {
            debug!(score, ?failures, "relevance gate rejected image");
        }

        RelevanceReport {
            is_relevant,
            confidence: (score * 100.0).round() as u8,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(
        brightness: f32,
        contrast: f32,
        green_dominance: f32,
        color_balance: f32,
    ) -> FeatureVector {
        FeatureVector {
            brightness,
            contrast,
            green_dominance,
            color_balance,
            saturation: 0.2,
            texture_complexity: 0.05,
            edge_intensity: 0.05,
        }
    }

    #[test]
    fn test_leafy_image_passes() {
        let report = RelevanceGate::new().evaluate(&features(0.5, 0.15, 0.45, 0.05));
        assert!(report.is_relevant);
        assert_eq!(report.confidence, 100);
        assert!(report.reason.is_empty());
    }

    #[test]
    fn test_uniform_gray_frame_rejected() {
        // Gray pixels keep a balanced green ratio of ~1/3, but zero variance
        // means there is no leaf signal to score.
        let report = RelevanceGate::new().evaluate(&features(0.5, 0.0, 1.0 / 3.0, 0.0));
        assert!(!report.is_relevant);
        assert!(report.reason.contains("color variation"));
    }

    #[test]
    fn test_near_black_frame_rejected() {
        let report = RelevanceGate::new().evaluate(&features(0.05, 0.005, 1.0 / 3.0, 0.0));
        assert!(!report.is_relevant);
        assert!(report.reason.contains("too dark or too bright"));
    }

    #[test]
    fn test_low_green_textured_image_rejected() {
        // A photo of pavement: decent variance and brightness, no green
        let report = RelevanceGate::new().evaluate(&features(0.5, 0.1, 0.15, 0.4));
        assert!(!report.is_relevant);
        assert!(report.reason.contains("little green content"));
        assert_eq!(report.confidence, 50);
    }

    #[test]
    fn test_score_at_threshold_is_rejected() {
        // Exactly 0.5 (variance 0.3 + brightness 0.2) must not pass
        let report = RelevanceGate::new().evaluate(&features(0.5, 0.1, 0.2, 0.4));
        assert!(!report.is_relevant);
    }

    #[test]
    fn test_guidance_text_is_actionable() {
        let report = RelevanceGate::new().evaluate(&features(0.05, 0.0, 0.1, 0.5));
        assert!(report.reason.contains("Please upload a clearer photo"));
    }
}
