//! Health Scoring Module
//!
//! Rule-based heuristic scorer that approximates the real model's decision
//! boundary from extracted features. An ordered table of indicator rules
//! accumulates a signed net score, the net score maps to a probability band,
//! and the final raw score is drawn from that band, adjusted by the crop
//! bias and clamped to [0.05, 0.95].
//!
//! Both the rule table and the band table are plain data so each entry can
//! be unit-tested and re-tuned against reference outputs without touching
//! code. The draw inside a band is an injectable [`Sampler`], uniform random
//! by default and pinnable for tests.

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crops::CropProfile;
use crate::error::{Error, Result};
use crate::features::FeatureVector;

/// Lower clamp for raw scores
pub const SCORE_MIN: f32 = 0.05;
/// Upper clamp for raw scores
pub const SCORE_MAX: f32 = 0.95;
/// Factor applied to the crop profile bias before it adjusts the score
pub const BIAS_SCALE: f32 = 0.1;

/// Which feature a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Brightness,
    Contrast,
    GreenDominance,
    ColorBalance,
    Saturation,
    TextureComplexity,
    EdgeIntensity,
}

impl FeatureKind {
    /// Reads the inspected feature out of a vector
    pub fn value(&self, features: &FeatureVector) -> f32 {
        match self {
            FeatureKind::Brightness => features.brightness,
            FeatureKind::Contrast => features.contrast,
            FeatureKind::GreenDominance => features.green_dominance,
            FeatureKind::ColorBalance => features.color_balance,
            FeatureKind::Saturation => features.saturation,
            FeatureKind::TextureComplexity => features.texture_complexity,
            FeatureKind::EdgeIntensity => features.edge_intensity,
        }
    }
}

/// Whether a rule fires inside or outside its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleTrigger {
    /// Fires when the feature lies within [low, high]
    Within,
    /// Fires when the feature lies below low or above high
    Outside,
}

/// One health indicator: a feature band and the signed weight it contributes
/// when triggered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRule {
    /// Stable rule name, used in diagnostics
    pub name: String,
    /// Feature the rule inspects
    pub feature: FeatureKind,
    /// Inclusive band bounds
    pub low: f32,
    pub high: f32,
    /// Fire inside or outside the band
    pub trigger: RuleTrigger,
    /// Signed contribution to the net score
    pub weight: i32,
}

impl IndicatorRule {
    /// Whether the rule fires for the given features
    pub fn fires(&self, features: &FeatureVector) -> bool {
        let value = self.feature.value(features);
        let within = value >= self.low && value <= self.high;
        match self.trigger {
            RuleTrigger::Within => within,
            RuleTrigger::Outside => !within,
        }
    }
}

/// Maps a minimum net score to a probability interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBand {
    /// Band applies when net score >= this value
    pub min_net: i32,
    /// Interval lower bound
    pub low: f32,
    /// Interval upper bound
    pub high: f32,
}

/// Draws the raw score from a probability interval.
///
/// The upstream classifier draws uniformly at random on every call, so
/// identical inputs can flip near a band boundary. Keeping the draw behind
/// this trait preserves that behavior as the default while letting tests
/// pin it.
pub trait Sampler: Send {
    /// Draws a value in [low, high]
    fn draw(&mut self, low: f32, high: f32) -> f32;
}

/// Uniform random draw over a seedable ChaCha RNG. Default sampler.
pub struct UniformSampler {
    rng: ChaCha8Rng,
}

impl UniformSampler {
    /// Sampler seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Sampler with a fixed seed for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for UniformSampler {
    fn draw(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

/// Deterministic sampler returning the band midpoint.
#[derive(Debug, Default, Clone)]
pub struct MidpointSampler;

impl Sampler for MidpointSampler {
    fn draw(&mut self, low: f32, high: f32) -> f32 {
        (low + high) / 2.0
    }
}

/// Breakdown of one scoring pass, kept for diagnostics and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    /// Signed tally from the rule table
    pub net_score: i32,
    /// Probability interval the net score mapped to
    pub band: (f32, f32),
    /// Final raw score after sampling, bias and clamping
    pub raw_score: f32,
    /// Names of the rules that fired
    pub fired_rules: Vec<String>,
}

/// Rule-table health scorer with a pluggable band sampler.
///
/// `Debug` is implemented manually because the boxed sampler is not `Debug`.
pub struct HealthScorer {
    rules: Vec<IndicatorRule>,
    bands: Vec<ScoreBand>,
    sampler: Mutex<Box<dyn Sampler>>,
}

impl std::fmt::Debug for HealthScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthScorer")
            .field("rules", &self.rules)
            .field("bands", &self.bands)
            .finish_non_exhaustive()
    }
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthScorer {
    /// Scorer with the default rule table, band table and uniform sampler
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            bands: default_bands(),
            sampler: Mutex::new(Box::new(UniformSampler::new())),
        }
    }

    /// Replaces the sampler (e.g. [`MidpointSampler`] or a seeded uniform one)
    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Mutex::new(Box::new(sampler));
        self
    }

    /// Replaces the rule table
    pub fn with_rules(mut self, rules: Vec<IndicatorRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the band table. Bands must be sorted by descending `min_net`
    /// and the table must not be empty; the last band is the catch-all every
    /// net score can fall into.
    pub fn with_bands(mut self, bands: Vec<ScoreBand>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::Config("band table must not be empty".to_string()));
        }
        self.bands = bands;
        Ok(self)
    }

    /// The active rule table
    pub fn rules(&self) -> &[IndicatorRule] {
        &self.rules
    }

    /// Scores the features against the rule table and maps the tally to a
    /// calibrated probability, applying the crop bias before clamping.
    pub fn score(&self, features: &FeatureVector, profile: &CropProfile) -> HealthScore {
        let mut net_score = 0i32;
        let mut fired_rules = Vec::new();
        for rule in &self.rules {
            if rule.fires(features) {
                net_score += rule.weight;
                fired_rules.push(rule.name.clone());
            }
        }

        let band = self.band_for(net_score);
        let sampled = {
            let mut sampler = self.sampler.lock().expect("sampler lock poisoned");
            sampler.draw(band.low, band.high)
        };
        let raw_score =
            (sampled + profile.health_bias * BIAS_SCALE).clamp(SCORE_MIN, SCORE_MAX);

        debug!(
            net_score,
            raw_score,
            crop = %profile.id,
            ?fired_rules,
            "heuristic score computed"
        );

        HealthScore {
            net_score,
            band: (band.low, band.high),
            raw_score,
            fired_rules,
        }
    }

    fn band_for(&self, net_score: i32) -> ScoreBand {
        for band in &self.bands {
            if net_score >= band.min_net {
                return *band;
            }
        }
        // Catch-all for tallies below every threshold; with_bands rejects
        // empty tables so the last band always exists
        *self.bands.last().expect("band table is never empty")
    }
}

/// Default indicator rules: the hand-tuned bands the heuristic classifier
/// ships with. Positive weights push toward healthy, negative toward
/// affected.
pub fn default_rules() -> Vec<IndicatorRule> {
    let rule = |name: &str, feature, low, high, trigger, weight| IndicatorRule {
        name: name.to_string(),
        feature,
        low,
        high,
        trigger,
        weight,
    };

    vec![
        rule(
            "brightness_out_of_range",
            FeatureKind::Brightness,
            0.2,
            0.8,
            RuleTrigger::Outside,
            -2,
        ),
        rule(
            "green_deficit",
            FeatureKind::GreenDominance,
            0.0,
            0.25,
            RuleTrigger::Within,
            -3,
        ),
        rule(
            "green_healthy_band",
            FeatureKind::GreenDominance,
            0.3,
            0.6,
            RuleTrigger::Within,
            3,
        ),
        rule(
            "texture_out_of_range",
            FeatureKind::TextureComplexity,
            0.01,
            0.3,
            RuleTrigger::Outside,
            -1,
        ),
        rule(
            "contrast_healthy_band",
            FeatureKind::Contrast,
            0.05,
            0.3,
            RuleTrigger::Within,
            1,
        ),
        rule(
            "color_cast",
            FeatureKind::ColorBalance,
            0.0,
            0.4,
            RuleTrigger::Outside,
            -2,
        ),
    ]
}

/// Default net-score to probability-interval banding, sorted by descending
/// `min_net`; the final entry is the catch-all.
pub fn default_bands() -> Vec<ScoreBand> {
    vec![
        ScoreBand { min_net: 4, low: 0.80, high: 0.95 },
        ScoreBand { min_net: 2, low: 0.60, high: 0.85 },
        ScoreBand { min_net: 0, low: 0.40, high: 0.70 },
        ScoreBand { min_net: -2, low: 0.20, high: 0.50 },
        ScoreBand { min_net: i32::MIN, low: 0.05, high: 0.30 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crops::{CropProfile, CropProfileRegistry};

    fn healthy_features() -> FeatureVector {
        FeatureVector {
            brightness: 0.5,
            contrast: 0.15,
            green_dominance: 0.6,
            color_balance: 0.05,
            saturation: 0.4,
            texture_complexity: 0.08,
            edge_intensity: 0.05,
        }
    }

    fn affected_features() -> FeatureVector {
        FeatureVector {
            brightness: 0.15,
            contrast: 0.02,
            green_dominance: 0.2,
            color_balance: 0.5,
            saturation: 0.1,
            texture_complexity: 0.005,
            edge_intensity: 0.01,
        }
    }

    fn scorer() -> HealthScorer {
        HealthScorer::new().with_sampler(MidpointSampler)
    }

    #[test]
    fn test_rule_brightness_out_of_range() {
        let rules = default_rules();
        let rule = rules.iter().find(|r| r.name == "brightness_out_of_range").unwrap();
        let mut features = healthy_features();
        assert!(!rule.fires(&features));
        features.brightness = 0.1;
        assert!(rule.fires(&features));
        features.brightness = 0.9;
        assert!(rule.fires(&features));
    }

    #[test]
    fn test_rule_green_deficit() {
        let rules = default_rules();
        let rule = rules.iter().find(|r| r.name == "green_deficit").unwrap();
        let mut features = healthy_features();
        assert!(!rule.fires(&features));
        features.green_dominance = 0.2;
        assert!(rule.fires(&features));
    }

    #[test]
    fn test_rule_green_healthy_band() {
        let rules = default_rules();
        let rule = rules.iter().find(|r| r.name == "green_healthy_band").unwrap();
        let mut features = healthy_features();
        assert!(rule.fires(&features), "0.6 is inside the inclusive band");
        features.green_dominance = 0.61;
        assert!(!rule.fires(&features));
        features.green_dominance = 0.3;
        assert!(rule.fires(&features));
    }

    #[test]
    fn test_rule_texture_out_of_range() {
        let rules = default_rules();
        let rule = rules.iter().find(|r| r.name == "texture_out_of_range").unwrap();
        let mut features = healthy_features();
        assert!(!rule.fires(&features));
        features.texture_complexity = 0.005;
        assert!(rule.fires(&features));
        features.texture_complexity = 0.5;
        assert!(rule.fires(&features));
    }

    #[test]
    fn test_rule_contrast_healthy_band() {
        let rules = default_rules();
        let rule = rules.iter().find(|r| r.name == "contrast_healthy_band").unwrap();
        assert!(rule.fires(&healthy_features()));
        assert!(!rule.fires(&affected_features()));
    }

    #[test]
    fn test_rule_color_cast() {
        let rules = default_rules();
        let rule = rules.iter().find(|r| r.name == "color_cast").unwrap();
        assert!(!rule.fires(&healthy_features()));
        assert!(rule.fires(&affected_features()));
    }

    #[test]
    fn test_band_boundaries() {
        let scorer = scorer();
        assert_eq!(scorer.band_for(5).low, 0.80);
        assert_eq!(scorer.band_for(4).low, 0.80);
        assert_eq!(scorer.band_for(3).low, 0.60);
        assert_eq!(scorer.band_for(2).low, 0.60);
        assert_eq!(scorer.band_for(0).low, 0.40);
        assert_eq!(scorer.band_for(-1).low, 0.20);
        assert_eq!(scorer.band_for(-2).low, 0.20);
        assert_eq!(scorer.band_for(-3).low, 0.05);
        assert_eq!(scorer.band_for(-100).low, 0.05);
    }

    #[test]
    fn test_saturated_green_frame_lands_in_top_band() {
        // greenDominance 0.6, brightness 0.5, contrast 0.15: the healthy
        // green band (+3) and the contrast band (+1) fire, nothing deducts.
        let score = scorer().score(&healthy_features(), &CropProfile::neutral());
        assert_eq!(score.net_score, 4);
        assert_eq!(score.band, (0.80, 0.95));
        assert!(score.raw_score > 0.5, "top band classifies healthy");
    }

    #[test]
    fn test_affected_features_land_in_bottom_band() {
        // green deficit (-3), texture (-1), color cast (-2), brightness (-2)
        let score = scorer().score(&affected_features(), &CropProfile::neutral());
        assert_eq!(score.net_score, -8);
        assert_eq!(score.band, (0.05, 0.30));
        assert!(score.raw_score <= 0.5);
    }

    #[test]
    fn test_raw_score_is_clamped() {
        let registry = CropProfileRegistry::builtin();
        let strawberry = registry.lookup(Some("strawberry"));
        let score = scorer().score(&affected_features(), &strawberry);
        // 0.175 midpoint - 0.08 bias stays above the clamp
        assert!(score.raw_score >= SCORE_MIN);
        assert!(score.raw_score <= SCORE_MAX);
    }

    #[test]
    fn test_crop_bias_shifts_score() {
        let registry = CropProfileRegistry::builtin();
        let neutral = scorer().score(&healthy_features(), &CropProfile::neutral());
        let tomato = scorer().score(&healthy_features(), &registry.lookup(Some("tomato")));
        let corn = scorer().score(&healthy_features(), &registry.lookup(Some("corn")));

        assert!((neutral.raw_score - tomato.raw_score - 0.05).abs() < 1e-5);
        assert!((corn.raw_score - neutral.raw_score - 0.03).abs() < 1e-5);
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let a = HealthScorer::new().with_sampler(UniformSampler::seeded(42));
        let b = HealthScorer::new().with_sampler(UniformSampler::seeded(42));
        let features = healthy_features();
        let profile = CropProfile::neutral();
        for _ in 0..10 {
            assert_eq!(
                a.score(&features, &profile).raw_score,
                b.score(&features, &profile).raw_score
            );
        }
    }

    #[test]
    fn test_uniform_draws_stay_inside_band() {
        let scorer = HealthScorer::new().with_sampler(UniformSampler::seeded(7));
        let features = healthy_features();
        let profile = CropProfile::neutral();
        for _ in 0..100 {
            let score = scorer.score(&features, &profile);
            assert!(score.raw_score >= 0.80 && score.raw_score <= 0.95);
        }
    }

    #[test]
    fn test_empty_band_table_is_rejected() {
        let err = HealthScorer::new().with_bands(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_custom_band_table() {
        let bands = vec![ScoreBand { min_net: i32::MIN, low: 0.40, high: 0.60 }];
        let scorer = HealthScorer::new()
            .with_bands(bands)
            .unwrap()
            .with_sampler(MidpointSampler);
        let score = scorer.score(&healthy_features(), &CropProfile::neutral());
        assert_eq!(score.band, (0.40, 0.60));
        assert!((score.raw_score - 0.50).abs() < 1e-5);
    }

    #[test]
    fn test_custom_rule_table() {
        let rules = vec![IndicatorRule {
            name: "always_dark".to_string(),
            feature: FeatureKind::Brightness,
            low: 0.0,
            high: 1.0,
            trigger: RuleTrigger::Within,
            weight: -5,
        }];
        let scorer = HealthScorer::new()
            .with_rules(rules)
            .with_sampler(MidpointSampler);
        let score = scorer.score(&healthy_features(), &CropProfile::neutral());
        assert_eq!(score.net_score, -5);
        assert_eq!(score.fired_rules, vec!["always_dark".to_string()]);
    }
}
