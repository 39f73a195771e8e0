//! Crop Profile Module
//!
//! Static per-crop configuration: a scoring bias and the recommendation text
//! used when formatting results. Loaded once at startup, either from the
//! built-in defaults or from a JSON file; unknown crop identifiers resolve
//! to a neutral profile instead of failing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Recommendation templates for one crop, keyed by outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationTemplates {
    /// Care guidance when the leaf is classified healthy
    pub healthy: String,
    /// Treatment guidance when the leaf is classified affected
    pub affected: String,
}

/// Per-crop scoring bias and recommendation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropProfile {
    /// Lowercase crop identifier
    pub id: String,
    /// Signed bias added (scaled down) to the heuristic health score
    pub health_bias: f32,
    /// Issues commonly seen on this crop, most frequent first
    pub common_issues: Vec<String>,
    /// Outcome-specific recommendation text
    pub recommendations: RecommendationTemplates,
}

impl CropProfile {
    /// Neutral profile used for unrecognized crop identifiers
    pub fn neutral() -> Self {
        Self {
            id: "plant".to_string(),
            health_bias: 0.0,
            common_issues: vec!["root rot".to_string(), "nutrient imbalance".to_string()],
            recommendations: RecommendationTemplates {
                healthy: "Continue with the current care routine.".to_string(),
                affected: "Check the root system for rot or discoloration and adjust \
                           nutrient solution pH and concentration."
                    .to_string(),
            },
        }
    }
}

/// Lookup table of crop profiles with a neutral fallback.
///
/// Lookup is case-insensitive and tolerant of compound identifiers:
/// "Bell-Pepper" and "pepper (bell)" both resolve to the pepper profile
/// through substring matching against the registered ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropProfileRegistry {
    profiles: HashMap<String, CropProfile>,
}

impl Default for CropProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CropProfileRegistry {
    /// Builds the registry from the built-in profile table.
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in builtin_profiles() {
            profiles.insert(profile.id.clone(), profile);
        }
        Self { profiles }
    }

    /// Loads a registry from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be parsed or declares no
    /// profiles.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let registry: Self = serde_json::from_str(&data)?;
        if registry.profiles.is_empty() {
            return Err(Error::Config(format!(
                "crop registry at {} declares no profiles",
                path.display()
            )));
        }
        Ok(registry)
    }

    /// Resolves a crop identifier to its profile.
    ///
    /// Tries an exact lowercase match first, then substring matching in both
    /// directions, and falls back to [`CropProfile::neutral`] for anything
    /// unrecognized (including `None`).
    pub fn lookup(&self, crop: Option<&str>) -> CropProfile {
        let Some(crop) = crop else {
            return CropProfile::neutral();
        };
        let needle = crop.trim().to_lowercase();
        if needle.is_empty() {
            return CropProfile::neutral();
        }

        if let Some(profile) = self.profiles.get(&needle) {
            return profile.clone();
        }
        for (id, profile) in &self.profiles {
            if needle.contains(id.as_str()) || id.contains(&needle) {
                debug!(crop = %needle, profile = %id, "crop resolved by substring match");
                return profile.clone();
            }
        }

        debug!(crop = %needle, "unknown crop, using neutral profile");
        CropProfile::neutral()
    }

    /// Identifiers of all registered crops, sorted.
    pub fn supported_crops(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.profiles.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Built-in profile table.
///
/// Bias magnitudes come from the tuned per-crop adjustments of the upstream
/// classifier; the scorer scales them down by 0.1 before applying.
fn builtin_profiles() -> Vec<CropProfile> {
    let templates = |healthy: &str, affected: &str| RecommendationTemplates {
        healthy: healthy.to_string(),
        affected: affected.to_string(),
    };

    vec![
        CropProfile {
            id: "tomato".to_string(),
            health_bias: -0.5,
            common_issues: vec![
                "whiteflies".to_string(),
                "aphids".to_string(),
                "early blight".to_string(),
            ],
            recommendations: templates(
                "Monitor for early blight and ensure good air circulation. \
                 Support heavy fruit branches.",
                "Check for whiteflies, aphids and early blight, and remove \
                 affected leaves immediately.",
            ),
        },
        CropProfile {
            id: "pepper".to_string(),
            health_bias: -0.3,
            common_issues: vec!["thrips".to_string(), "bacterial spot".to_string()],
            recommendations: templates(
                "Maintain consistent moisture and watch for bacterial spot. \
                 Ensure adequate calcium.",
                "Check for thrips and bacterial spot, ensure good drainage \
                 and avoid overhead watering.",
            ),
        },
        CropProfile {
            id: "strawberry".to_string(),
            health_bias: -0.8,
            common_issues: vec!["spider mites".to_string(), "powdery mildew".to_string()],
            recommendations: templates(
                "Watch for powdery mildew and ensure good drainage. Remove \
                 runners for better fruit production.",
                "Look for spider mites and powdery mildew, improve air \
                 circulation and reduce humidity.",
            ),
        },
        CropProfile {
            id: "corn".to_string(),
            health_bias: 0.3,
            common_issues: vec!["common rust".to_string(), "leaf blight".to_string()],
            recommendations: templates(
                "Ensure adequate nitrogen and consistent watering through \
                 the silking stage.",
                "Inspect for rust pustules and leaf blight lesions; rotate \
                 away from corn next season.",
            ),
        },
        CropProfile {
            id: "palak".to_string(),
            health_bias: 0.1,
            common_issues: vec!["aphids".to_string(), "leaf miners".to_string()],
            recommendations: templates(
                "Leafy greens benefit from regular harvesting to encourage \
                 new growth. Maintain pH 6.0-6.5 and ensure adequate nitrogen.",
                "Check for aphids and leaf miners (common in leafy greens) \
                 and ensure proper air circulation to prevent downy mildew.",
            ),
        },
        CropProfile {
            id: "spinach".to_string(),
            health_bias: 0.1,
            common_issues: vec!["aphids".to_string(), "downy mildew".to_string()],
            recommendations: templates(
                "Leafy greens benefit from regular harvesting to encourage \
                 new growth. Maintain pH 6.0-6.5 and ensure adequate nitrogen.",
                "Check for aphids and leaf miners (common in leafy greens) \
                 and ensure proper air circulation to prevent downy mildew.",
            ),
        },
        CropProfile {
            id: "arai keerai".to_string(),
            health_bias: 0.1,
            common_issues: vec!["leaf miners".to_string(), "flea beetles".to_string()],
            recommendations: templates(
                "Harvest outer leaves regularly and keep the soil evenly \
                 moist to encourage tender regrowth.",
                "Check undersides of leaves for miners and beetles, and \
                 thin overcrowded plants for airflow.",
            ),
        },
        CropProfile {
            id: "siru keerai".to_string(),
            health_bias: 0.1,
            common_issues: vec!["leaf miners".to_string(), "aphids".to_string()],
            recommendations: templates(
                "Harvest outer leaves regularly and keep the soil evenly \
                 moist to encourage tender regrowth.",
                "Check undersides of leaves for miners and aphids, and \
                 thin overcrowded plants for airflow.",
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup_is_case_insensitive() {
        let registry = CropProfileRegistry::builtin();
        let profile = registry.lookup(Some("Tomato"));
        assert_eq!(profile.id, "tomato");
        assert!((profile.health_bias - -0.5).abs() < 1e-6);
    }

    #[test]
    fn test_substring_lookup() {
        let registry = CropProfileRegistry::builtin();
        assert_eq!(registry.lookup(Some("bell-pepper")).id, "pepper");
        assert_eq!(registry.lookup(Some("arai")).id, "arai keerai");
    }

    #[test]
    fn test_unknown_crop_gets_neutral_profile() {
        let registry = CropProfileRegistry::builtin();
        let profile = registry.lookup(Some("dragonfruit"));
        assert_eq!(profile.health_bias, 0.0);
        assert_eq!(profile.id, "plant");
    }

    #[test]
    fn test_missing_crop_gets_neutral_profile() {
        let registry = CropProfileRegistry::builtin();
        assert_eq!(registry.lookup(None).health_bias, 0.0);
        assert_eq!(registry.lookup(Some("  ")).health_bias, 0.0);
    }

    #[test]
    fn test_supported_crops_sorted() {
        let registry = CropProfileRegistry::builtin();
        let crops = registry.supported_crops();
        assert!(crops.len() >= 8);
        assert!(crops.windows(2).all(|w| w[0] < w[1]));
        assert!(crops.contains(&"strawberry".to_string()));
    }

    #[test]
    fn test_json_roundtrip() {
        let registry = CropProfileRegistry::builtin();
        let json = serde_json::to_string(&registry).unwrap();
        let restored: CropProfileRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.lookup(Some("corn")).health_bias,
            registry.lookup(Some("corn")).health_bias
        );
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crops.json");
        let json = serde_json::to_string(&CropProfileRegistry::builtin()).unwrap();
        std::fs::write(&path, json).unwrap();

        let registry = CropProfileRegistry::from_json_file(&path).unwrap();
        assert_eq!(registry.lookup(Some("palak")).health_bias, 0.1);

        std::fs::write(&path, r#"{"profiles":{}}"#).unwrap();
        assert!(CropProfileRegistry::from_json_file(&path).is_err());
    }
}
