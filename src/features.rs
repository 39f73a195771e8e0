//! Feature Extraction Module
//!
//! Computes the interpretable scalar statistics the heuristic pipeline is
//! built on. Every feature is a pure function of the input tensor; there is
//! no caching and no I/O.

use serde::{Deserialize, Serialize};

use crate::preprocess::{ImageTensor, TENSOR_HEIGHT, TENSOR_WIDTH};

/// Guard against division by zero in the ratio features
const EPSILON: f32 = 0.001;

/// Interpretable per-image statistics derived from one [`ImageTensor`].
///
/// Healthy reference ranges (used by the scorer's default rule table):
/// brightness 0.2-0.8, green dominance 0.3-0.6, contrast 0.05-0.3,
/// texture complexity 0.01-0.3, color balance below 0.4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean of all channel values, in [0, 1]
    pub brightness: f32,
    /// Root-mean-square deviation from the per-channel means
    pub contrast: f32,
    /// Share of the green channel in the total color mass, in [0, 1]
    pub green_dominance: f32,
    /// Red/blue imbalance ratio, >= 0
    pub color_balance: f32,
    /// Largest per-channel standard deviation relative to brightness,
    /// capped at 1
    pub saturation: f32,
    /// Mean absolute horizontal neighbor difference, averaged per channel
    pub texture_complexity: f32,
    /// Sobel gradient-magnitude mean over the grayscale reduction
    pub edge_intensity: f32,
}

/// Computes [`FeatureVector`]s from normalized image tensors.
#[derive(Debug, Default, Clone)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Creates a new feature extractor
    pub fn new() -> Self {
        Self
    }

    /// Extracts all features from the tensor in a single pass over the pixels
    /// plus one gradient pass.
    pub fn extract(&self, tensor: &ImageTensor) -> FeatureVector {
        let n = tensor.pixel_count() as f32;

        // Per-channel means
        let mut sums = [0.0f32; 3];
        for y in 0..TENSOR_HEIGHT {
            for x in 0..TENSOR_WIDTH {
                for c in 0..3 {
                    sums[c] += tensor.get(x, y, c);
                }
            }
        }
        let means = [sums[0] / n, sums[1] / n, sums[2] / n];
        let brightness = (means[0] + means[1] + means[2]) / 3.0;

        // Per-channel variances
        let mut sq_dev = [0.0f32; 3];
        for y in 0..TENSOR_HEIGHT {
            for x in 0..TENSOR_WIDTH {
                for c in 0..3 {
                    let d = tensor.get(x, y, c) - means[c];
                    sq_dev[c] += d * d;
                }
            }
        }
        let variances = [sq_dev[0] / n, sq_dev[1] / n, sq_dev[2] / n];
        let contrast = ((variances[0] + variances[1] + variances[2]) / 3.0).sqrt();

        let total_color = means[0] + means[1] + means[2] + EPSILON;
        let green_dominance = means[1] / total_color;
        let color_balance = (means[0] - means[2]).abs() / (means[0] + means[2] + EPSILON);

        let max_std = variances
            .iter()
            .map(|v| v.sqrt())
            .fold(0.0f32, f32::max);
        // Dark frames with one loud channel push the ratio past 1; cap it
        // so the feature stays in [0, 1] like the other ratios.
        let saturation = (max_std / (brightness + EPSILON)).min(1.0);

        FeatureVector {
            brightness,
            contrast,
            green_dominance,
            color_balance,
            saturation,
            texture_complexity: self.texture_complexity(tensor),
            edge_intensity: self.edge_intensity(tensor),
        }
    }

    /// Mean absolute difference between horizontally adjacent pixels,
    /// averaged over the three channels. A cheap gradient proxy that
    /// separates flat frames from rough or damaged leaf surfaces.
    fn texture_complexity(&self, tensor: &ImageTensor) -> f32 {
        let mut total = 0.0f32;
        let mut count = 0usize;
        for y in 0..TENSOR_HEIGHT {
            for x in 0..TENSOR_WIDTH - 1 {
                for c in 0..3 {
                    total += (tensor.get(x + 1, y, c) - tensor.get(x, y, c)).abs();
                    count += 1;
                }
            }
        }
        total / count as f32
    }

    /// Sobel gradient-magnitude mean over the grayscale reduction of the
    /// tensor, normalized by the kernel weight sum so values stay near [0, 1].
    fn edge_intensity(&self, tensor: &ImageTensor) -> f32 {
        let gray = |x: usize, y: usize| -> f32 {
            (tensor.get(x, y, 0) + tensor.get(x, y, 1) + tensor.get(x, y, 2)) / 3.0
        };

        let mut total = 0.0f32;
        let mut count = 0usize;
        for y in 1..TENSOR_HEIGHT - 1 {
            for x in 1..TENSOR_WIDTH - 1 {
                let gx = gray(x + 1, y - 1) + 2.0 * gray(x + 1, y) + gray(x + 1, y + 1)
                    - gray(x - 1, y - 1)
                    - 2.0 * gray(x - 1, y)
                    - gray(x - 1, y + 1);
                let gy = gray(x - 1, y + 1) + 2.0 * gray(x, y + 1) + gray(x + 1, y + 1)
                    - gray(x - 1, y - 1)
                    - 2.0 * gray(x, y - 1)
                    - gray(x + 1, y - 1);
                total += (gx * gx + gy * gy).sqrt() / 8.0;
                count += 1;
            }
        }
        total / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ImageTensor;

    fn extract(tensor: &ImageTensor) -> FeatureVector {
        FeatureExtractor::new().extract(tensor)
    }

    #[test]
    fn test_solid_gray_features() {
        let features = extract(&ImageTensor::solid(0.5, 0.5, 0.5));

        assert!((features.brightness - 0.5).abs() < 1e-5);
        assert!(features.contrast < 1e-5);
        assert!((features.green_dominance - 0.5 / 1.501).abs() < 1e-4);
        assert!(features.color_balance < 1e-5);
        assert!(features.saturation < 1e-4);
        assert!(features.texture_complexity < 1e-5);
        assert!(features.edge_intensity < 1e-5);
    }

    #[test]
    fn test_green_frame_dominance() {
        let features = extract(&ImageTensor::solid(0.1, 0.8, 0.1));
        // 0.8 / (0.1 + 0.8 + 0.1 + eps)
        assert!((features.green_dominance - 0.8 / 1.001).abs() < 1e-4);
        assert!(features.green_dominance > 0.6);
    }

    #[test]
    fn test_color_balance_on_red_cast() {
        let features = extract(&ImageTensor::solid(0.9, 0.3, 0.1));
        // |0.9 - 0.1| / (0.9 + 0.1 + eps)
        assert!((features.color_balance - 0.8 / 1.001).abs() < 1e-4);
    }

    #[test]
    fn test_feature_ranges_on_varied_tensor() {
        // Vertical split: left half dark green, right half bright yellow-green
        let mut tensor = ImageTensor::solid(0.1, 0.4, 0.1);
        for y in 0..224 {
            for x in 112..224 {
                tensor.set(x, y, 0, 0.7);
                tensor.set(x, y, 1, 0.9);
                tensor.set(x, y, 2, 0.2);
            }
        }
        let features = extract(&tensor);

        assert!((0.0..=1.0).contains(&features.brightness));
        assert!((0.0..=1.0).contains(&features.green_dominance));
        assert!(features.color_balance >= 0.0);
        assert!((0.0..=1.0).contains(&features.saturation));
        assert!(features.contrast > 0.01, "split image has color variance");
        assert!(
            features.texture_complexity > 0.0,
            "edge between halves produces texture"
        );
        assert!(features.edge_intensity > 0.0);
    }

    #[test]
    fn test_saturation_capped_on_dark_high_variance_tensor() {
        // Half black, half pure blue: low brightness, large blue-channel
        // deviation, an uncapped ratio would be near 3
        let mut tensor = ImageTensor::solid(0.0, 0.0, 0.0);
        for y in 0..224 {
            for x in 112..224 {
                tensor.set(x, y, 2, 1.0);
            }
        }
        let features = extract(&tensor);

        assert_eq!(features.saturation, 1.0);
        assert!(features.brightness < 0.2);
    }

    #[test]
    fn test_texture_separates_flat_from_rough() {
        let flat = extract(&ImageTensor::solid(0.4, 0.6, 0.3));

        // Vertical stripes, four pixels wide, alternating dark and light
        let mut rough = ImageTensor::solid(0.1, 0.1, 0.1);
        for y in 0..224 {
            for x in 0..224 {
                if (x / 4) % 2 == 0 {
                    for c in 0..3 {
                        rough.set(x, y, c, 0.9);
                    }
                }
            }
        }
        let rough = extract(&rough);

        assert!(rough.texture_complexity > flat.texture_complexity + 0.1);
        assert!(rough.edge_intensity > flat.edge_intensity);
    }
}
