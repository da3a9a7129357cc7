//! Layer B similarity between feature vectors
//!
//! Features are divided by a per-feature scale and clamped to [-2, 2] so no
//! single unbounded statistic dominates; similarity is `exp(-k · distance)`,
//! which is 1 for identical vectors and decays towards 0.

use crate::features::{Feature, FeatureVector};
use serde::{Deserialize, Serialize};

const CLAMP: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledFeature {
    pub feature: Feature,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Multiplier on the best prototype similarity before it joins the raw score
    pub blend_weight: f64,
    /// Decay rate `k` in `exp(-k · distance)`
    pub sharpness: f64,
    pub fields: Vec<ScaledFeature>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        let field = |feature, scale| ScaledFeature { feature, scale };
        Self {
            blend_weight: 0.2,
            sharpness: 2.5,
            fields: vec![
                field(Feature::AvgMotion, 5.0),
                field(Feature::PeakMotion, 10.0),
                field(Feature::MotionStd, 5.0),
                field(Feature::CrowdRatio, 1.0),
                field(Feature::MotionBurstRatio, 1.0),
                field(Feature::PersonPresenceRatio, 1.0),
                field(Feature::ActiveMotionRatio, 1.0),
                field(Feature::LateMotionRatio, 1.0),
                field(Feature::AvgMovingObjects, 4.0),
                field(Feature::MaxMovingObjects, 6.0),
                field(Feature::CalmRatio, 1.0),
                field(Feature::MultiPersonRatio, 1.0),
            ],
        }
    }
}

impl SimilarityConfig {
    /// Scaled, clamped coordinates of `fv`
    pub fn embed(&self, fv: &FeatureVector) -> Vec<f64> {
        self.fields
            .iter()
            .map(|f| (fv.value(f.feature) / f.scale).clamp(-CLAMP, CLAMP))
            .collect()
    }

    /// Similarity in (0, 1]; 1 means identical under this schema.
    pub fn similarity(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        let distance = self
            .embed(a)
            .iter()
            .zip(self.embed(b).iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt();
        (-self.sharpness * distance).exp()
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(self.blend_weight.is_finite() && self.blend_weight >= 0.0) {
            return Err("similarity.blend_weight must be >= 0".to_string());
        }
        if !(self.sharpness.is_finite() && self.sharpness > 0.0) {
            return Err("similarity.sharpness must be > 0".to_string());
        }
        if let Some(bad) = self.fields.iter().find(|f| !(f.scale.is_finite() && f.scale > 0.0)) {
            return Err(format!("similarity scale for {} must be > 0", bad.feature.name()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy() -> FeatureVector {
        FeatureVector {
            frame_count: 20,
            avg_motion: 3.0,
            peak_motion: 8.0,
            crowd_ratio: 0.6,
            calm_ratio: 0.1,
            ..FeatureVector::zero()
        }
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let config = SimilarityConfig::default();
        assert_eq!(config.similarity(&busy(), &busy()), 1.0);
    }

    #[test]
    fn test_similarity_decreases_with_distance() {
        let config = SimilarityConfig::default();
        let near = FeatureVector { avg_motion: 3.5, ..busy() };
        let far = FeatureVector { avg_motion: 9.0, crowd_ratio: 0.0, ..busy() };

        let s_near = config.similarity(&busy(), &near);
        let s_far = config.similarity(&busy(), &far);
        assert!(s_near < 1.0 && s_near > s_far && s_far > 0.0);
    }

    #[test]
    fn test_embedding_is_clamped() {
        let config = SimilarityConfig::default();
        let extreme = FeatureVector { peak_motion: 1_000.0, ..busy() };
        assert!(config.embed(&extreme).iter().all(|v| v.abs() <= 2.0));
    }
}
