//! One-call pipeline: observations → features → classification

use crate::classifier::{ClassificationResult, HeuristicClassifier};
use crate::config::AnalyzerConfig;
use crate::features::{aggregate_with, FeatureVector};
use crate::observation::{ClipMetadata, PerFrameObservation};
use crate::prototype::PrototypeStore;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ClipAnalysis {
    pub metadata: ClipMetadata,
    pub features: FeatureVector,
    pub result: ClassificationResult,
}

/// Aggregate and classify one clip. Zero observations are valid input and
/// produce the empty-clip vector.
pub fn analyze_clip(
    observations: &[PerFrameObservation],
    metadata: ClipMetadata,
    filename_hint: Option<&str>,
    config: &AnalyzerConfig,
    store: &PrototypeStore,
) -> ClipAnalysis {
    let features = aggregate_with(observations, &config.aggregator);
    let result = HeuristicClassifier::new(&config.classifier, store).classify(&features, filename_hint);

    info!(
        frames = features.frame_count,
        label = %result.predicted_label,
        score = result.predicted_score(),
        override_applied = result.override_applied,
        "clip classified"
    );

    ClipAnalysis {
        metadata,
        features,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ActivityLabel;

    #[test]
    fn test_empty_clip_does_not_fail() {
        let analysis = analyze_clip(
            &[],
            ClipMetadata::default(),
            None,
            &AnalyzerConfig::default(),
            &PrototypeStore::new(),
        );
        assert!(analysis.features.is_empty_clip());
        assert_eq!(analysis.result.predicted_label, ActivityLabel::Normal);
    }

    #[test]
    fn test_uses_configured_thresholds() {
        let obs = vec![PerFrameObservation::new(0.0, 3, 0.5)];
        let mut config = AnalyzerConfig::default();
        config.aggregator.crowd = 5.0;

        let analysis = analyze_clip(
            &obs,
            ClipMetadata::from_observations(&obs),
            None,
            &config,
            &PrototypeStore::new(),
        );
        assert_eq!(analysis.features.crowd_ratio, 0.0);
        assert_eq!(analysis.result.feature_vector, analysis.features);
    }
}
