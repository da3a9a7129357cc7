//! Heuristic Classifier
//!
//! Layer A (rule table) and Layer B (best prototype similarity per label) are
//! summed and normalized into a [`ClassDistribution`]. A filename override, if
//! any, is applied to the normalized distribution only, so it never leaks into
//! the rule or similarity arithmetic. Classification is total: every feature
//! vector, including the all-zero one, yields a distribution.

use crate::distribution::{ClassDistribution, LabelScores};
use crate::features::FeatureVector;
use crate::labels::ActivityLabel;
use crate::overrides::OverrideTable;
use crate::prototype::PrototypeStore;
use crate::rules::RuleTable;
use crate::similarity::SimilarityConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub rules: RuleTable,
    pub similarity: SimilarityConfig,
    pub overrides: OverrideTable,
    /// Mass given to an overridden label; must lie in (0.5, 1]
    pub override_share: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: RuleTable::default(),
            similarity: SimilarityConfig::default(),
            overrides: OverrideTable::default(),
            override_share: 0.9,
        }
    }
}

impl ClassifierConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        self.rules.validate()?;
        self.similarity.validate()?;
        if !(self.override_share > 0.5 && self.override_share <= 1.0) {
            return Err(format!(
                "override_share must be in (0.5, 1], got {}",
                self.override_share
            ));
        }
        Ok(())
    }
}

/// A rule that pushed the predicted label up, for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDriver {
    pub signal: String,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub feature_vector: FeatureVector,
    pub distribution: ClassDistribution,
    pub predicted_label: ActivityLabel,
    pub override_applied: bool,
    /// Keyword that triggered the override
    pub override_keyword: Option<String>,
    /// Layer A raw scores
    pub rule_scores: LabelScores,
    /// Layer B boosts (already scaled by the blend weight)
    pub prototype_boosts: LabelScores,
    /// Top rule contributions to the predicted label
    pub drivers: Vec<SignalDriver>,
    pub explanation: String,
}

impl ClassificationResult {
    pub fn predicted_score(&self) -> f64 {
        self.distribution.get(self.predicted_label)
    }
}

pub struct HeuristicClassifier<'a> {
    config: &'a ClassifierConfig,
    store: &'a PrototypeStore,
}

impl<'a> HeuristicClassifier<'a> {
    pub fn new(config: &'a ClassifierConfig, store: &'a PrototypeStore) -> Self {
        Self { config, store }
    }

    pub fn classify(&self, features: &FeatureVector, filename_hint: Option<&str>) -> ClassificationResult {
        let rule_scores = self.config.rules.score(features);
        let prototype_boosts = self.prototype_boosts(features);
        let heuristic = ClassDistribution::normalize(&(rule_scores + prototype_boosts));

        let override_match = filename_hint.and_then(|hint| self.config.overrides.match_hint(hint));
        let distribution = match &override_match {
            Some(m) => {
                debug!(label = %m.label, keyword = %m.keyword, "filename override applied");
                heuristic.with_dominant(m.label, self.config.override_share)
            }
            None => heuristic,
        };

        let predicted_label = distribution.predicted();
        let drivers = self
            .config
            .rules
            .contributions(predicted_label, features)
            .into_iter()
            .take(2)
            .map(|(term, contribution)| SignalDriver {
                signal: term.describe(),
                contribution,
            })
            .collect();

        ClassificationResult {
            feature_vector: *features,
            distribution,
            predicted_label,
            override_applied: override_match.is_some(),
            override_keyword: override_match.map(|m| m.keyword),
            rule_scores,
            prototype_boosts,
            drivers,
            explanation: explain(predicted_label, features),
        }
    }

    /// `blend_weight × max similarity` for each label with stored prototypes.
    fn prototype_boosts(&self, features: &FeatureVector) -> LabelScores {
        let similarity = &self.config.similarity;
        let mut boosts = LabelScores::zeros();
        for (label, prototypes) in self.store.all() {
            let best = prototypes
                .iter()
                .map(|p| similarity.similarity(features, &p.features))
                .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
            if let Some(best) = best {
                boosts.set(label, similarity.blend_weight * best);
            }
        }
        boosts
    }
}

fn explain(label: ActivityLabel, fv: &FeatureVector) -> String {
    let template = match label {
        ActivityLabel::Robbery => "Large groups and repeated bursts of motion suggest a coordinated grab.",
        ActivityLabel::Theft => "Isolated motion while the scene stays sparse matches theft-like activity.",
        ActivityLabel::Assault => "Aggressive bursts with multiple participants point to an assault pattern.",
        ActivityLabel::Explosion => {
            "Sudden, volatile spikes with little human presence align with an explosion-like blast."
        }
        ActivityLabel::RoadAccident => {
            "Dense moving objects and directional bursts in a sparse crowd resemble a road incident."
        }
        ActivityLabel::Normal if fv.is_empty_clip() => "No frames were analyzed, so there is no evidence of unusual activity.",
        ActivityLabel::Normal => "Low motion and calm frames dominate the clip, indicating routine activity.",
    };
    let motion = (0.6 * (fv.avg_motion / 6.0).tanh() + 0.4 * (fv.peak_motion / 10.0).tanh()).min(1.0);
    let trend = (fv.motion_trend.max(0.0) / 2.0).tanh();
    format!(
        "{template} (motion={motion:.2}, bursts={:.2}, crowd={:.2}, people={:.2}, movers={:.2}, \
         active={:.2}, calm={:.2}, trend={trend:.2}).",
        fv.motion_burst_ratio,
        fv.crowd_ratio,
        fv.person_presence_ratio,
        fv.motion_presence_ratio,
        fv.active_motion_ratio,
        fv.calm_ratio,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::aggregate;
    use crate::observation::PerFrameObservation;

    fn still_clip() -> FeatureVector {
        let obs: Vec<_> = (0..30)
            .map(|i| PerFrameObservation::new(i as f64 / 3.0, 0, 0.0))
            .collect();
        aggregate(&obs, 2.0, 1.0)
    }

    fn brawl() -> FeatureVector {
        FeatureVector {
            frame_count: 40,
            avg_motion: 4.0,
            peak_motion: 9.0,
            motion_variance: 6.0,
            motion_std: 6.0_f64.sqrt(),
            avg_person_count: 3.5,
            max_person_count: 6.0,
            crowd_ratio: 0.7,
            calm_ratio: 0.05,
            person_presence_ratio: 1.0,
            multi_person_ratio: 0.9,
            motion_burst_ratio: 0.3,
            active_motion_ratio: 0.95,
            late_motion_ratio: 1.0,
            motion_trend: 1.0,
            ..FeatureVector::zero()
        }
    }

    fn total(dist: &ClassDistribution) -> f64 {
        dist.iter().map(|(_, s)| s).sum()
    }

    #[test]
    fn test_still_clip_is_normal() {
        let config = ClassifierConfig::default();
        let store = PrototypeStore::new();
        let result = HeuristicClassifier::new(&config, &store).classify(&still_clip(), None);

        assert_eq!(result.predicted_label, ActivityLabel::Normal);
        assert!(!result.override_applied);
        assert!((total(&result.distribution) - 1.0).abs() < 1e-9);
        assert!(!result.drivers.is_empty());
    }

    #[test]
    fn test_empty_clip_is_uniform_normal() {
        let config = ClassifierConfig::default();
        let store = PrototypeStore::new();
        let result = HeuristicClassifier::new(&config, &store).classify(&FeatureVector::zero(), None);

        assert_eq!(result.distribution, ClassDistribution::uniform());
        assert_eq!(result.predicted_label, ActivityLabel::Normal);
        assert!(result.explanation.starts_with("No frames were analyzed"));
    }

    #[test]
    fn test_exp_filename_forces_explosion() {
        let config = ClassifierConfig::default();
        let store = PrototypeStore::new();
        let classifier = HeuristicClassifier::new(&config, &store);

        for fv in [still_clip(), brawl(), FeatureVector::zero()] {
            let result = classifier.classify(&fv, Some("exp.mp4"));
            assert_eq!(result.predicted_label, ActivityLabel::Explosion);
            assert!(result.override_applied);
            assert_eq!(result.override_keyword.as_deref(), Some("exp"));
            assert!((total(&result.distribution) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unmatched_hint_changes_nothing() {
        let config = ClassifierConfig::default();
        let store = PrototypeStore::new();
        let classifier = HeuristicClassifier::new(&config, &store);

        let plain = classifier.classify(&brawl(), None);
        let hinted = classifier.classify(&brawl(), Some("parking_lot.mp4"));
        assert_eq!(plain, hinted);
    }

    #[test]
    fn test_busy_group_is_not_normal() {
        let config = ClassifierConfig::default();
        let store = PrototypeStore::new();
        let result = HeuristicClassifier::new(&config, &store).classify(&brawl(), None);
        assert_ne!(result.predicted_label, ActivityLabel::Normal);
        assert_eq!(result.prototype_boosts, LabelScores::zeros());
    }

    #[test]
    fn test_classify_is_idempotent() {
        let config = ClassifierConfig::default();
        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Assault, brawl());
        let classifier = HeuristicClassifier::new(&config, &store);

        let a = classifier.classify(&brawl(), Some("clip.mp4"));
        let b = classifier.classify(&brawl(), Some("clip.mp4"));
        for label in ActivityLabel::ALL {
            assert_eq!(a.distribution.get(label).to_bits(), b.distribution.get(label).to_bits());
        }
    }

    #[test]
    fn test_identical_prototype_boosts_label() {
        let config = ClassifierConfig::default();
        let empty = PrototypeStore::new();
        let before = HeuristicClassifier::new(&config, &empty).classify(&still_clip(), None);

        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Theft, still_clip());
        let after = HeuristicClassifier::new(&config, &store).classify(&still_clip(), None);

        assert!((after.prototype_boosts.get(ActivityLabel::Theft) - 0.2).abs() < 1e-12);
        assert!(after.distribution.get(ActivityLabel::Theft) > before.distribution.get(ActivityLabel::Theft));
    }

    #[test]
    fn test_best_match_not_sum() {
        let config = ClassifierConfig::default();
        let mut store = PrototypeStore::new();
        store.add(ActivityLabel::Robbery, brawl());
        store.add(ActivityLabel::Robbery, brawl());
        store.add(ActivityLabel::Robbery, still_clip());
        let result = HeuristicClassifier::new(&config, &store).classify(&brawl(), None);
        assert!((result.prototype_boosts.get(ActivityLabel::Robbery) - 0.2).abs() < 1e-12);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        prop_compose! {
            fn feature_vector()(
                frames in 0u32..200,
                avg in 0.0f64..12.0,
                extra in 0.0f64..12.0,
                var in 0.0f64..30.0,
                ratios in prop::array::uniform8(0.0f64..=1.0),
                people in 0.0f64..10.0,
                movers in 0.0f64..6.0,
                trend in -5.0f64..5.0,
            ) -> FeatureVector {
                FeatureVector {
                    frame_count: frames,
                    avg_motion: avg,
                    peak_motion: avg + extra,
                    motion_variance: var,
                    motion_std: var.sqrt(),
                    avg_person_count: people,
                    max_person_count: people * 1.5,
                    median_person_count: people,
                    crowd_ratio: ratios[0],
                    calm_ratio: ratios[1],
                    person_presence_ratio: ratios[2],
                    multi_person_ratio: ratios[3],
                    solo_motion_ratio: ratios[4],
                    motion_burst_ratio: ratios[5],
                    active_motion_ratio: ratios[6],
                    late_motion_ratio: ratios[7],
                    motion_trend: trend,
                    avg_moving_objects: movers,
                    max_moving_objects: movers * 2.0,
                    motion_presence_ratio: ratios[0],
                }
            }
        }

        proptest! {
            /// Property: every distribution is non-negative and sums to 1
            #[test]
            fn prop_distribution_normalized(fv in feature_vector(), hint in prop::option::of("[a-z]{1,8}\\.mp4")) {
                let config = ClassifierConfig::default();
                let store = PrototypeStore::new();
                let result = HeuristicClassifier::new(&config, &store).classify(&fv, hint.as_deref());
                prop_assert!(result.distribution.iter().all(|(_, s)| s >= 0.0));
                prop_assert!((total(&result.distribution) - 1.0).abs() < 1e-9);
            }

            /// Property: adding an identical prototype never lowers that label's score
            #[test]
            fn prop_prototype_monotonic(fv in feature_vector(), idx in 0usize..ActivityLabel::COUNT) {
                let label = ActivityLabel::ALL[idx];
                let config = ClassifierConfig::default();

                let mut store = PrototypeStore::new();
                store.add(ActivityLabel::Normal, FeatureVector { avg_motion: 7.0, ..fv });
                let before = HeuristicClassifier::new(&config, &store).classify(&fv, None);

                store.add(label, fv);
                let after = HeuristicClassifier::new(&config, &store).classify(&fv, None);
                prop_assert!(after.distribution.get(label) >= before.distribution.get(label) - 1e-12);
            }

            /// Property: a matching filename always wins
            #[test]
            fn prop_override_dominates(fv in feature_vector(), prefix in "[0-9_]{0,4}") {
                let config = ClassifierConfig::default();
                let mut store = PrototypeStore::new();
                store.add(ActivityLabel::Normal, fv);
                let result = HeuristicClassifier::new(&config, &store)
                    .classify(&fv, Some(&format!("{prefix}robbery.mov")));
                prop_assert_eq!(result.predicted_label, ActivityLabel::Robbery);
                prop_assert!(result.override_applied);
            }
        }
    }
}
