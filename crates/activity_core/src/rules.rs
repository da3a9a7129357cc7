//! Layer A: rule table over the feature vector
//!
//! Each label's raw score is `baseline + Σ weight · term`, clamped at 0.
//! Terms are continuous maps of the feature vector into [0, 1], so scores move
//! smoothly with the features. Gates are the only discontinuities: a gate
//! scales one label's score when a single feature crosses a fixed threshold.

use crate::distribution::LabelScores;
use crate::features::{Feature, FeatureVector};
use crate::labels::ActivityLabel;
use serde::{Deserialize, Serialize};

/// A continuous signal in [0, 1] derived from the feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    /// 0 at or below `lo`, 1 at or above `hi`, linear in between
    Ramp { feature: Feature, lo: f64, hi: f64 },
    /// `1 - ramp`
    InverseRamp { feature: Feature, lo: f64, hi: f64 },
    /// `tanh(max(0, value) / scale)`
    Saturate { feature: Feature, scale: f64 },
    /// `tanh(max(0, peak_motion - avg_motion) / scale)`: short, sharp motion
    Spike { scale: f64 },
    /// Product of the inner terms
    Product { terms: Vec<Term> },
}

impl Term {
    pub fn ramp(feature: Feature, lo: f64, hi: f64) -> Self {
        Term::Ramp { feature, lo, hi }
    }

    /// Ramp over a ratio feature, 0..1
    pub fn ratio(feature: Feature) -> Self {
        Term::Ramp { feature, lo: 0.0, hi: 1.0 }
    }

    pub fn inverse_ratio(feature: Feature) -> Self {
        Term::InverseRamp { feature, lo: 0.0, hi: 1.0 }
    }

    pub fn saturate(feature: Feature, scale: f64) -> Self {
        Term::Saturate { feature, scale }
    }

    pub fn eval(&self, fv: &FeatureVector) -> f64 {
        match self {
            Term::Ramp { feature, lo, hi } => ramp(fv.value(*feature), *lo, *hi),
            Term::InverseRamp { feature, lo, hi } => 1.0 - ramp(fv.value(*feature), *lo, *hi),
            Term::Saturate { feature, scale } => (fv.value(*feature).max(0.0) / scale).tanh(),
            Term::Spike { scale } => ((fv.peak_motion - fv.avg_motion).max(0.0) / scale).tanh(),
            Term::Product { terms } => terms.iter().map(|t| t.eval(fv)).product(),
        }
    }

    /// Feature this term mainly reads, for reports
    pub fn primary_feature(&self) -> Feature {
        match self {
            Term::Ramp { feature, .. }
            | Term::InverseRamp { feature, .. }
            | Term::Saturate { feature, .. } => *feature,
            Term::Spike { .. } => Feature::PeakMotion,
            Term::Product { terms } => terms
                .first()
                .map(Term::primary_feature)
                .unwrap_or(Feature::AvgMotion),
        }
    }

    /// "low calm frames" / "elevated crowd density"
    pub fn describe(&self) -> String {
        match self {
            Term::InverseRamp { feature, .. } => format!("low {}", feature.describe()),
            Term::Spike { .. } => "sudden motion spikes".to_string(),
            other => format!("elevated {}", other.primary_feature().describe()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Term::Ramp { feature, lo, hi } | Term::InverseRamp { feature, lo, hi } => {
                if !(lo.is_finite() && hi.is_finite() && hi > lo) {
                    return Err(format!(
                        "ramp over {} needs finite lo < hi (got {lo}..{hi})",
                        feature.name()
                    ));
                }
                Ok(())
            }
            Term::Saturate { feature, scale } => {
                if !(scale.is_finite() && *scale > 0.0) {
                    return Err(format!("saturate over {} needs scale > 0", feature.name()));
                }
                Ok(())
            }
            Term::Spike { scale } => {
                if !(scale.is_finite() && *scale > 0.0) {
                    return Err("spike needs scale > 0".to_string());
                }
                Ok(())
            }
            Term::Product { terms } => {
                if terms.is_empty() {
                    return Err("product needs at least one term".to_string());
                }
                terms.iter().try_for_each(Term::validate)
            }
        }
    }
}

fn ramp(value: f64, lo: f64, hi: f64) -> f64 {
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// `weight · term` added to `label`'s raw score; negative weights penalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub label: ActivityLabel,
    pub weight: f64,
    pub term: Term,
}

impl ScoringRule {
    pub fn new(label: ActivityLabel, weight: f64, term: Term) -> Self {
        Self { label, weight, term }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateWhen {
    Above,
    Below,
}

/// Multiply `label`'s clamped score by `factor` when `feature` is strictly
/// above/below `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub label: ActivityLabel,
    pub feature: Feature,
    pub when: GateWhen,
    pub threshold: f64,
    pub factor: f64,
}

impl Gate {
    fn triggered(&self, fv: &FeatureVector) -> bool {
        let value = fv.value(self.feature);
        match self.when {
            GateWhen::Above => value > self.threshold,
            GateWhen::Below => value < self.threshold,
        }
    }
}

/// Ordered rule table; rules apply in listed order, then gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    /// Score every label starts from on a non-empty clip
    pub baseline: f64,
    pub rules: Vec<ScoringRule>,
    pub gates: Vec<Gate>,
}

impl RuleTable {
    /// Raw Layer A scores. An empty clip carries no evidence and scores 0
    /// everywhere.
    pub fn score(&self, fv: &FeatureVector) -> LabelScores {
        if fv.is_empty_clip() {
            return LabelScores::zeros();
        }

        let mut scores = LabelScores::filled(self.baseline);
        for rule in &self.rules {
            let current = scores.get(rule.label);
            scores.set(rule.label, current + rule.weight * rule.term.eval(fv));
        }

        for label in ActivityLabel::ALL {
            scores.set(label, scores.get(label).max(0.0));
        }

        for gate in &self.gates {
            if gate.triggered(fv) {
                let current = scores.get(gate.label);
                scores.set(gate.label, current * gate.factor);
            }
        }
        scores
    }

    /// Positive rule contributions to `label`, largest first.
    pub fn contributions(&self, label: ActivityLabel, fv: &FeatureVector) -> Vec<(&Term, f64)> {
        let mut parts: Vec<(&Term, f64)> = self
            .rules
            .iter()
            .filter(|r| r.label == label)
            .map(|r| (&r.term, r.weight * r.term.eval(fv)))
            .filter(|(_, c)| *c > 0.0)
            .collect();
        parts.sort_by(|a, b| b.1.total_cmp(&a.1));
        parts
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(self.baseline.is_finite() && self.baseline >= 0.0) {
            return Err("baseline must be a non-negative number".to_string());
        }
        for rule in &self.rules {
            if !rule.weight.is_finite() {
                return Err(format!("rule for {} has a non-finite weight", rule.label));
            }
            rule.term.validate()?;
        }
        for gate in &self.gates {
            if !(gate.factor.is_finite() && gate.factor >= 0.0 && gate.threshold.is_finite()) {
                return Err(format!("gate for {} needs finite threshold and factor >= 0", gate.label));
            }
        }
        Ok(())
    }
}

impl Default for RuleTable {
    /// Demo-tuned weights for the six built-in labels.
    fn default() -> Self {
        use ActivityLabel::*;
        use Feature::*;

        let rules = vec![
            // coordinated group activity
            ScoringRule::new(Robbery, 0.25, Term::ratio(CrowdRatio)),
            ScoringRule::new(Robbery, 0.20, Term::ratio(MultiPersonRatio)),
            ScoringRule::new(Robbery, 0.20, Term::ramp(MaxMovingObjects, 0.0, 4.0)),
            ScoringRule::new(Robbery, 0.15, Term::ratio(MotionBurstRatio)),
            ScoringRule::new(Robbery, 0.10, Term::ratio(LateMotionRatio)),
            ScoringRule::new(Robbery, 0.10, Term::ratio(MotionPresenceRatio)),
            // lone actor in a sparse scene
            ScoringRule::new(Theft, 0.35, Term::ratio(SoloMotionRatio)),
            ScoringRule::new(Theft, 0.25, Term::ratio(ActiveMotionRatio)),
            ScoringRule::new(Theft, 0.15, Term::ratio(LateMotionRatio)),
            ScoringRule::new(Theft, 0.15, Term::inverse_ratio(CrowdRatio)),
            ScoringRule::new(Theft, 0.10, Term::ratio(MotionPresenceRatio)),
            // energetic bursts with several people
            ScoringRule::new(Assault, 0.30, Term::ratio(MotionBurstRatio)),
            ScoringRule::new(Assault, 0.12, Term::saturate(AvgMotion, 6.0)),
            ScoringRule::new(Assault, 0.08, Term::saturate(PeakMotion, 10.0)),
            ScoringRule::new(Assault, 0.20, Term::ratio(ActiveMotionRatio)),
            ScoringRule::new(Assault, 0.15, Term::ratio(MultiPersonRatio)),
            ScoringRule::new(Assault, 0.10, Term::saturate(MotionTrend, 2.0)),
            ScoringRule::new(Assault, 0.05, Term::ratio(MotionPresenceRatio)),
            // sharp volatile spike, few people
            ScoringRule::new(Explosion, 0.40, Term::Spike { scale: 4.0 }),
            ScoringRule::new(Explosion, 0.25, Term::saturate(MotionStd, 3.5)),
            ScoringRule::new(Explosion, 0.15, Term::ratio(MotionBurstRatio)),
            ScoringRule::new(Explosion, 0.10, Term::inverse_ratio(CalmRatio)),
            ScoringRule::new(Explosion, 0.10, Term::inverse_ratio(PersonPresenceRatio)),
            ScoringRule::new(Explosion, -0.40, Term::ratio(CrowdRatio)),
            ScoringRule::new(Explosion, -0.20, Term::ramp(AvgMovingObjects, 0.0, 3.0)),
            // dense moving objects, directional bursts, open scene
            ScoringRule::new(RoadAccident, 0.21, Term::ramp(AvgMovingObjects, 0.0, 3.0)),
            ScoringRule::new(RoadAccident, 0.14, Term::ratio(MotionPresenceRatio)),
            ScoringRule::new(RoadAccident, 0.20, Term::Spike { scale: 4.0 }),
            ScoringRule::new(RoadAccident, 0.09, Term::ratio(LateMotionRatio)),
            ScoringRule::new(RoadAccident, 0.06, Term::saturate(MotionTrend, 2.0)),
            ScoringRule::new(RoadAccident, 0.10, Term::ramp(MaxMovingObjects, 0.0, 4.0)),
            ScoringRule::new(RoadAccident, 0.10, Term::inverse_ratio(CalmRatio)),
            ScoringRule::new(RoadAccident, 0.10, Term::ratio(ActiveMotionRatio)),
            ScoringRule::new(RoadAccident, -0.30, Term::ratio(CrowdRatio)),
            ScoringRule::new(RoadAccident, -0.20, Term::ratio(PersonPresenceRatio)),
            ScoringRule::new(RoadAccident, -0.20, Term::ratio(CalmRatio)),
            // calm, routine footage
            ScoringRule::new(Normal, 0.30, Term::ratio(CalmRatio)),
            ScoringRule::new(Normal, 0.25, Term::inverse_ratio(ActiveMotionRatio)),
            ScoringRule::new(Normal, 0.20, Term::inverse_ratio(MotionBurstRatio)),
            ScoringRule::new(Normal, 0.15, Term::inverse_ratio(MotionPresenceRatio)),
            ScoringRule::new(Normal, 0.10, Term::inverse_ratio(LateMotionRatio)),
        ];

        let gates = vec![
            Gate {
                label: Explosion,
                feature: PersonPresenceRatio,
                when: GateWhen::Above,
                threshold: 0.7,
                factor: 0.6,
            },
            Gate {
                label: RoadAccident,
                feature: AvgMovingObjects,
                when: GateWhen::Below,
                threshold: 0.75,
                factor: 0.5,
            },
        ];

        Self {
            baseline: 0.02,
            rules,
            gates,
        }
    }
}
