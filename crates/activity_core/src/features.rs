//! Feature Aggregator
//!
//! Reduces a clip's per-frame observations into one fixed-schema
//! [`FeatureVector`]. Aggregation is a pure function of the observations and
//! thresholds; an empty clip yields the all-zero vector.
//!
//! Statistics are order-independent except `late_motion_ratio` and
//! `motion_trend`, which read the first/final thirds of the sequence as given.

use crate::observation::PerFrameObservation;
use serde::{Deserialize, Serialize};

/// Thresholds that turn raw per-frame signals into ratio features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorThresholds {
    /// A frame is crowded when `person_count > crowd` (2.0 → three or more people)
    pub crowd: f64,
    /// A frame is calm when `motion_magnitude < calm`
    pub calm: f64,
    /// Lone-actor motion: `person_count <= 1` and `motion_magnitude > solo_motion`
    pub solo_motion: f64,
    /// A frame is active when `motion_magnitude >= active`
    pub active: f64,
}

impl Default for AggregatorThresholds {
    fn default() -> Self {
        Self {
            crowd: 2.0,
            calm: 1.0,
            solo_motion: 1.2,
            active: 0.35,
        }
    }
}

/// Named features of the clip-level schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    FrameCount,
    AvgMotion,
    PeakMotion,
    MotionVariance,
    MotionStd,
    AvgPersonCount,
    MaxPersonCount,
    MedianPersonCount,
    CrowdRatio,
    CalmRatio,
    PersonPresenceRatio,
    MultiPersonRatio,
    SoloMotionRatio,
    MotionBurstRatio,
    ActiveMotionRatio,
    LateMotionRatio,
    MotionTrend,
    AvgMovingObjects,
    MaxMovingObjects,
    MotionPresenceRatio,
}

impl Feature {
    /// Schema order
    pub const ALL: [Feature; 20] = [
        Feature::FrameCount,
        Feature::AvgMotion,
        Feature::PeakMotion,
        Feature::MotionVariance,
        Feature::MotionStd,
        Feature::AvgPersonCount,
        Feature::MaxPersonCount,
        Feature::MedianPersonCount,
        Feature::CrowdRatio,
        Feature::CalmRatio,
        Feature::PersonPresenceRatio,
        Feature::MultiPersonRatio,
        Feature::SoloMotionRatio,
        Feature::MotionBurstRatio,
        Feature::ActiveMotionRatio,
        Feature::LateMotionRatio,
        Feature::MotionTrend,
        Feature::AvgMovingObjects,
        Feature::MaxMovingObjects,
        Feature::MotionPresenceRatio,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::FrameCount => "frame_count",
            Feature::AvgMotion => "avg_motion",
            Feature::PeakMotion => "peak_motion",
            Feature::MotionVariance => "motion_variance",
            Feature::MotionStd => "motion_std",
            Feature::AvgPersonCount => "avg_person_count",
            Feature::MaxPersonCount => "max_person_count",
            Feature::MedianPersonCount => "median_person_count",
            Feature::CrowdRatio => "crowd_ratio",
            Feature::CalmRatio => "calm_ratio",
            Feature::PersonPresenceRatio => "person_presence_ratio",
            Feature::MultiPersonRatio => "multi_person_ratio",
            Feature::SoloMotionRatio => "solo_motion_ratio",
            Feature::MotionBurstRatio => "motion_burst_ratio",
            Feature::ActiveMotionRatio => "active_motion_ratio",
            Feature::LateMotionRatio => "late_motion_ratio",
            Feature::MotionTrend => "motion_trend",
            Feature::AvgMovingObjects => "avg_moving_objects",
            Feature::MaxMovingObjects => "max_moving_objects",
            Feature::MotionPresenceRatio => "motion_presence_ratio",
        }
    }

    /// Phrase used by reports ("elevated crowd density")
    pub fn describe(self) -> &'static str {
        match self {
            Feature::FrameCount => "clip length",
            Feature::AvgMotion => "sustained motion",
            Feature::PeakMotion => "peak motion",
            Feature::MotionVariance | Feature::MotionStd => "motion volatility",
            Feature::AvgPersonCount | Feature::MedianPersonCount => "people per frame",
            Feature::MaxPersonCount => "peak head count",
            Feature::CrowdRatio => "crowd density",
            Feature::CalmRatio => "calm frames",
            Feature::PersonPresenceRatio => "human presence",
            Feature::MultiPersonRatio => "multi-person frames",
            Feature::SoloMotionRatio => "lone-actor motion",
            Feature::MotionBurstRatio => "motion bursts",
            Feature::ActiveMotionRatio => "active motion",
            Feature::LateMotionRatio => "late-clip activity",
            Feature::MotionTrend => "escalating motion",
            Feature::AvgMovingObjects => "moving-object density",
            Feature::MaxMovingObjects => "moving groups",
            Feature::MotionPresenceRatio => "visible movers",
        }
    }
}

/// Clip-level summary statistics; immutable once computed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureVector {
    pub frame_count: u32,
    pub avg_motion: f64,
    pub peak_motion: f64,
    pub motion_variance: f64,
    pub motion_std: f64,
    pub avg_person_count: f64,
    pub max_person_count: f64,
    pub median_person_count: f64,
    pub crowd_ratio: f64,
    pub calm_ratio: f64,
    pub person_presence_ratio: f64,
    pub multi_person_ratio: f64,
    pub solo_motion_ratio: f64,
    pub motion_burst_ratio: f64,
    pub active_motion_ratio: f64,
    pub late_motion_ratio: f64,
    pub motion_trend: f64,
    pub avg_moving_objects: f64,
    pub max_moving_objects: f64,
    pub motion_presence_ratio: f64,
}

impl FeatureVector {
    /// Empty-clip vector: every field zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// No frames were analyzed
    pub fn is_empty_clip(&self) -> bool {
        self.frame_count == 0
    }

    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::FrameCount => self.frame_count as f64,
            Feature::AvgMotion => self.avg_motion,
            Feature::PeakMotion => self.peak_motion,
            Feature::MotionVariance => self.motion_variance,
            Feature::MotionStd => self.motion_std,
            Feature::AvgPersonCount => self.avg_person_count,
            Feature::MaxPersonCount => self.max_person_count,
            Feature::MedianPersonCount => self.median_person_count,
            Feature::CrowdRatio => self.crowd_ratio,
            Feature::CalmRatio => self.calm_ratio,
            Feature::PersonPresenceRatio => self.person_presence_ratio,
            Feature::MultiPersonRatio => self.multi_person_ratio,
            Feature::SoloMotionRatio => self.solo_motion_ratio,
            Feature::MotionBurstRatio => self.motion_burst_ratio,
            Feature::ActiveMotionRatio => self.active_motion_ratio,
            Feature::LateMotionRatio => self.late_motion_ratio,
            Feature::MotionTrend => self.motion_trend,
            Feature::AvgMovingObjects => self.avg_moving_objects,
            Feature::MaxMovingObjects => self.max_moving_objects,
            Feature::MotionPresenceRatio => self.motion_presence_ratio,
        }
    }

    /// `(feature, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |&f| (f, self.value(f)))
    }
}

/// Aggregate with explicit crowd/calm thresholds and default solo/active thresholds.
pub fn aggregate(
    observations: &[PerFrameObservation],
    crowd_threshold: f64,
    calm_threshold: f64,
) -> FeatureVector {
    let thresholds = AggregatorThresholds {
        crowd: crowd_threshold,
        calm: calm_threshold,
        ..AggregatorThresholds::default()
    };
    aggregate_with(observations, &thresholds)
}

/// Aggregate a clip's observations into its feature vector.
///
/// Non-finite or negative motion readings are treated as 0 so the
/// statistics stay defined for any input.
pub fn aggregate_with(
    observations: &[PerFrameObservation],
    thresholds: &AggregatorThresholds,
) -> FeatureVector {
    if observations.is_empty() {
        return FeatureVector::zero();
    }

    let n = observations.len();
    let nf = n as f64;

    let motions: Vec<f64> = observations
        .iter()
        .map(|o| sanitize_motion(o.motion_magnitude))
        .collect();
    let people: Vec<f64> = observations.iter().map(|o| o.person_count as f64).collect();
    let movers: Vec<f64> = observations.iter().map(|o| o.moving_objects as f64).collect();

    let avg_motion = mean(&motions);
    let peak_motion = max(&motions);
    let motion_variance = motions.iter().map(|m| (m - avg_motion).powi(2)).sum::<f64>() / nf;

    let crowd_ratio = fraction(n, |i| people[i] > thresholds.crowd);
    let calm_ratio = fraction(n, |i| motions[i] < thresholds.calm);
    let person_presence_ratio = fraction(n, |i| people[i] >= 1.0);
    let multi_person_ratio = fraction(n, |i| people[i] >= 2.0);
    let solo_motion_ratio = fraction(n, |i| people[i] <= 1.0 && motions[i] > thresholds.solo_motion);
    let active_motion_ratio = fraction(n, |i| motions[i] >= thresholds.active);
    let motion_presence_ratio = fraction(n, |i| movers[i] >= 1.0);

    // A still clip has no bursts; otherwise a burst is a top-quartile frame
    let motion_burst_ratio = if peak_motion > 0.0 {
        let burst_threshold = percentile(&motions, 75.0);
        fraction(n, |i| motions[i] >= burst_threshold)
    } else {
        0.0
    };

    let segment = (n / 3).max(1);
    let early = &motions[..segment];
    let late = &motions[n - segment..];
    let late_motion_ratio =
        late.iter().filter(|&&m| m >= thresholds.active).count() as f64 / late.len() as f64;
    let motion_trend = mean(late) - mean(early);

    FeatureVector {
        frame_count: n as u32,
        avg_motion,
        peak_motion,
        motion_variance,
        motion_std: motion_variance.sqrt(),
        avg_person_count: mean(&people),
        max_person_count: max(&people),
        median_person_count: percentile(&people, 50.0),
        crowd_ratio,
        calm_ratio,
        person_presence_ratio,
        multi_person_ratio,
        solo_motion_ratio,
        motion_burst_ratio,
        active_motion_ratio,
        late_motion_ratio,
        motion_trend,
        avg_moving_objects: mean(&movers),
        max_moving_objects: max(&movers),
        motion_presence_ratio,
    }
}

/// Share of frame indices `0..n` satisfying `pred`
fn fraction(n: usize, pred: impl Fn(usize) -> bool) -> f64 {
    (0..n).filter(|&i| pred(i)).count() as f64 / n as f64
}

fn sanitize_motion(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
