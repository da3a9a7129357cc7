//! Per-frame evidence produced by the external vision stage

use serde::{Deserialize, Serialize};

/// Signals extracted from one sampled frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerFrameObservation {
    /// Source frame index (0 when the producer does not report it)
    #[serde(default)]
    pub index: u64,
    /// Seconds from clip start; non-decreasing in a well-formed sequence
    pub timestamp: f64,
    pub person_count: u32,
    /// Foreground blobs large enough to count as moving objects
    #[serde(default)]
    pub moving_objects: u32,
    /// Mean optical-flow magnitude against the previous sampled frame
    pub motion_magnitude: f64,
}

impl PerFrameObservation {
    pub fn new(timestamp: f64, person_count: u32, motion_magnitude: f64) -> Self {
        Self {
            index: 0,
            timestamp,
            person_count,
            moving_objects: 0,
            motion_magnitude,
        }
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    pub fn with_moving_objects(mut self, moving_objects: u32) -> Self {
        self.moving_objects = moving_objects;
        self
    }
}

/// Clip-level facts the summarizer reports alongside the classification
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub frame_count: usize,
    pub duration_seconds: f64,
    /// Frame rate of the source video, when the producer knows it
    #[serde(default)]
    pub source_fps: Option<f64>,
}

impl ClipMetadata {
    /// Derive metadata from the observations alone (span of timestamps).
    pub fn from_observations(observations: &[PerFrameObservation]) -> Self {
        let (min_ts, max_ts) = observations
            .iter()
            .map(|o| o.timestamp)
            .filter(|t| t.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));

        let duration_seconds = if max_ts >= min_ts { max_ts - min_ts } else { 0.0 };

        Self {
            frame_count: observations.len(),
            duration_seconds,
            source_fps: None,
        }
    }
}
