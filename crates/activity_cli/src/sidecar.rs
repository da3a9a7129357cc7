//! Observation sources
//!
//! Frame decoding and detection happen outside this tool. A vision pass
//! writes per-frame observations next to the clip, and [`SidecarSource`]
//! reads them back:
//!
//! - `clip.frames.csv` with header
//!   `index,timestamp,person_count,moving_objects,motion_magnitude`
//!   (`index` and `moving_objects` may be omitted)
//! - `clip.frames.json`, an array of observation objects
//!
//! The CSV sidecar wins when both exist.

use activity_core::{ClipMetadata, PerFrameObservation};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Time-based sampling applied to a clip's raw rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    /// Samples per second of video
    pub sample_rate: f64,
    /// Stop after this many sampled frames
    pub max_frames: Option<usize>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            sample_rate: 3.0,
            max_frames: None,
        }
    }
}

impl SamplingOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            bail!("sample rate must be a positive number, got {}", self.sample_rate);
        }
        Ok(())
    }

    /// Keep the first row of every `1 / sample_rate` slot, counted from the
    /// first row's timestamp. Rows with a non-finite timestamp are skipped.
    pub fn apply(&self, rows: &[PerFrameObservation]) -> Vec<PerFrameObservation> {
        let limit = self.max_frames.unwrap_or(usize::MAX);

        let mut kept = Vec::new();
        let mut start: Option<f64> = None;
        let mut last_slot = f64::NEG_INFINITY;
        for row in rows.iter().filter(|r| r.timestamp.is_finite()) {
            if kept.len() >= limit {
                break;
            }
            let origin = *start.get_or_insert(row.timestamp);
            let slot = ((row.timestamp - origin) * self.sample_rate + 1e-6).floor();
            if slot > last_slot {
                last_slot = slot;
                kept.push(*row);
            }
        }
        kept
    }
}

/// Sampled observations of one clip plus what is known about the source
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedClip {
    pub observations: Vec<PerFrameObservation>,
    pub metadata: ClipMetadata,
}

/// Produces per-frame observations for a video
pub trait ObservationSource {
    fn observe(&self, video: &Path, sampling: &SamplingOptions) -> Result<ObservedClip>;
}

/// Reads observations from sidecar files next to the video
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarSource;

impl SidecarSource {
    /// `clip.mp4` → (`clip.frames.csv`, `clip.frames.json`)
    pub fn sidecar_paths(video: &Path) -> (PathBuf, PathBuf) {
        (video.with_extension("frames.csv"), video.with_extension("frames.json"))
    }

    fn read_rows(video: &Path) -> Result<Vec<PerFrameObservation>> {
        let (csv_path, json_path) = Self::sidecar_paths(video);
        if csv_path.is_file() {
            read_csv(&csv_path)
        } else if json_path.is_file() {
            read_json(&json_path)
        } else {
            bail!(
                "Cannot read frames of {}: no sidecar at {} or {}",
                video.display(),
                csv_path.display(),
                json_path.display()
            )
        }
    }
}

impl ObservationSource for SidecarSource {
    fn observe(&self, video: &Path, sampling: &SamplingOptions) -> Result<ObservedClip> {
        sampling.validate()?;
        let rows = Self::read_rows(video)?;
        let observations = sampling.apply(&rows);

        let source = ClipMetadata::from_observations(&rows);
        let source_fps = if rows.len() > 1 && source.duration_seconds > 0.0 {
            Some((rows.len() - 1) as f64 / source.duration_seconds)
        } else {
            None
        };
        let metadata = ClipMetadata {
            frame_count: observations.len(),
            duration_seconds: source.duration_seconds,
            source_fps,
        };

        info!(
            video = %video.display(),
            rows = rows.len(),
            sampled = observations.len(),
            duration = metadata.duration_seconds,
            "observations loaded"
        );
        Ok(ObservedClip {
            observations,
            metadata,
        })
    }
}

fn read_csv(path: &Path) -> Result<Vec<PerFrameObservation>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open sidecar: {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<PerFrameObservation>().enumerate() {
        // header is line 1
        let line = line + 2;
        let row = record.with_context(|| format!("{}: bad row at line {}", path.display(), line))?;
        check_row(&row).with_context(|| format!("{}: bad row at line {}", path.display(), line))?;
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "csv sidecar parsed");
    Ok(rows)
}

fn read_json(path: &Path) -> Result<Vec<PerFrameObservation>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sidecar: {}", path.display()))?;
    let rows: Vec<PerFrameObservation> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse sidecar: {}", path.display()))?;
    for (i, row) in rows.iter().enumerate() {
        check_row(row).with_context(|| format!("{}: bad entry at index {}", path.display(), i))?;
    }
    debug!(path = %path.display(), rows = rows.len(), "json sidecar parsed");
    Ok(rows)
}

/// Timestamps and motion must be real numbers
fn check_row(row: &PerFrameObservation) -> Result<()> {
    if !row.timestamp.is_finite() {
        bail!("timestamp must be finite, got {}", row.timestamp);
    }
    if !row.motion_magnitude.is_finite() {
        bail!("motion_magnitude must be finite, got {}", row.motion_magnitude);
    }
    Ok(())
}
