//! Human-readable report for one classified clip
//!
//! Pure rendering; no classification logic lives here.

use crate::classifier::ClassificationResult;
use crate::observation::{ClipMetadata, PerFrameObservation};
use std::fmt::Write;

/// Frames with at least this many people count as crowd moments
const CROWD_PEOPLE: u32 = 3;
/// A frame is a spike when its motion exceeds this multiple of the clip average
const SPIKE_FACTOR: f64 = 1.5;

/// Label, score, runner-up, and the signals behind the prediction.
pub fn summarize(result: &ClassificationResult, meta: &ClipMetadata) -> String {
    let fv = &result.feature_vector;
    let (runner_label, runner_score) = result.distribution.runner_up();

    let mut lines = vec![
        format!(
            "Predicted class: {} ({:.2}).",
            result.predicted_label.as_str().to_uppercase(),
            result.predicted_score()
        ),
        format!("Runner-up: {} ({:.2}).", runner_label, runner_score),
        format!(
            "Analyzed duration: {:.1}s across {} sampled frames.",
            meta.duration_seconds, meta.frame_count
        ),
    ];

    if fv.is_empty_clip() {
        lines.push("No frames were analyzed, so the scores carry no evidence either way.".to_string());
    } else {
        lines.push(format!(
            "Motion: avg {:.2}, peak {:.2}, calm ratio {:.2}. People per frame: avg {:.1} (max {:.0}), crowd ratio {:.2}.",
            fv.avg_motion, fv.peak_motion, fv.calm_ratio, fv.avg_person_count, fv.max_person_count, fv.crowd_ratio
        ));
        lines.push(drivers_sentence(result));
    }

    if let Some(keyword) = &result.override_keyword {
        let heuristic = (result.rule_scores + result.prototype_boosts).argmax();
        lines.push(format!(
            "Label set by filename keyword '{}'; the heuristic evidence alone pointed to {}.",
            keyword, heuristic
        ));
    }

    lines.join("\n")
}

/// [`summarize`] plus notable moments and an early/middle/final segment view.
pub fn summarize_with_timeline(
    result: &ClassificationResult,
    meta: &ClipMetadata,
    observations: &[PerFrameObservation],
) -> String {
    let mut report = summarize(result, meta);

    let moments = notable_moments(result.feature_vector.avg_motion, observations);
    if !moments.is_empty() {
        report.push_str("\nNotable moments:");
        for line in moments {
            let _ = write!(report, "\n  - {line}");
        }
    }

    let segments = segment_view(observations);
    if !segments.is_empty() {
        report.push_str("\nSegment view:");
        for line in segments {
            let _ = write!(report, "\n  - {line}");
        }
    }
    report
}

fn drivers_sentence(result: &ClassificationResult) -> String {
    match result.drivers.as_slice() {
        [] => "No single signal stands out; the scores stay close to baseline.".to_string(),
        [only] => format!("Dominant signal: {}.", only.signal),
        [first, second, ..] => format!("Dominant signals: {} and {}.", first.signal, second.signal),
    }
}

fn notable_moments(avg_motion: f64, observations: &[PerFrameObservation]) -> Vec<String> {
    let mut lines = Vec::new();

    let mut spikes: Vec<&PerFrameObservation> = observations
        .iter()
        .filter(|o| o.motion_magnitude > avg_motion * SPIKE_FACTOR)
        .collect();
    spikes.sort_by(|a, b| b.motion_magnitude.total_cmp(&a.motion_magnitude));
    for spike in spikes.iter().take(3) {
        lines.push(format!(
            "Spike in motion around t={} (level {:.2}).",
            format_time(spike.timestamp),
            spike.motion_magnitude
        ));
    }

    let crowd: Vec<&PerFrameObservation> = observations
        .iter()
        .filter(|o| o.person_count >= CROWD_PEOPLE)
        .collect();
    let first = crowd.iter().min_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    let last = crowd.iter().max_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    if let (Some(first), Some(last)) = (first, last) {
        if crowd.len() == 1 {
            lines.push(format!(
                "Crowd detected near t={} with ~{} people.",
                format_time(first.timestamp),
                first.person_count
            ));
        } else {
            lines.push(format!(
                "Crowd present between t={} and t={}.",
                format_time(first.timestamp),
                format_time(last.timestamp)
            ));
        }
    }

    let peak = spikes.first().map(|o| o.motion_magnitude).unwrap_or(0.0);
    if peak > 0.0 {
        for surge in spikes
            .iter()
            .filter(|o| o.moving_objects >= 1 && o.motion_magnitude >= 0.8 * peak)
        {
            lines.push(format!(
                "Visible movers detected near t={} (~{} active regions).",
                format_time(surge.timestamp),
                surge.moving_objects
            ));
        }
    }
    lines
}

fn segment_view(observations: &[PerFrameObservation]) -> Vec<String> {
    if observations.is_empty() {
        return Vec::new();
    }
    let len = observations.len();
    let chunk = (len / 3).max(1);

    let mut lines = Vec::new();
    for (idx, name) in ["Early", "Middle", "Final"].iter().enumerate() {
        let start = (idx * chunk).min(len);
        let end = if idx < 2 { ((idx + 1) * chunk).min(len) } else { len };
        let segment = &observations[start..end];
        let (Some(head), Some(tail)) = (segment.first(), segment.last()) else {
            continue;
        };

        let n = segment.len() as f64;
        let avg_motion = segment.iter().map(|o| o.motion_magnitude).sum::<f64>() / n;
        let max_motion = segment.iter().map(|o| o.motion_magnitude).fold(0.0, f64::max);
        let avg_movers = segment.iter().map(|o| o.moving_objects as f64).sum::<f64>() / n;
        let max_movers = segment.iter().map(|o| o.moving_objects).max().unwrap_or(0);

        let motion_phrase = if avg_motion < 0.3 {
            "mostly still"
        } else if avg_motion < 0.8 {
            "showing steady movement"
        } else {
            "highly energetic"
        };
        let mover_phrase = if avg_movers < 0.5 {
            "almost no visible actors".to_string()
        } else if avg_movers < 1.5 {
            "one active subject".to_string()
        } else {
            format!("up to {max_movers} moving subjects")
        };

        lines.push(format!(
            "{name} phase ({}-{}): {motion_phrase} with {mover_phrase} (avg motion {avg_motion:.2}, peak {max_motion:.2}).",
            format_time(head.timestamp),
            format_time(tail.timestamp),
        ));
    }
    lines
}

/// `12.3s` under a minute, `MM:SS.s` otherwise
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let remainder = seconds - minutes as f64 * 60.0;
    format!("{minutes:02}:{remainder:04.1}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierConfig, HeuristicClassifier};
    use crate::features::aggregate;
    use crate::prototype::PrototypeStore;

    fn classify(obs: &[PerFrameObservation], hint: Option<&str>) -> ClassificationResult {
        let config = ClassifierConfig::default();
        let store = PrototypeStore::new();
        HeuristicClassifier::new(&config, &store).classify(&aggregate(obs, 2.0, 1.0), hint)
    }

    fn lively() -> Vec<PerFrameObservation> {
        (0..12)
            .map(|i| {
                let motion = if i == 7 { 6.0 } else { 0.4 };
                let people = if (4..6).contains(&i) { 4 } else { 1 };
                let movers = if i == 7 { 2 } else { 0 };
                PerFrameObservation::new(i as f64 * 0.5, people, motion).with_moving_objects(movers)
            })
            .collect()
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(12.34), "12.3s");
        assert_eq!(format_time(75.0), "01:15.0");
        assert_eq!(format_time(600.5), "10:00.5");
    }

    #[test]
    fn test_summary_mentions_label_and_runner_up() {
        let obs = lively();
        let result = classify(&obs, None);
        let meta = ClipMetadata::from_observations(&obs);
        let text = summarize(&result, &meta);

        let (runner, _) = result.distribution.runner_up();
        assert!(text.contains(&result.predicted_label.as_str().to_uppercase()));
        assert!(text.contains(&format!("Runner-up: {runner}")));
        if let Some(top) = result.drivers.first() {
            assert!(text.contains(&top.signal));
        }
        assert!(text.contains("across 12 sampled frames"));
    }

    #[test]
    fn test_override_is_called_out() {
        let obs = lively();
        let result = classify(&obs, Some("exp.mp4"));
        let text = summarize(&result, &ClipMetadata::from_observations(&obs));
        assert!(text.starts_with("Predicted class: EXPLOSION (0.90)."));
        assert!(text.contains("filename keyword 'exp'"));
    }

    #[test]
    fn test_empty_clip_summary() {
        let result = classify(&[], None);
        let text = summarize(&result, &ClipMetadata::default());
        assert!(text.starts_with("Predicted class: NORMAL (0.17)."));
        assert!(text.contains("no evidence"));
        assert!(!text.contains("Segment view"));
    }

    #[test]
    fn test_timeline_sections() {
        let obs = lively();
        let result = classify(&obs, None);
        let text = summarize_with_timeline(&result, &ClipMetadata::from_observations(&obs), &obs);

        assert!(text.contains("Notable moments:"));
        assert!(text.contains("Spike in motion around t=3.5s (level 6.00)."));
        assert!(text.contains("Crowd present between t=2.0s and t=2.5s."));
        assert!(text.contains("Visible movers detected near t=3.5s (~2 active regions)."));
        assert!(text.contains("Segment view:"));
        assert!(text.contains("Early phase (0.0s-1.5s): showing steady movement"));
        assert!(text.contains("Final phase (4.0s-5.5s)"));
    }
}
