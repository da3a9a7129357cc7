//! One analyzer run: locate → observe → classify → report, with optional
//! stats dump and training write.

use crate::discovery::{default_search_dirs, find_video_file};
use crate::sidecar::{ObservationSource, SamplingOptions};
use activity_core::prototype::DEFAULT_STORE_FILE;
use activity_core::{
    analyze_clip, summarize_with_timeline, ActivityLabel, AnalyzerConfig, ClipAnalysis,
    PerFrameObservation, PrototypeStore, StatsDump, StoreLock,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub video: Option<PathBuf>,
    pub search_dirs: Vec<PathBuf>,
    pub sampling: SamplingOptions,
    pub dump_stats: Option<PathBuf>,
    pub train_label: Option<ActivityLabel>,
    pub prototype_store: PathBuf,
    pub config: Option<PathBuf>,
    /// Reclassify a saved stats dump instead of reading a sidecar
    pub from_stats: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            video: None,
            search_dirs: default_search_dirs(),
            sampling: SamplingOptions::default(),
            dump_stats: None,
            train_label: None,
            prototype_store: PathBuf::from(DEFAULT_STORE_FILE),
            config: None,
            from_stats: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainedSample {
    pub label: ActivityLabel,
    pub store_path: PathBuf,
    /// Prototypes stored under `label` after the write
    pub label_count: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub video: Option<PathBuf>,
    pub observations: Vec<PerFrameObservation>,
    pub analysis: ClipAnalysis,
    pub report: String,
    pub stats_path: Option<PathBuf>,
    pub trained: Option<TrainedSample>,
}

pub fn run(opts: &RunOptions, source: &dyn ObservationSource) -> Result<RunOutcome> {
    let config = match &opts.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    let store = PrototypeStore::load(&opts.prototype_store)
        .with_context(|| format!("Failed to read prototype store: {}", opts.prototype_store.display()))?;

    let (video, observations, analysis) = match &opts.from_stats {
        Some(stats_path) => {
            let dump = StatsDump::read(stats_path)
                .with_context(|| format!("Failed to read stats dump: {}", stats_path.display()))?;
            info!(path = %stats_path.display(), "reclassifying saved stats");
            let result = dump.reclassify(&config, &store);
            let analysis = ClipAnalysis {
                metadata: dump.metadata,
                features: dump.features,
                result,
            };
            (dump.video.map(PathBuf::from), dump.observations, analysis)
        }
        None => {
            opts.sampling.validate()?;
            let video = find_video_file(opts.video.as_deref(), &opts.search_dirs)?;
            info!(video = %video.display(), sample_rate = opts.sampling.sample_rate, "analyzing clip");
            let clip = source.observe(&video, &opts.sampling)?;
            let hint = video.to_string_lossy().into_owned();
            let analysis = analyze_clip(&clip.observations, clip.metadata, Some(hint.as_str()), &config, &store);
            (Some(video), clip.observations, analysis)
        }
    };

    let stats_path = match &opts.dump_stats {
        Some(path) => {
            StatsDump::new(video.as_deref(), &observations, &analysis)
                .write(path)
                .with_context(|| format!("Failed to write stats dump: {}", path.display()))?;
            info!(path = %path.display(), "stats dump written");
            Some(path.clone())
        }
        None => None,
    };

    let trained = match opts.train_label {
        Some(label) => Some(store_training_sample(
            &opts.prototype_store,
            label,
            &analysis,
            video.as_deref(),
        )?),
        None => None,
    };

    let report = summarize_with_timeline(&analysis.result, &analysis.metadata, &observations);
    Ok(RunOutcome {
        video,
        observations,
        analysis,
        report,
        stats_path,
        trained,
    })
}

/// Append this run's features under `label`. The store is re-read under the
/// lock so concurrent trainers never drop each other's samples.
fn store_training_sample(
    store_path: &Path,
    label: ActivityLabel,
    analysis: &ClipAnalysis,
    video: Option<&Path>,
) -> Result<TrainedSample> {
    let _lock = StoreLock::acquire(store_path)
        .with_context(|| format!("Failed to lock prototype store: {}", store_path.display()))?;

    let mut store = PrototypeStore::load_for_update(store_path)
        .with_context(|| format!("Failed to read prototype store: {}", store_path.display()))?;
    let source = video.map(|v| v.display().to_string()).unwrap_or_default();
    store.add_with_source(label, analysis.features, &source);
    store
        .persist(store_path)
        .with_context(|| format!("Failed to save prototype store: {}", store_path.display()))?;

    let label_count = store.get(label).len();
    info!(%label, samples = label_count, store = %store_path.display(), "training sample stored");
    Ok(TrainedSample {
        label,
        store_path: store_path.to_path_buf(),
        label_count,
    })
}

/// Text printed at the end of a run
pub fn render_outcome(outcome: &RunOutcome) -> String {
    let mut lines = Vec::new();
    if let Some(video) = &outcome.video {
        lines.push(format!("Video: {}", video.display()));
    }
    lines.push(outcome.report.clone());
    lines.push(format!("Explanation: {}", outcome.analysis.result.explanation));

    lines.push("Distribution:".to_string());
    for (label, score) in outcome.analysis.result.distribution.scores().ranked() {
        lines.push(format!("  {:<14} {:.3}", label.as_str(), score));
    }

    if let Some(path) = &outcome.stats_path {
        lines.push(format!("Stats written to {}", path.display()));
    }
    if let Some(trained) = &outcome.trained {
        lines.push(format!(
            "Stored training sample as '{}' in {} ({} for this label)",
            trained.label,
            trained.store_path.display(),
            trained.label_count
        ));
    }
    lines.join("\n")
}
