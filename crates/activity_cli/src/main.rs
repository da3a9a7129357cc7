//! Clip activity classifier CLI
//!
//! Classifies one clip from its per-frame observation sidecar, optionally
//! dumping stats or storing the run as a labeled training example.

#[cfg(feature = "cli")]
use activity_cli::{render_outcome, run, RunOptions, SamplingOptions, SidecarSource};
#[cfg(feature = "cli")]
use activity_core::ActivityLabel;
#[cfg(feature = "cli")]
use anyhow::Result;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "activity_cli", version)]
#[command(about = "Classify the activity in a video clip from its frame observations", long_about = None)]
struct Cli {
    /// Video to analyze (its .frames.csv / .frames.json sidecar is read)
    #[arg(short = 'v', long)]
    video: Option<PathBuf>,

    /// Directory searched for a video when --video is not given
    /// [default: videos/, then the current directory]
    #[arg(long)]
    search_dir: Vec<PathBuf>,

    /// Frames sampled per second of video
    #[arg(long, default_value_t = 3.0)]
    sample_rate: f64,

    /// Stop after this many sampled frames
    #[arg(long)]
    max_frames: Option<usize>,

    /// Write observations, features, and classification to this JSON file
    #[arg(long)]
    dump_stats: Option<PathBuf>,

    /// Store this run's features as a prototype for the label
    /// (normal, robbery, theft, assault, explosion, "road accident")
    #[arg(long)]
    train_label: Option<ActivityLabel>,

    /// Prototype store file
    #[arg(long, default_value = activity_core::prototype::DEFAULT_STORE_FILE)]
    prototype_store: PathBuf,

    /// YAML file overriding thresholds, rules, and filename keywords
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reclassify a saved stats dump instead of reading a sidecar
    #[arg(long, conflicts_with = "video")]
    from_stats: Option<PathBuf>,
}

#[cfg(feature = "cli")]
impl Cli {
    fn into_options(self) -> RunOptions {
        let search_dirs = if self.search_dir.is_empty() {
            activity_cli::default_search_dirs()
        } else {
            self.search_dir
        };
        RunOptions {
            video: self.video,
            search_dirs,
            sampling: SamplingOptions {
                sample_rate: self.sample_rate,
                max_frames: self.max_frames,
            },
            dump_stats: self.dump_stats,
            train_label: self.train_label,
            prototype_store: self.prototype_store,
            config: self.config,
            from_stats: self.from_stats,
        }
    }
}

/// `ACTIVITY_LOG`, then `RUST_LOG`, then `info`. Logs go to stderr.
#[cfg(feature = "cli")]
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let level = ["ACTIVITY_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let outcome = run(&cli.into_options(), &SidecarSource)?;
    println!("{}", render_outcome(&outcome));
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("activity_cli is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
