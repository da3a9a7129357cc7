//! Clip activity CLI library
//!
//! Everything the `activity_cli` binary does, minus argument parsing:
//! locating the clip, reading its observation sidecar, and running the
//! classify / dump / train flow against `activity_core`.

pub mod discovery;
pub mod run;
pub mod sidecar;

pub use discovery::{default_search_dirs, find_video_file, list_video_files, VIDEO_EXTENSIONS};
pub use run::{render_outcome, run, RunOptions, RunOutcome, TrainedSample};
pub use sidecar::{ObservationSource, ObservedClip, SamplingOptions, SidecarSource};
