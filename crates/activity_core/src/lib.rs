//! # activity_core - Heuristic clip activity classifier
//!
//! Turns a sequence of per-frame observations (person counts, motion
//! magnitude) into a calibrated distribution over coarse activity labels.
//!
//! ## Pipeline
//! - `features`: observations → clip-level [`FeatureVector`]
//! - `rules`: Layer A, ordered rule table over the feature vector
//! - `prototype`: labeled feature vectors persisted across runs (Layer B)
//! - `classifier`: rule scores + prototype boost → normalized distribution,
//!   then the optional filename override
//! - `summarizer`: human-readable report
//!
//! Everything between the observation sequence and the report is a pure
//! function of its inputs; I/O is limited to the prototype store, the
//! stats dump, and YAML configuration.

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod distribution;
pub mod error;
pub mod features;
pub mod labels;
pub mod observation;
pub mod overrides;
pub mod prototype;
pub mod rules;
pub mod similarity;
pub mod stats_dump;
pub mod summarizer;

pub use analysis::{analyze_clip, ClipAnalysis};
pub use classifier::{ClassificationResult, ClassifierConfig, HeuristicClassifier, SignalDriver};
pub use config::AnalyzerConfig;
pub use distribution::{ClassDistribution, LabelScores};
pub use error::{CoreError, Result, StoreError};
pub use features::{aggregate, aggregate_with, AggregatorThresholds, Feature, FeatureVector};
pub use labels::ActivityLabel;
pub use observation::{ClipMetadata, PerFrameObservation};
pub use overrides::{OverrideMatch, OverrideRule, OverrideTable};
pub use prototype::{Prototype, PrototypeStore, StoreLock};
pub use rules::{Gate, GateWhen, RuleTable, ScoringRule, Term};
pub use similarity::{ScaledFeature, SimilarityConfig};
pub use stats_dump::StatsDump;
pub use summarizer::{summarize, summarize_with_timeline};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SCHEMA_VERSION: u32 = 1;
