//! Stats dump: a frozen record of one run
//!
//! Holds the raw observations, the feature vector, and the classification, so
//! a run can be reclassified later from its features alone.

use crate::analysis::ClipAnalysis;
use crate::classifier::{ClassificationResult, HeuristicClassifier};
use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::features::FeatureVector;
use crate::observation::{ClipMetadata, PerFrameObservation};
use crate::prototype::PrototypeStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsDump {
    pub schema_version: u32,
    pub created_at: String,
    /// Path of the analyzed clip, as given to the run
    pub video: Option<String>,
    pub metadata: ClipMetadata,
    pub observations: Vec<PerFrameObservation>,
    pub features: FeatureVector,
    pub classification: ClassificationResult,
}

impl StatsDump {
    pub fn new(video: Option<&Path>, observations: &[PerFrameObservation], analysis: &ClipAnalysis) -> Self {
        Self {
            schema_version: crate::SCHEMA_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            video: video.map(|p| p.display().to_string()),
            metadata: analysis.metadata,
            observations: observations.to_vec(),
            features: analysis.features,
            classification: analysis.result.clone(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Classify the frozen features again, using the clip path as the hint.
    pub fn reclassify(&self, config: &AnalyzerConfig, store: &PrototypeStore) -> ClassificationResult {
        HeuristicClassifier::new(&config.classifier, store).classify(&self.features, self.video.as_deref())
    }
}
