//! Analyzer configuration
//!
//! All thresholds, rule weights, similarity scales, and override keywords are
//! policy, not algorithm: they default to the demo-tuned values and can be
//! replaced from a YAML file. Any section left out keeps its defaults.
//!
//! ```yaml
//! aggregator:
//!   crowd: 3.0
//! classifier:
//!   override_share: 0.95
//!   similarity:
//!     blend_weight: 0.3
//! ```

use crate::classifier::ClassifierConfig;
use crate::error::{CoreError, Result};
use crate::features::AggregatorThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub aggregator: AggregatorThresholds,
    pub classifier: ClassifierConfig,
}

impl AnalyzerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: AnalyzerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        debug!(path = %path.display(), rules = config.classifier.rules.rules.len(), "analyzer config loaded");
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.aggregator;
        if ![t.crowd, t.calm, t.solo_motion, t.active].iter().all(|v| v.is_finite()) {
            return Err(CoreError::InvalidConfig(
                "aggregator thresholds must be finite".to_string(),
            ));
        }
        self.classifier.validate().map_err(CoreError::InvalidConfig)
    }
}
