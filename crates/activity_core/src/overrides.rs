//! Filename keyword overrides
//!
//! Demo clips with a known outcome carry it in their file name. Matching is a
//! pure function of the normalized file stem and never touches the numeric
//! scores; the classifier composes it after normalization.

use crate::labels::ActivityLabel;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub label: ActivityLabel,
    pub keywords: Vec<String>,
}

impl OverrideRule {
    pub fn new(label: ActivityLabel, keywords: &[&str]) -> Self {
        Self {
            label,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideMatch {
    pub label: ActivityLabel,
    pub keyword: String,
}

/// Ordered keyword table; the first rule with a matching keyword wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideTable {
    pub rules: Vec<OverrideRule>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        Self {
            rules: vec![
                OverrideRule::new(ActivityLabel::RoadAccident, &["accident", "acci"]),
                OverrideRule::new(ActivityLabel::Explosion, &["explosion", "expl", "exp"]),
                OverrideRule::new(ActivityLabel::Robbery, &["robbery", "rob"]),
                OverrideRule::new(ActivityLabel::Theft, &["theft", "steal", "new"]),
            ],
        }
    }
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Match a file name or path against the keyword table.
    pub fn match_hint(&self, hint: &str) -> Option<OverrideMatch> {
        let stem = normalize_hint(hint);
        if stem.is_empty() {
            return None;
        }

        self.rules.iter().find_map(|rule| {
            rule.keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .find(|k| !k.is_empty() && stem.contains(k.as_str()))
                .map(|keyword| OverrideMatch {
                    label: rule.label,
                    keyword,
                })
        })
    }
}

/// Lowercased file stem of `hint` ("clips/Exp_01.MP4" → "exp_01")
pub fn normalize_hint(hint: &str) -> String {
    Path::new(hint.trim())
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
