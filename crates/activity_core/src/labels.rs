//! Fixed activity label set
//!
//! The declaration order is the documented tie-break order: when several
//! labels share the maximum score, the one listed first wins. `Normal` leads
//! so that a clip with no evidence (uniform distribution) reads as normal.

use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityLabel {
    Normal,
    Robbery,
    Theft,
    Assault,
    Explosion,
    RoadAccident,
}

impl ActivityLabel {
    pub const COUNT: usize = 6;

    /// All labels in tie-break order
    pub const ALL: [ActivityLabel; Self::COUNT] = [
        ActivityLabel::Normal,
        ActivityLabel::Robbery,
        ActivityLabel::Theft,
        ActivityLabel::Assault,
        ActivityLabel::Explosion,
        ActivityLabel::RoadAccident,
    ];

    /// Position in [`ActivityLabel::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLabel::Normal => "normal",
            ActivityLabel::Robbery => "robbery",
            ActivityLabel::Theft => "theft",
            ActivityLabel::Assault => "assault",
            ActivityLabel::Explosion => "explosion",
            ActivityLabel::RoadAccident => "road accident",
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLabel {
    type Err = CoreError;

    /// Accepts the canonical name plus `_`/`-` separated spellings, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        ActivityLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownLabel(s.to_string()))
    }
}

impl Serialize for ActivityLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
