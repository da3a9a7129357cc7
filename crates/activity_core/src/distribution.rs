//! Per-label score tables and the normalized class distribution

use crate::labels::ActivityLabel;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;

/// One non-negative score per fixed label, indexed in tie-break order.
///
/// Serializes as a `label -> score` map with every label present.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LabelScores {
    values: [f64; ActivityLabel::COUNT],
}

impl LabelScores {
    pub fn zeros() -> Self {
        Self::default()
    }

    pub fn filled(value: f64) -> Self {
        Self {
            values: [value; ActivityLabel::COUNT],
        }
    }

    pub fn get(&self, label: ActivityLabel) -> f64 {
        self.values[label.index()]
    }

    pub fn set(&mut self, label: ActivityLabel, value: f64) {
        self.values[label.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActivityLabel, f64)> + '_ {
        ActivityLabel::ALL.iter().map(move |&l| (l, self.values[l.index()]))
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Highest-scoring label; ties go to the earliest label in [`ActivityLabel::ALL`].
    pub fn argmax(&self) -> ActivityLabel {
        let mut best = ActivityLabel::ALL[0];
        for (label, score) in self.iter().skip(1) {
            if score > self.get(best) {
                best = label;
            }
        }
        best
    }

    /// Labels sorted by descending score, tie-break order preserved.
    pub fn ranked(&self) -> Vec<(ActivityLabel, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        // stable sort keeps ALL order among equal scores
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl Add for LabelScores {
    type Output = LabelScores;

    fn add(mut self, rhs: LabelScores) -> LabelScores {
        for (v, r) in self.values.iter_mut().zip(rhs.values.iter()) {
            *v += r;
        }
        self
    }
}

impl Serialize for LabelScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ActivityLabel::COUNT))?;
        for (label, score) in self.iter() {
            map.serialize_entry(&label, &score)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = LabelScores;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from activity label to score")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<LabelScores, M::Error> {
                let mut scores = LabelScores::zeros();
                while let Some((label, score)) = access.next_entry::<ActivityLabel, f64>()? {
                    scores.set(label, score);
                }
                Ok(scores)
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// Normalized scores: every label present, non-negative, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassDistribution(LabelScores);

impl ClassDistribution {
    /// Uniform mass over every label
    pub fn uniform() -> Self {
        Self(LabelScores::filled(1.0 / ActivityLabel::COUNT as f64))
    }

    /// Normalize raw scores to sum to 1.
    ///
    /// Negative or non-finite raw scores count as 0; when nothing remains the
    /// result is uniform.
    pub fn normalize(raw: &LabelScores) -> Self {
        let mut clean = LabelScores::zeros();
        for (label, score) in raw.iter() {
            let s = if score.is_finite() { score.max(0.0) } else { 0.0 };
            clean.set(label, s);
        }

        let total = clean.sum();
        if total <= 0.0 {
            return Self::uniform();
        }

        let mut out = LabelScores::zeros();
        for (label, score) in clean.iter() {
            out.set(label, score / total);
        }
        Self(out)
    }

    /// Give `label` a fixed `share` of the mass and spread the rest over the
    /// other labels in proportion to their current scores (uniformly when they
    /// hold no mass).
    pub fn with_dominant(&self, label: ActivityLabel, share: f64) -> Self {
        let share = share.clamp(0.0, 1.0);
        let remainder = 1.0 - share;

        let others: f64 = self
            .0
            .iter()
            .filter(|(l, _)| *l != label)
            .map(|(_, s)| s)
            .sum();
        let other_count = (ActivityLabel::COUNT - 1) as f64;

        let mut out = LabelScores::zeros();
        for (l, score) in self.0.iter() {
            let value = if l == label {
                share
            } else if others > 0.0 {
                remainder * score / others
            } else {
                remainder / other_count
            };
            out.set(l, value);
        }
        Self(out)
    }

    pub fn get(&self, label: ActivityLabel) -> f64 {
        self.0.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActivityLabel, f64)> + '_ {
        self.0.iter()
    }

    pub fn scores(&self) -> &LabelScores {
        &self.0
    }

    pub fn predicted(&self) -> ActivityLabel {
        self.0.argmax()
    }

    /// Best label other than the predicted one
    pub fn runner_up(&self) -> (ActivityLabel, f64) {
        let ranked = self.0.ranked();
        ranked[1]
    }
}
