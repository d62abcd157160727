//! Feedback-learned item weights.
//!
//! A [`FeedbackTracker`] keeps a JSON history of `{feedback, item_scores}`
//! at a caller-chosen path. Positive feedback nudges the items that were
//! retrieved for a query up by 10% (capped at 2.0); negative feedback nudges
//! them down by 10% (floored at 0.5). Unknown items weigh 1.0.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ddifuse_core::cache::write_json_atomic;
use serde::{Deserialize, Serialize};
use tracing::warn;

const MIN_ITEM_SCORE: f64 = 0.5;
const MAX_ITEM_SCORE: f64 = 2.0;
const UP: f64 = 1.1;
const DOWN: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub retrieved_items: Vec<String>,
    pub response_quality: String,
    pub is_positive: bool,
    #[serde(default)]
    pub user_rating: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct FeedbackHistory {
    #[serde(default)]
    feedback: Vec<FeedbackEntry>,
    #[serde(default)]
    item_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub positive: usize,
    pub negative: usize,
    pub positive_ratio: f64,
    pub tracked_items: usize,
}

/// `good`, `positive` and `accurate` (any case) count as positive.
#[must_use]
pub fn is_positive_quality(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "good" | "positive" | "accurate"
    )
}

#[derive(Debug)]
pub struct FeedbackTracker {
    path: PathBuf,
    history: FeedbackHistory,
    item_scores: BTreeMap<String, f64>,
}

impl FeedbackTracker {
    /// Open the history at `path`. Missing or corrupt files start empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let history = load_history(&path);
        let item_scores = derive_item_scores(&history);
        Self {
            path,
            history,
            item_scores,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one judgement about the items retrieved for `query` and
    /// persist the history.
    ///
    /// # Errors
    ///
    /// Returns an error when the history file cannot be written. The
    /// in-memory state is updated either way.
    pub fn record(
        &mut self,
        query: &str,
        retrieved_items: &[String],
        response_quality: &str,
        user_rating: Option<f64>,
    ) -> Result<()> {
        let is_positive = is_positive_quality(response_quality);
        self.history.feedback.push(FeedbackEntry {
            timestamp: Utc::now(),
            query: query.to_string(),
            retrieved_items: retrieved_items.to_vec(),
            response_quality: response_quality.to_string(),
            is_positive,
            user_rating,
        });

        for item in retrieved_items {
            let current = self.item_score(item);
            let next = if is_positive {
                (current * UP).min(MAX_ITEM_SCORE)
            } else {
                (current * DOWN).max(MIN_ITEM_SCORE)
            };
            self.item_scores.insert(item.clone(), next);
        }

        self.save()
    }

    /// Learned weight for `item`; 1.0 when unseen.
    #[must_use]
    pub fn item_score(&self, item: &str) -> f64 {
        self.item_scores.get(item).copied().unwrap_or(1.0)
    }

    /// Multiply each base score (1.0 when absent) by the item's weight.
    #[must_use]
    pub fn adjust_scores(&self, items: &[String], base_scores: Option<&[f64]>) -> Vec<f64> {
        match base_scores {
            Some(base) => items
                .iter()
                .zip(base)
                .map(|(item, b)| b * self.item_score(item))
                .collect(),
            None => items.iter().map(|item| self.item_score(item)).collect(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> FeedbackStats {
        let total = self.history.feedback.len();
        let positive = self.history.feedback.iter().filter(|f| f.is_positive).count();
        FeedbackStats {
            total_feedback: total,
            positive,
            negative: total - positive,
            positive_ratio: if total > 0 {
                positive as f64 / total as f64
            } else {
                0.0
            },
            tracked_items: self.item_scores.len(),
        }
    }

    fn save(&mut self) -> Result<()> {
        self.history.item_scores.clone_from(&self.item_scores);
        write_json_atomic(&self.path, &self.history)
            .with_context(|| format!("failed to save feedback history {}", self.path.display()))
    }
}

fn load_history(path: &Path) -> FeedbackHistory {
    let Ok(raw) = std::fs::read(path) else {
        return FeedbackHistory::default();
    };
    serde_json::from_slice(&raw).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "corrupt feedback history, starting empty");
        FeedbackHistory::default()
    })
}

/// Ratio-based scores from the entries, raised to any higher saved score.
#[allow(clippy::cast_precision_loss)]
fn derive_item_scores(history: &FeedbackHistory) -> BTreeMap<String, f64> {
    let mut counts: HashMap<&str, (u32, u32)> = HashMap::new();
    for entry in &history.feedback {
        for item in &entry.retrieved_items {
            let c = counts.entry(item.as_str()).or_default();
            if entry.is_positive {
                c.0 += 1;
            } else {
                c.1 += 1;
            }
        }
    }

    let mut scores: BTreeMap<String, f64> = counts
        .into_iter()
        .map(|(item, (pos, neg))| {
            let ratio = f64::from(pos) / f64::from(pos + neg);
            (item.to_string(), ratio.mul_add(MAX_ITEM_SCORE - MIN_ITEM_SCORE, MIN_ITEM_SCORE))
        })
        .collect();

    for (item, saved) in &history.item_scores {
        let entry = scores.entry(item.clone()).or_insert(*saved);
        if *saved > *entry {
            *entry = *saved;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn positive_and_negative_feedback_move_scores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tracker = FeedbackTracker::open(dir.path().join("feedback/history.json"));

        tracker.record("warfarin aspirin", &items(&["bleeding"]), "good", Some(0.9)).expect("record");
        assert!((tracker.item_score("bleeding") - 1.1).abs() < 1e-12);

        tracker.record("warfarin aspirin", &items(&["nausea"]), "bad", None).expect("record");
        assert!((tracker.item_score("nausea") - 0.9).abs() < 1e-12);
        assert!((tracker.item_score("unknown") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scores_are_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tracker = FeedbackTracker::open(dir.path().join("h.json"));
        let one = items(&["x"]);
        for _ in 0..20 {
            tracker.record("q", &one, "accurate", None).expect("record");
        }
        assert!((tracker.item_score("x") - 2.0).abs() < f64::EPSILON);
        for _ in 0..40 {
            tracker.record("q", &one, "neutral", None).expect("record");
        }
        assert!((tracker.item_score("x") - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn history_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("h.json");
        {
            let mut tracker = FeedbackTracker::open(&path);
            tracker.record("q", &items(&["a", "b"]), "Good", None).expect("record");
            tracker.record("q", &items(&["b"]), "bad", None).expect("record");
        }
        let reopened = FeedbackTracker::open(&path);
        let stats = reopened.stats();
        assert_eq!(stats.total_feedback, 2);
        assert_eq!(stats.positive, 1);
        assert_eq!(stats.negative, 1);
        assert_eq!(stats.tracked_items, 2);
        // a: ratio score 2.0 beats saved 1.1
        assert!((reopened.item_score("a") - 2.0).abs() < 1e-12);
    }

    #[test]
    fn corrupt_history_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("h.json");
        std::fs::write(&path, b"[[[").expect("write");
        let tracker = FeedbackTracker::open(&path);
        assert_eq!(tracker.stats().total_feedback, 0);
    }

    #[test]
    fn adjust_scores_multiplies_weights() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut tracker = FeedbackTracker::open(dir.path().join("h.json"));
        tracker.record("q", &items(&["a"]), "good", None).expect("record");
        let adjusted = tracker.adjust_scores(&items(&["a", "z"]), Some(&[2.0, 3.0]));
        assert!((adjusted[0] - 2.2).abs() < 1e-12);
        assert!((adjusted[1] - 3.0).abs() < 1e-12);
        assert_eq!(tracker.adjust_scores(&items(&["z"]), None), vec![1.0]);
    }
}
