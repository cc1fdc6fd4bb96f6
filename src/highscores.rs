//! Leaderboard and score submission
//!
//! Leaderboard documents come from a remote collection we do not control,
//! so every field is normalized before use. Scores are submitted once per
//! completed run; failures are logged and never retried.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::LEADERBOARD_SIZE;
use crate::persistence::Result;
use crate::sim::{SimEvent, World};

/// Name shown for entries without one
pub const ANONYMOUS: &str = "anonymous";

/// A single leaderboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u64,
    /// Level reached
    pub level: u32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

/// Non-finite or non-positive numbers read as zero
fn positive(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0)
}

impl LeaderboardEntry {
    /// Normalize one untyped leaderboard document
    pub fn from_doc(doc: &Value) -> Self {
        let name = ["name", "displayName"]
            .iter()
            .filter_map(|k| doc.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS);

        Self {
            name: name.chars().take(24).collect(),
            score: positive(doc.get("score")).floor() as u64,
            level: positive(doc.get("level")).min(u32::MAX as f64) as u32,
            timestamp: positive(doc.get("timestamp").or_else(|| doc.get("createdAt"))),
        }
    }
}

/// Top-N leaderboard, sorted by score descending
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<LeaderboardEntry>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from a batch of leaderboard documents
    pub fn from_docs(docs: &[Value]) -> Self {
        let mut entries: Vec<LeaderboardEntry> = docs.iter().map(LeaderboardEntry::from_doc).collect();
        // Equal scores: earlier first
        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.timestamp.total_cmp(&b.timestamp))
        });
        entries.truncate(LEADERBOARD_SIZE);
        Self { entries }
    }

    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < LEADERBOARD_SIZE {
            return true;
        }
        // Check if score beats the lowest entry
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Get the rank a score would achieve (1-indexed, None if doesn't qualify)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSubmission {
    pub run_id: u64,
    pub score: u64,
    pub level: u32,
    pub timestamp: f64,
}

/// Remote score sink (fire-and-forget)
pub trait ScoreSubmitter {
    fn submit(&mut self, submission: &ScoreSubmission) -> Result<()>;
}

/// Submits each finished run exactly once
#[derive(Debug, Default)]
pub struct RunReporter {
    last_run: Option<u64>,
}

impl RunReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit if the last step ended a run not yet reported
    pub fn observe(
        &mut self,
        world: &World,
        now: f64,
        submitter: &mut dyn ScoreSubmitter,
    ) -> Option<ScoreSubmission> {
        let score = world.events.iter().find_map(|e| match e {
            SimEvent::GameOver { score } => Some(*score),
            _ => None,
        })?;
        if self.last_run == Some(world.seed) {
            return None;
        }
        self.last_run = Some(world.seed);

        let submission = ScoreSubmission {
            run_id: world.seed,
            score,
            level: world.level,
            timestamp: now,
        };
        if let Err(e) = submitter.submit(&submission) {
            log::warn!("Score submission failed: {}", e);
        }
        Some(submission)
    }
}
