//! Response history and the recent-history stopping rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StoppingConfig;
use crate::item::{AssessmentStage, ItemId, TrialType};

/// One scored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub item_id: ItemId,
    pub trial_type: TrialType,
    pub stage: AssessmentStage,
    pub correct: bool,
    pub at: DateTime<Utc>,
}

/// Append-only, time-ordered log of responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseHistory {
    entries: Vec<ResponseEntry>,
}

impl ResponseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ResponseEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ResponseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Test-stage responses, oldest first.
    pub fn test_responses(&self) -> impl DoubleEndedIterator<Item = &ResponseEntry> {
        self.entries.iter().filter(|e| e.stage.is_test())
    }

    pub fn test_count(&self) -> usize {
        self.test_responses().count()
    }

    /// Incorrect responses among the most recent `window` test responses.
    pub fn recent_incorrect(&self, window: usize) -> usize {
        self.test_responses()
            .rev()
            .take(window)
            .filter(|e| !e.correct)
            .count()
    }
}

/// Ends a session once too many recent test responses were incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppingRule {
    pub enabled: bool,
    pub window: usize,
    pub max_incorrect: usize,
}

impl StoppingRule {
    pub fn from_config(config: &StoppingConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: config.window,
            max_incorrect: config.max_incorrect,
        }
    }

    /// The rule only fires once a full window of test responses exists.
    pub fn should_stop(&self, history: &ResponseHistory) -> bool {
        self.enabled
            && history.test_count() >= self.window
            && history.recent_incorrect(self.window) >= self.max_incorrect
    }
}

impl Default for StoppingRule {
    fn default() -> Self {
        Self::from_config(&StoppingConfig::default())
    }
}
