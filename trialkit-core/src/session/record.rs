//! Trial records and the persistence sink they are handed to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::corpus::PoolName;
use crate::error::Result;
use crate::item::{AssessmentStage, TrialType};
use crate::timer::EndReason;

/// Whether a drawn item was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Presented,
    /// A required audio asset did not resolve.
    SkippedMissingAudio,
}

/// One finalized trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub session_id: Uuid,
    /// Position in the session, counting skipped trials.
    pub trial_index: usize,
    /// `source-number` identity of the item.
    pub item_id: String,
    pub task: String,
    pub trial_type: TrialType,
    pub stage: AssessmentStage,
    pub pool: PoolName,
    pub block: usize,
    pub status: TrialStatus,
    pub difficulty: Option<f64>,
    pub choices: Vec<String>,
    pub correct_index: Option<usize>,
    pub correct: Option<bool>,
    pub latency_ms: Option<u64>,
    pub response_source: Option<String>,
    /// Ability estimate after this trial.
    pub theta: f64,
    /// Items of this trial type discarded by a skip pass after this trial.
    pub discarded: usize,
    pub elapsed_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Final state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub end_reason: EndReason,
    pub presented: usize,
    pub correct: usize,
    pub skipped_missing_audio: usize,
    pub discarded_by_skips: usize,
    pub theta: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Receives finalized trial records and the end-of-session signal.
#[async_trait]
pub trait TrialSink: Send + Sync {
    async fn record(&self, record: TrialRecord) -> Result<()>;

    async fn finish(&self, summary: &SessionSummary) -> Result<()>;
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct InMemoryTrialSink {
    records: RwLock<Vec<TrialRecord>>,
    summary: RwLock<Option<SessionSummary>>,
}

impl InMemoryTrialSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<TrialRecord> {
        self.records.read().await.clone()
    }

    pub async fn summary(&self) -> Option<SessionSummary> {
        self.summary.read().await.clone()
    }
}

#[async_trait]
impl TrialSink for InMemoryTrialSink {
    async fn record(&self, record: TrialRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn finish(&self, summary: &SessionSummary) -> Result<()> {
        *self.summary.write().await = Some(summary.clone());
        Ok(())
    }
}
