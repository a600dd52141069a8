//! Trial presentation contract.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::choices::ChoiceSet;
use crate::corpus::PoolName;
use crate::error::Result;
use crate::item::{Item, ItemId};

/// What the renderer is asked to present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRequest {
    pub item: Item,
    pub choices: ChoiceSet,
    pub pool: PoolName,
    /// Zero-based stimulus block within the session.
    pub block: usize,
}

/// How the respondent answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResponse {
    pub is_correct: bool,
    pub latency_ms: u64,
    /// Input the response came from (`"mouse"`, `"keyboard"`, `"touch"`, ...).
    pub response_source: String,
}

impl TrialResponse {
    pub fn new(is_correct: bool, latency_ms: u64) -> Self {
        Self {
            is_correct,
            latency_ms,
            response_source: "scripted".to_string(),
        }
    }
}

/// Presents one trial and waits for the response.
#[async_trait]
pub trait TrialRenderer: Send + Sync {
    async fn present(&self, request: &TrialRequest) -> Result<TrialResponse>;
}

/// Renderer answering from a script keyed by item, falling back to a default.
///
/// Every presented request is kept so callers can inspect the order.
pub struct ScriptedRenderer {
    answers: HashMap<ItemId, bool>,
    default_correct: bool,
    latency_ms: u64,
    presented: Mutex<Vec<TrialRequest>>,
}

impl ScriptedRenderer {
    pub fn new(default_correct: bool) -> Self {
        Self {
            answers: HashMap::new(),
            default_correct,
            latency_ms: 800,
            presented: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_answer(mut self, id: ItemId, correct: bool) -> Self {
        self.answers.insert(id, correct);
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Requests in presentation order.
    pub async fn presented(&self) -> Vec<TrialRequest> {
        self.presented.lock().await.clone()
    }
}

#[async_trait]
impl TrialRenderer for ScriptedRenderer {
    async fn present(&self, request: &TrialRequest) -> Result<TrialResponse> {
        let correct = self
            .answers
            .get(&request.item.id)
            .copied()
            .unwrap_or(self.default_correct);
        self.presented.lock().await.push(request.clone());
        tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        Ok(TrialResponse::new(correct, self.latency_ms))
    }
}
