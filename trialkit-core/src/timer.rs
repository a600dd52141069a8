//! Session time budget.
//!
//! A session ends exactly once. [`EndLatch`] records the first termination
//! reason and wakes everyone waiting on it; later attempts are ignored.
//! [`SessionTimer`] owns the single abort timer that fires the latch at the
//! deadline, and the early-end check run before each draw.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TimerConfig;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The abort timer fired at the deadline.
    Deadline,
    /// Too little time was left to present the next item.
    InsufficientTime,
    /// Too many recent test responses were incorrect.
    StoppingRule,
    /// Every pool is drained.
    Exhausted,
    /// A collaborator failed or the session was aborted from outside.
    Aborted,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deadline => "deadline",
            Self::InsufficientTime => "insufficient_time",
            Self::StoppingRule => "stopping_rule",
            Self::Exhausted => "exhausted",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct LatchInner {
    reason: OnceLock<EndReason>,
    ended: CancellationToken,
}

/// First-wins record of how a session ended.
#[derive(Debug, Clone, Default)]
pub struct EndLatch {
    inner: Arc<LatchInner>,
}

impl EndLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the session. Returns `true` only for the first caller.
    pub fn finish(&self, reason: EndReason) -> bool {
        if self.inner.reason.set(reason).is_err() {
            debug!(reason = %reason, "Session already ended, ignoring");
            return false;
        }
        info!(reason = %reason, "Session ended");
        self.inner.ended.cancel();
        true
    }

    pub fn reason(&self) -> Option<EndReason> {
        self.inner.reason.get().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    /// Wait until the session has ended.
    pub async fn wait(&self) -> EndReason {
        self.inner.ended.cancelled().await;
        self.reason().unwrap_or(EndReason::Aborted)
    }
}

/// Maximum session duration for a configured number of minutes. Budgets
/// below one minute are raised to one.
pub fn max_duration(minutes: f64) -> Duration {
    Duration::from_millis((minutes.max(1.0) * 60_000.0) as u64)
}

pub struct SessionTimer {
    started_at: Instant,
    deadline: Instant,
    safety_buffer: Duration,
    latch: EndLatch,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SessionTimer {
    /// Record the start time and schedule the abort timer. Must be called
    /// from within a tokio runtime.
    pub fn start(max_time_minutes: f64, config: &TimerConfig, latch: EndLatch) -> Self {
        let started_at = Instant::now();
        let budget = max_duration(max_time_minutes);
        let deadline = started_at + budget;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            let latch = latch.clone();
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Abort timer cancelled");
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        latch.finish(EndReason::Deadline);
                    }
                }
            }
        });

        debug!(budget_ms = budget.as_millis() as u64, "Session timer started");

        Self {
            started_at,
            deadline,
            safety_buffer: Duration::from_millis(config.safety_buffer_ms),
            latch,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Minimum time needed to present an item with this much audio.
    pub fn required_for(&self, audio: Duration) -> Duration {
        audio + self.safety_buffer
    }

    /// End the session early if an item with `audio` of stimulus cannot be
    /// presented safely in the remaining time.
    ///
    /// Returns `true` when the session is over, whether it ended here or
    /// was already finished.
    pub fn end_if_insufficient(&mut self, audio: Duration) -> bool {
        if self.latch.is_finished() {
            return true;
        }

        let required = self.required_for(audio);
        let remaining = self.remaining();
        if required <= remaining {
            return false;
        }

        debug!(
            required_ms = required.as_millis() as u64,
            remaining_ms = remaining.as_millis() as u64,
            "Not enough time for next item"
        );
        self.cancel();
        self.latch.finish(EndReason::InsufficientTime);
        true
    }

    /// Cancel the abort timer. Safe to call any number of times, including
    /// after the timer fired.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.handle.take();
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
