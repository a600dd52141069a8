//! Adaptive item selection harness.
//!
//! [`AdaptiveSelector`] owns the IRT engine, the ability estimate it exposes
//! and the response history. Item maximization itself stays behind the
//! [`IrtEngine`] trait.

pub mod engine;
pub mod history;

pub use engine::{IrtEngine, MaxInformationEngine, SequentialEngine, Zeta};
pub use history::{ResponseEntry, ResponseHistory, StoppingRule};

use chrono::Utc;
use tracing::debug;

use crate::corpus::ItemPool;
use crate::item::{AssessmentStage, Item};

/// Result of recording one response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseUpdate {
    /// Whether the response moved the ability estimate.
    pub ability_updated: bool,
    /// Ability estimate after the response.
    pub theta: f64,
    /// Whether the stopping rule fired.
    pub stop: bool,
}

pub struct AdaptiveSelector {
    engine: Box<dyn IrtEngine>,
    history: ResponseHistory,
    stopping: StoppingRule,
}

impl AdaptiveSelector {
    pub fn new(engine: Box<dyn IrtEngine>, stopping: StoppingRule) -> Self {
        Self {
            engine,
            history: ResponseHistory::new(),
            stopping,
        }
    }

    /// Let the engine pick the next item and remove it from `pool` in the
    /// same step.
    pub fn draw(&mut self, pool: &mut ItemPool) -> Option<Item> {
        let engine = &mut self.engine;
        pool.draw_with(|items| engine.select_next(items))
    }

    /// Record a scored response.
    ///
    /// Only normed test items update the ability estimate. The history is
    /// appended for every response, and the stopping rule is evaluated after
    /// test responses only.
    pub fn record(&mut self, item: &Item, correct: bool) -> ResponseUpdate {
        let is_test = item.stage == AssessmentStage::Test;
        let zeta = is_test.then(|| Zeta::from_item(item)).flatten();

        if let Some(zeta) = zeta {
            self.engine.update_ability(zeta, correct);
        }

        self.history.push(ResponseEntry {
            item_id: item.id.clone(),
            trial_type: item.trial_type.clone(),
            stage: item.stage,
            correct,
            at: Utc::now(),
        });

        let stop = is_test && self.should_stop();
        let theta = self.engine.theta();
        debug!(
            item_id = %item.id,
            correct,
            theta,
            updated = zeta.is_some(),
            stop,
            "Recorded response"
        );

        ResponseUpdate {
            ability_updated: zeta.is_some(),
            theta,
            stop,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stopping.should_stop(&self.history)
    }

    pub fn theta(&self) -> f64 {
        self.engine.theta()
    }

    pub fn history(&self) -> &ResponseHistory {
        &self.history
    }
}
