//! Failure-driven skipping of trial types.
//!
//! Consecutive incorrect test responses are counted per trial type. Reaching
//! the threshold discards the rest of that type from the active pool and
//! escalates the type, after which a single incorrect response is enough to
//! skip again.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::corpus::ItemPool;
use crate::item::{Item, TrialType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SkipCounter {
    incorrect: u32,
    escalated: bool,
}

/// Outcome of a skip pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutcome {
    pub trial_type: TrialType,
    /// Items removed from the active pool.
    pub discarded: usize,
    /// Whether this pass escalated the trial type.
    pub escalated_now: bool,
}

#[derive(Debug, Clone)]
pub struct FailureSkipper {
    max_incorrect: u32,
    counters: HashMap<TrialType, SkipCounter>,
}

impl FailureSkipper {
    pub fn new(max_incorrect: u32) -> Self {
        Self {
            max_incorrect: max_incorrect.max(1),
            counters: HashMap::new(),
        }
    }

    /// Record a response and skip the rest of its trial type if the streak
    /// crossed the current threshold. Only test responses are counted.
    pub fn observe(
        &mut self,
        item: &Item,
        correct: bool,
        pool: Option<&mut ItemPool>,
    ) -> Option<SkipOutcome> {
        if !item.stage.is_test() {
            return None;
        }

        let counter = self.counters.entry(item.trial_type.clone()).or_default();
        if correct {
            counter.incorrect = 0;
            return None;
        }
        counter.incorrect += 1;

        let threshold = if counter.escalated { 1 } else { self.max_incorrect };
        if counter.incorrect < threshold {
            debug!(
                trial_type = %item.trial_type,
                streak = counter.incorrect,
                threshold,
                "Incorrect response"
            );
            return None;
        }

        let escalated_now = !counter.escalated;
        counter.escalated = true;
        counter.incorrect = 0;

        let discarded = pool.map_or(0, |pool| pool.discard_type(&item.trial_type));
        info!(
            trial_type = %item.trial_type,
            discarded,
            escalated_now,
            "Skipping remaining items of trial type"
        );

        Some(SkipOutcome {
            trial_type: item.trial_type.clone(),
            discarded,
            escalated_now,
        })
    }

    pub fn is_escalated(&self, trial_type: &TrialType) -> bool {
        self.counters.get(trial_type).is_some_and(|c| c.escalated)
    }

    pub fn streak(&self, trial_type: &TrialType) -> u32 {
        self.counters.get(trial_type).map_or(0, |c| c.incorrect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::AssessmentStage;
    use crate::item::fixtures::{item, test_item};

    fn pool(types: &[&str]) -> ItemPool {
        ItemPool::new(
            types
                .iter()
                .enumerate()
                .map(|(n, t)| test_item(100 + n as u32, t, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_three_misses_skip_and_escalate() {
        let mut skipper = FailureSkipper::new(3);
        let mut pool = pool(&["X", "Y", "X", "X", "Y"]);
        let x = TrialType::from("X");

        assert!(skipper.observe(&test_item(1, "X", 0.0), false, Some(&mut pool)).is_none());
        assert!(skipper.observe(&test_item(2, "X", 0.0), false, Some(&mut pool)).is_none());
        let outcome = skipper
            .observe(&test_item(3, "X", 0.0), false, Some(&mut pool))
            .unwrap();

        assert_eq!(outcome.discarded, 3);
        assert!(outcome.escalated_now);
        assert!(skipper.is_escalated(&x));
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains_type(&x));
    }

    #[test]
    fn test_escalated_type_skips_on_single_miss() {
        let mut skipper = FailureSkipper::new(3);
        for n in 0..3 {
            skipper.observe(&test_item(n, "X", 0.0), false, None);
        }

        let mut pool = pool(&["X", "Z"]);
        let outcome = skipper
            .observe(&test_item(10, "X", 0.0), false, Some(&mut pool))
            .unwrap();
        assert!(!outcome.escalated_now);
        assert_eq!(outcome.discarded, 1);
        assert_eq!(skipper.streak(&TrialType::from("X")), 0);
    }

    #[test]
    fn test_correct_resets_streak() {
        let mut skipper = FailureSkipper::new(3);
        skipper.observe(&test_item(1, "X", 0.0), false, None);
        skipper.observe(&test_item(2, "X", 0.0), false, None);
        skipper.observe(&test_item(3, "X", 0.0), true, None);
        skipper.observe(&test_item(4, "X", 0.0), false, None);

        assert_eq!(skipper.streak(&TrialType::from("X")), 1);
        assert!(!skipper.is_escalated(&TrialType::from("X")));
    }

    #[test]
    fn test_types_counted_independently() {
        let mut skipper = FailureSkipper::new(2);
        skipper.observe(&test_item(1, "X", 0.0), false, None);
        skipper.observe(&test_item(2, "Y", 0.0), false, None);
        skipper.observe(&test_item(3, "Y", 0.0), true, None);

        assert_eq!(skipper.streak(&TrialType::from("X")), 1);
        assert_eq!(skipper.streak(&TrialType::from("Y")), 0);
    }

    #[test]
    fn test_practice_responses_ignored() {
        let mut skipper = FailureSkipper::new(1);
        let practice = item(1, "X", AssessmentStage::Practice, 0.0);
        assert!(skipper.observe(&practice, false, None).is_none());
        assert_eq!(skipper.streak(&TrialType::from("X")), 0);
    }

    #[test]
    fn test_skip_on_empty_pool() {
        let mut skipper = FailureSkipper::new(1);
        let mut empty = ItemPool::default();
        let outcome = skipper
            .observe(&test_item(1, "X", 0.0), false, Some(&mut empty))
            .unwrap();
        assert_eq!(outcome.discarded, 0);
    }
}
