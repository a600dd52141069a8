//! Choice sets handed to the trial renderer.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// How the options of a choice set are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceOrder {
    /// Shuffle every trial.
    #[default]
    Yes,
    /// Keep target first, then distractors in bank order.
    No,
    /// Shuffle once and reuse that order while the same options repeat.
    AtBlockLevel,
}

/// Options for one trial and where the target sits among them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSet {
    pub target: Option<String>,
    pub choices: Vec<String>,
    /// Index of the target in `choices`, if the target is one of them.
    pub correct_index: Option<usize>,
}

/// Builds choice sets, remembering the last block-level ordering.
#[derive(Debug, Clone, Default)]
pub struct ChoicePreparer {
    order: ChoiceOrder,
    previous: Option<Vec<String>>,
}

fn same_options(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

fn is_yes_no(choices: &[String]) -> bool {
    choices.len() == 2
        && choices.iter().any(|c| c == "yes")
        && choices.iter().any(|c| c == "no")
}

impl ChoicePreparer {
    pub fn new(order: ChoiceOrder) -> Self {
        Self {
            order,
            previous: None,
        }
    }

    pub fn prepare<R: Rng + ?Sized>(
        &mut self,
        target: Option<&str>,
        distractors: &[String],
        rng: &mut R,
    ) -> ChoiceSet {
        let target = target.filter(|t| !t.is_empty());

        let mut choices: Vec<String> = match target {
            Some(t) if !distractors.iter().any(|d| d == t) => {
                std::iter::once(t.to_string())
                    .chain(distractors.iter().cloned())
                    .collect()
            }
            _ => distractors.to_vec(),
        };

        if is_yes_no(&choices) {
            choices = vec!["yes".to_string(), "no".to_string()];
        } else {
            match self.order {
                ChoiceOrder::Yes => choices.shuffle(rng),
                ChoiceOrder::No => {}
                ChoiceOrder::AtBlockLevel => match &self.previous {
                    Some(previous) if same_options(previous, &choices) => {
                        choices = previous.clone();
                    }
                    _ => {
                        choices.shuffle(rng);
                        self.previous = Some(choices.clone());
                    }
                },
            }
        }

        let correct_index = target.and_then(|t| choices.iter().position(|c| c == t));
        ChoiceSet {
            target: target.map(str::to_string),
            choices,
            correct_index,
        }
    }
}
