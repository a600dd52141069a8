//! Session plan: pools, the phases drawn from them and the asset batches.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::assets::{AssetPlan, batch_items, plan_asset_batches};
use crate::config::SessionConfig;
use crate::corpus::{Corpus, PoolName};
use crate::item::Item;
use crate::partition::{PreparedCorpus, group_by_block, prepare_corpus, stimulus_block_counts};

/// A stretch of the session drawing from one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Phase {
    pub pool: PoolName,
    /// Zero-based stimulus block, counted over adaptive phases only.
    pub block: usize,
    /// Maximum draws, or `None` to drain the pool.
    pub budget: Option<usize>,
}

/// Everything a session needs before the first draw.
#[derive(Debug, Clone, Default)]
pub struct SessionPlan {
    pub corpus: Corpus,
    pub phases: Vec<Phase>,
    pub assets: AssetPlan,
}

impl SessionPlan {
    /// Partition `items` and plan pools, phases and asset batches.
    pub fn build<R: Rng + ?Sized>(items: Vec<Item>, config: &SessionConfig, rng: &mut R) -> Self {
        let prepared = prepare_corpus(items, &config.start_items, rng);
        Self::from_prepared(prepared, config)
    }

    pub fn from_prepared(prepared: PreparedCorpus, config: &SessionConfig) -> Self {
        let PreparedCorpus {
            instruction_practice_heavy,
            instruction_practice_light,
            unnormed,
            start_items,
            adaptive,
        } = prepared;

        let instructions = if config.heavy_instructions {
            instruction_practice_heavy
        } else {
            instruction_practice_light
        };
        let unnormed = if config.run_unnormed {
            unnormed
        } else {
            Vec::new()
        };

        let adaptive_total = adaptive.len();
        let adaptive_groups = if config.group_by_block {
            group_by_block(adaptive, true)
        } else if adaptive.is_empty() {
            Vec::new()
        } else {
            vec![adaptive]
        };

        // Asset batches follow presentation order.
        let mut ordered: Vec<&[Item]> = vec![instructions.as_slice(), start_items.as_slice()];
        ordered.extend(adaptive_groups.iter().map(Vec::as_slice));
        ordered.push(unnormed.as_slice());

        let assets = if config.group_by_block {
            plan_asset_batches(
                ordered.into_iter().filter(|group| !group.is_empty()),
                &config.assets,
            )
        } else {
            let flat: Vec<Item> = ordered.into_iter().flatten().cloned().collect();
            plan_asset_batches(batch_items(&flat, config.batch_size), &config.assets)
        };

        let mut phases = Vec::new();
        if !instructions.is_empty() {
            phases.push(Phase {
                pool: PoolName::InstructionPractice,
                block: 0,
                budget: None,
            });
        }
        if !start_items.is_empty() {
            phases.push(Phase {
                pool: PoolName::Start,
                block: 0,
                budget: None,
            });
        }

        if adaptive_total > 0 {
            let blocks = if config.group_by_block {
                adaptive_groups.len()
            } else {
                config.stimulus_blocks
            };
            let counts = stimulus_block_counts(config.number_of_trials, blocks, adaptive_total);
            for (block, budget) in counts.into_iter().enumerate() {
                let pool = if config.group_by_block {
                    PoolName::Adaptive(block)
                } else {
                    PoolName::Adaptive(0)
                };
                phases.push(Phase {
                    pool,
                    block,
                    budget: Some(budget),
                });
            }
        }

        if !unnormed.is_empty() {
            phases.push(Phase {
                pool: PoolName::Unnormed,
                block: 0,
                budget: None,
            });
        }

        let mut corpus = Corpus::new();
        corpus.insert(PoolName::InstructionPractice, instructions);
        corpus.insert(PoolName::Start, start_items);
        for (idx, group) in adaptive_groups.into_iter().enumerate() {
            corpus.insert(PoolName::Adaptive(idx), group);
        }
        corpus.insert(PoolName::Unnormed, unnormed);

        debug!(
            items = corpus.remaining(),
            phases = phases.len(),
            batches = assets.len(),
            "Planned session"
        );

        Self {
            corpus,
            phases,
            assets,
        }
    }

    pub fn item_count(&self) -> usize {
        self.corpus.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_exhausted()
    }
}
