//! Block partitioning of a loaded corpus.
//!
//! Separates instruction and practice items from test items, sets aside
//! unnormed items, seeds a fixed-difficulty warm-up block and leaves the rest
//! as the adaptive pool. Also groups item lists into blocks by block index and
//! splits a trial budget across stimulus blocks.

use rand::Rng;
use rand::seq::index;
use tracing::debug;

use crate::config::StartItemsConfig;
use crate::item::Item;

/// A corpus split into the sub-pools a session is built from.
#[derive(Debug, Clone, Default)]
pub struct PreparedCorpus {
    /// Instruction and practice items with negative difficulty.
    pub instruction_practice_heavy: Vec<Item>,
    /// Instruction and practice items with positive or missing difficulty.
    pub instruction_practice_light: Vec<Item>,
    /// Test items without a difficulty.
    pub unnormed: Vec<Item>,
    /// Randomly drawn warm-up items.
    pub start_items: Vec<Item>,
    /// Normed test items left for adaptive selection.
    pub adaptive: Vec<Item>,
}

impl PreparedCorpus {
    /// The instruction sequence to present.
    pub fn instruction_practice(&self, heavy: bool) -> &[Item] {
        if heavy {
            &self.instruction_practice_heavy
        } else {
            &self.instruction_practice_light
        }
    }
}

/// Partition `items` using the block-index eligibility rule of `config`.
pub fn prepare_corpus<R: Rng + ?Sized>(
    items: Vec<Item>,
    config: &StartItemsConfig,
    rng: &mut R,
) -> PreparedCorpus {
    let block = config.block_index;
    prepare_corpus_with(items, config, rng, |item| {
        block.is_none() || item.block_index == block
    })
}

/// Partition `items`, with a task-specific eligibility filter for start items.
pub fn prepare_corpus_with<R, F>(
    items: Vec<Item>,
    config: &StartItemsConfig,
    rng: &mut R,
    eligible: F,
) -> PreparedCorpus
where
    R: Rng + ?Sized,
    F: Fn(&Item) -> bool,
{
    let mut prepared = PreparedCorpus::default();
    let mut normed = Vec::new();

    for item in items {
        if item.is_instruction_or_practice() {
            match item.difficulty() {
                Some(b) if b < 0.0 => prepared.instruction_practice_heavy.push(item),
                Some(b) if b > 0.0 => prepared.instruction_practice_light.push(item),
                Some(_) => {}
                None => prepared.instruction_practice_light.push(item),
            }
        } else if item.is_normed() {
            normed.push(item);
        } else {
            prepared.unnormed.push(item);
        }
    }

    if config.enabled {
        let candidates: Vec<usize> = normed
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                eligible(item)
                    && item
                        .difficulty()
                        .is_some_and(|b| b <= config.max_difficulty)
            })
            .map(|(idx, _)| idx)
            .collect();

        let amount = config.count.min(candidates.len());
        let picked: Vec<usize> = index::sample(rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i])
            .collect();

        let mut slots: Vec<Option<Item>> = normed.into_iter().map(Some).collect();
        prepared.start_items = picked.iter().filter_map(|&idx| slots[idx].take()).collect();
        normed = slots.into_iter().flatten().collect();
    }

    prepared.adaptive = normed;

    debug!(
        heavy = prepared.instruction_practice_heavy.len(),
        light = prepared.instruction_practice_light.len(),
        unnormed = prepared.unnormed.len(),
        start = prepared.start_items.len(),
        adaptive = prepared.adaptive.len(),
        "Partitioned corpus"
    );

    prepared
}

/// Group contiguous runs of items sharing a block index.
///
/// With `sort` set, items are first stably sorted by block index (items
/// without one go last), so every block index forms exactly one group.
pub fn group_by_block(mut items: Vec<Item>, sort: bool) -> Vec<Vec<Item>> {
    if sort {
        items.sort_by_key(|item| (item.block_index.is_none(), item.block_index));
    }

    let mut groups: Vec<Vec<Item>> = Vec::new();
    for item in items {
        match groups.last_mut() {
            Some(group) if group[0].block_index == item.block_index => group.push(item),
            _ => groups.push(vec![item]),
        }
    }
    groups
}

/// Split a requested number of test trials across stimulus blocks.
///
/// The request is capped at `available`; requests below 3 are raised to 4.
/// Blocks get an equal share and the remainder goes to the first blocks.
pub fn stimulus_block_counts(requested: usize, blocks: usize, available: usize) -> Vec<usize> {
    if blocks == 0 {
        return Vec::new();
    }

    let mut total = requested.min(available);
    if total < 3 {
        total = 4;
    }

    let base = total / blocks;
    let remainder = total % blocks;
    (0..blocks)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::item::AssessmentStage;
    use crate::item::fixtures::{item, test_item};

    fn with_block(mut item: Item, block: Option<u32>) -> Item {
        item.block_index = block;
        item
    }

    fn sample_corpus() -> Vec<Item> {
        let mut items = vec![
            item(1, "instructions", AssessmentStage::Instructions, f64::NAN),
            item(2, "A", AssessmentStage::Practice, -1.0),
            item(3, "A", AssessmentStage::Practice, 1.0),
            item(4, "A", AssessmentStage::Practice, 0.0),
            test_item(5, "A", f64::NAN),
        ];
        for n in 10..30 {
            let b = if n % 2 == 0 { -1.0 } else { 1.0 };
            items.push(with_block(test_item(n, "A", b), Some((n % 2) as u32)));
        }
        items
    }

    #[test]
    fn test_instruction_practice_split_by_difficulty_sign() {
        let prepared = prepare_corpus(
            sample_corpus(),
            &StartItemsConfig::default(),
            &mut StdRng::seed_from_u64(1),
        );

        let heavy: Vec<u32> = prepared
            .instruction_practice_heavy
            .iter()
            .map(|i| i.id.number)
            .collect();
        let light: Vec<u32> = prepared
            .instruction_practice_light
            .iter()
            .map(|i| i.id.number)
            .collect();

        assert_eq!(heavy, vec![2]);
        assert_eq!(light, vec![1, 3]);
        assert_eq!(prepared.instruction_practice(true).len(), 1);
    }

    #[test]
    fn test_unnormed_items_are_set_aside() {
        let prepared = prepare_corpus(
            sample_corpus(),
            &StartItemsConfig::default(),
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(prepared.unnormed.len(), 1);
        assert_eq!(prepared.unnormed[0].id.number, 5);
        assert!(prepared.adaptive.iter().all(Item::is_normed));
    }

    #[test]
    fn test_start_items_are_eligible_and_removed_from_adaptive_pool() {
        let config = StartItemsConfig::default();
        for seed in 0..10 {
            let prepared =
                prepare_corpus(sample_corpus(), &config, &mut StdRng::seed_from_u64(seed));

            assert_eq!(prepared.start_items.len(), 5);
            for start in &prepared.start_items {
                assert_eq!(start.block_index, Some(0));
                assert!(start.difficulty().unwrap() <= 0.0);
                assert!(prepared.adaptive.iter().all(|i| i.id != start.id));
            }

            let mut ids: Vec<u32> = prepared.start_items.iter().map(|i| i.id.number).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), 5);
            assert_eq!(prepared.adaptive.len() + prepared.start_items.len(), 20);
        }
    }

    #[test]
    fn test_start_items_capped_by_eligible_count() {
        let items = vec![
            test_item(1, "A", -0.5),
            test_item(2, "A", 0.5),
            test_item(3, "A", -2.0),
        ];
        let prepared = prepare_corpus(
            items,
            &StartItemsConfig::default(),
            &mut StdRng::seed_from_u64(3),
        );
        assert_eq!(prepared.start_items.len(), 2);
        assert_eq!(prepared.adaptive.len(), 1);
        assert_eq!(prepared.adaptive[0].id.number, 2);
    }

    #[test]
    fn test_disabled_start_items_keep_whole_pool() {
        let config = StartItemsConfig {
            enabled: false,
            ..Default::default()
        };
        let prepared = prepare_corpus(sample_corpus(), &config, &mut StdRng::seed_from_u64(1));
        assert!(prepared.start_items.is_empty());
        assert_eq!(prepared.adaptive.len(), 20);
    }

    #[test]
    fn test_custom_eligibility_filter() {
        let prepared = prepare_corpus_with(
            sample_corpus(),
            &StartItemsConfig::default(),
            &mut StdRng::seed_from_u64(1),
            |item| item.id.number < 14,
        );
        let mut ids: Vec<u32> = prepared.start_items.iter().map(|i| i.id.number).collect();
        ids.sort();
        assert_eq!(ids, vec![10, 12]);
    }

    #[test]
    fn test_group_by_block_contiguous_runs() {
        let items = vec![
            with_block(test_item(1, "A", 0.0), Some(0)),
            with_block(test_item(2, "A", 0.0), Some(0)),
            with_block(test_item(3, "A", 0.0), Some(1)),
            with_block(test_item(4, "A", 0.0), Some(0)),
        ];

        let unsorted = group_by_block(items.clone(), false);
        assert_eq!(
            unsorted.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![2, 1, 1]
        );

        let sorted = group_by_block(items, true);
        assert_eq!(sorted.len(), 2);
        assert_eq!(
            sorted[0].iter().map(|i| i.id.number).collect::<Vec<_>>(),
            vec![1, 2, 4]
        );
        assert_eq!(sorted[1][0].id.number, 3);
    }

    #[test]
    fn test_group_by_block_puts_missing_index_last() {
        let items = vec![
            with_block(test_item(1, "A", 0.0), None),
            with_block(test_item(2, "A", 0.0), Some(2)),
        ];
        let groups = group_by_block(items, true);
        assert_eq!(groups[0][0].id.number, 2);
        assert_eq!(groups[1][0].id.number, 1);
        assert!(group_by_block(Vec::new(), true).is_empty());
    }

    #[test]
    fn test_stimulus_block_counts() {
        assert_eq!(stimulus_block_counts(10, 3, 100), vec![4, 3, 3]);
        assert_eq!(stimulus_block_counts(300, 3, 20), vec![7, 7, 6]);
        assert_eq!(stimulus_block_counts(2, 3, 100), vec![2, 1, 1]);
        assert_eq!(stimulus_block_counts(9, 3, 9), vec![3, 3, 3]);
        assert!(stimulus_block_counts(9, 0, 9).is_empty());
    }
}
