//! Incremental asset batch planning.
//!
//! Given items split into ordered batches, computes which media assets each
//! batch needs that no earlier batch already claimed. Fetching batch `n`
//! before its first item is shown is then enough to present every item in it.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::keys::{AssetKey, AssetKind};
use super::resolver::AssetCatalog;
use crate::config::AssetFieldsConfig;
use crate::item::{Item, ItemId};

/// Assets a batch newly requires, plus the items it covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBatch {
    pub index: usize,
    pub items: Vec<ItemId>,
    pub images: Vec<AssetKey>,
    pub audio: Vec<AssetKey>,
}

impl AssetBatch {
    /// Whether the batch requires no new assets.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.audio.is_empty()
    }

    pub fn asset_count(&self) -> usize {
        self.images.len() + self.audio.len()
    }
}

/// Split a flat item list into fixed-size batches, in order. The final batch
/// may be short.
pub fn batch_items(items: &[Item], batch_size: usize) -> Vec<&[Item]> {
    items.chunks(batch_size.max(1)).collect()
}

fn dedup_new(
    keys: impl Iterator<Item = AssetKey>,
    claimed: &mut HashSet<AssetKey>,
) -> Vec<AssetKey> {
    keys.filter(|key| claimed.insert(key.clone())).collect()
}

/// Compute the asset requirements of every batch.
///
/// Keys are deduplicated within a batch and attributed to the first batch
/// that references them.
pub fn plan_asset_batches<'a>(
    batches: impl IntoIterator<Item = &'a [Item]>,
    fields: &AssetFieldsConfig,
) -> AssetPlan {
    let mut claimed_images = HashSet::new();
    let mut claimed_audio = HashSet::new();

    let batches = batches
        .into_iter()
        .enumerate()
        .map(|(index, items)| {
            let images = items
                .iter()
                .flat_map(|item| item.assets.collect(&fields.image_fields).cloned());
            let audio = items
                .iter()
                .flat_map(|item| item.assets.collect(&fields.audio_fields).cloned());

            AssetBatch {
                index,
                items: items.iter().map(|item| item.id.clone()).collect(),
                images: dedup_new(images, &mut claimed_images),
                audio: dedup_new(audio, &mut claimed_audio),
            }
        })
        .collect();

    AssetPlan::new(batches)
}

/// Every asset key referenced by `items`, per kind.
pub fn full_asset_set(
    items: &[Item],
    fields: &AssetFieldsConfig,
) -> (BTreeSet<AssetKey>, BTreeSet<AssetKey>) {
    let images = items
        .iter()
        .flat_map(|item| item.assets.collect(&fields.image_fields).cloned())
        .collect();
    let audio = items
        .iter()
        .flat_map(|item| item.assets.collect(&fields.audio_fields).cloned())
        .collect();
    (images, audio)
}

/// Ordered asset batches and the batch each item belongs to.
#[derive(Debug, Clone, Default)]
pub struct AssetPlan {
    batches: Vec<AssetBatch>,
    item_batch: HashMap<ItemId, usize>,
}

impl AssetPlan {
    pub fn new(batches: Vec<AssetBatch>) -> Self {
        let item_batch = batches
            .iter()
            .flat_map(|batch| batch.items.iter().map(move |id| (id.clone(), batch.index)))
            .collect();
        Self {
            batches,
            item_batch,
        }
    }

    pub fn batches(&self) -> &[AssetBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Index of the batch holding an item.
    pub fn batch_of(&self, id: &ItemId) -> Option<usize> {
        self.item_batch.get(id).copied()
    }

    /// Catalog assets that no batch requires, to be fetched after all batches.
    pub fn leftover_assets(&self, catalog: &AssetCatalog) -> Vec<(AssetKind, AssetKey)> {
        let planned_images: HashSet<&AssetKey> =
            self.batches.iter().flat_map(|b| b.images.iter()).collect();
        let planned_audio: HashSet<&AssetKey> =
            self.batches.iter().flat_map(|b| b.audio.iter()).collect();

        let mut leftover: Vec<(AssetKind, AssetKey)> = catalog
            .keys(AssetKind::Image)
            .filter(|key| !planned_images.contains(key))
            .map(|key| (AssetKind::Image, key.clone()))
            .chain(
                catalog
                    .keys(AssetKind::Audio)
                    .filter(|key| !planned_audio.contains(key))
                    .map(|key| (AssetKind::Audio, key.clone())),
            )
            .collect();
        leftover.sort();
        leftover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ItemField;
    use crate::item::fixtures::test_item;

    fn media_item(number: u32, image: &str, audio: &str, distractors: &[&str]) -> Item {
        let mut item = test_item(number, "A", 0.0);
        item.assets.insert(ItemField::Image, [image]);
        item.assets.insert(ItemField::AudioFile, [audio]);
        item.assets
            .insert(ItemField::Distractors, distractors.iter().copied());
        item
    }

    fn keys(raw: &[&str]) -> Vec<AssetKey> {
        raw.iter().map(|r| AssetKey::from_reference(r)).collect()
    }

    #[test]
    fn test_batch_items_short_final_batch() {
        let items: Vec<Item> = (0..12).map(|n| test_item(n, "A", 0.0)).collect();
        let batches = batch_items(&items, 5);
        assert_eq!(
            batches.iter().map(|b| b.len()).collect::<Vec<_>>(),
            vec![5, 5, 2]
        );
        assert!(batch_items(&[], 5).is_empty());
    }

    #[test]
    fn test_first_batch_wins() {
        let items = vec![
            media_item(1, "cat", "prompt-one", &[]),
            media_item(2, "cat", "prompt-one", &[]),
            media_item(3, "cat", "prompt-two", &[]),
            media_item(4, "dog", "prompt-one", &[]),
        ];
        let plan = plan_asset_batches(batch_items(&items, 2), &AssetFieldsConfig::default());

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.batches()[0].images, keys(&["cat"]));
        assert_eq!(plan.batches()[0].audio, keys(&["promptOne"]));
        assert_eq!(plan.batches()[1].images, keys(&["dog"]));
        assert_eq!(plan.batches()[1].audio, keys(&["promptTwo"]));
        assert_eq!(plan.batch_of(&items[3].id), Some(1));
    }

    #[test]
    fn test_union_is_full_set_and_batches_disjoint() {
        let items: Vec<Item> = (0..23)
            .map(|n| {
                let image = format!("img-{}", n % 7);
                let audio = format!("audio-{}", n % 5);
                let distractor = format!("img-{}", (n + 3) % 9);
                media_item(n, &image, &audio, &[distractor.as_str()])
            })
            .collect();
        let fields = AssetFieldsConfig {
            image_fields: vec![ItemField::Image, ItemField::Distractors],
            audio_fields: vec![ItemField::AudioFile],
        };

        let plan = plan_asset_batches(batch_items(&items, 4), &fields);
        let (all_images, all_audio) = full_asset_set(&items, &fields);

        let mut seen_images = BTreeSet::new();
        let mut seen_audio = BTreeSet::new();
        for batch in plan.batches() {
            for key in &batch.images {
                assert!(seen_images.insert(key.clone()), "image {} claimed twice", key);
            }
            for key in &batch.audio {
                assert!(seen_audio.insert(key.clone()), "audio {} claimed twice", key);
            }
        }
        assert_eq!(seen_images, all_images);
        assert_eq!(seen_audio, all_audio);
    }

    #[test]
    fn test_leftover_assets() {
        let items = vec![media_item(1, "cat", "meow", &[])];
        let plan = plan_asset_batches(batch_items(&items, 5), &AssetFieldsConfig::default());

        let catalog: AssetCatalog = serde_json::from_value(serde_json::json!({
            "images": {"cat": "img/cat.png", "dog": "img/dog.png"},
            "audio": {"meow": {"uri": "a/meow.mp3"}, "feedbackGood": {"uri": "a/good.mp3"}}
        }))
        .unwrap();

        assert_eq!(
            plan.leftover_assets(&catalog),
            vec![
                (AssetKind::Image, AssetKey::from_reference("dog")),
                (AssetKind::Audio, AssetKey::from_reference("feedbackGood")),
            ]
        );
    }
}
