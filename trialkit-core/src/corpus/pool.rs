//! Item pools.
//!
//! A pool only ever shrinks: drawing an item moves it out of the pool, so an
//! item can never be presented twice. Selection and removal happen inside a
//! single `&mut self` call, which rules out drawing against a stale copy.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemId, TrialType};

/// An ordered, draining collection of items.
#[derive(Debug, Clone, Default)]
pub struct ItemPool {
    items: Vec<Item>,
    drawn: HashSet<ItemId>,
}

impl ItemPool {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            drawn: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remaining items in pool order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of items drawn so far.
    pub fn drawn_count(&self) -> usize {
        self.drawn.len()
    }

    pub fn contains_type(&self, trial_type: &TrialType) -> bool {
        self.items.iter().any(|i| &i.trial_type == trial_type)
    }

    /// Draw the first remaining item.
    pub fn draw_front(&mut self) -> Option<Item> {
        self.draw_with(|items| (!items.is_empty()).then_some(0))
    }

    /// Let `select` pick an index among the remaining items, then remove and
    /// return that item. Out-of-range picks draw nothing.
    pub fn draw_with<F>(&mut self, select: F) -> Option<Item>
    where
        F: FnOnce(&[Item]) -> Option<usize>,
    {
        let idx = select(&self.items)?;
        if idx >= self.items.len() {
            return None;
        }
        let item = self.items.remove(idx);
        let fresh = self.drawn.insert(item.id.clone());
        debug_assert!(fresh, "item {} drawn twice", item.id);
        Some(item)
    }

    /// Discard every remaining item of a trial type, returning how many
    /// were removed.
    pub fn discard_type(&mut self, trial_type: &TrialType) -> usize {
        let before = self.items.len();
        self.items.retain(|i| &i.trial_type != trial_type);
        before - self.items.len()
    }
}

/// Named sub-pools of a session corpus, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolName {
    /// Instruction and practice items, presented in bank order.
    InstructionPractice,
    /// Fixed-difficulty warm-up items.
    Start,
    /// Adaptive pool, one per stimulus block.
    Adaptive(usize),
    /// Items without IRT norms, presented in bank order.
    Unnormed,
}

impl PoolName {
    /// Whether items of this pool are chosen by the IRT engine.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, Self::Adaptive(_))
    }
}

impl std::fmt::Display for PoolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstructionPractice => write!(f, "instruction_practice"),
            Self::Start => write!(f, "start"),
            Self::Adaptive(block) => write!(f, "adaptive_{}", block),
            Self::Unnormed => write!(f, "unnormed"),
        }
    }
}

/// The session's items, partitioned into named pools.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pools: BTreeMap<PoolName, ItemPool>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool. Empty pools are not stored.
    pub fn insert(&mut self, name: PoolName, items: Vec<Item>) {
        if !items.is_empty() {
            self.pools.insert(name, ItemPool::new(items));
        }
    }

    pub fn pool(&self, name: PoolName) -> Option<&ItemPool> {
        self.pools.get(&name)
    }

    pub fn pool_mut(&mut self, name: PoolName) -> Option<&mut ItemPool> {
        self.pools.get_mut(&name)
    }

    /// First pool in presentation order that still has items.
    pub fn current(&self) -> Option<PoolName> {
        self.pools
            .iter()
            .find(|(_, pool)| !pool.is_empty())
            .map(|(name, _)| *name)
    }

    pub fn names(&self) -> impl Iterator<Item = PoolName> + '_ {
        self.pools.keys().copied()
    }

    pub fn remaining(&self) -> usize {
        self.pools.values().map(ItemPool::len).sum()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
