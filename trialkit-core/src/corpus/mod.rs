//! Session corpus: loading the item bank and the pools items are drawn from.

pub mod loader;
pub mod pool;

pub use loader::{BankFormat, Cell, CorpusLoader, RawRow, shuffle_within_trial_types};
pub use pool::{Corpus, ItemPool, PoolName};
