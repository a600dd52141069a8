//! Asset preloading.
//!
//! Batches are fetched through an [`AssetPreloader`]. The [`PreloadPipeline`]
//! guarantees a batch is loaded before any of its items is presented and
//! prefetches the following batch in the background.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::planner::AssetBatch;
use crate::error::{Result, TrialkitError};

/// Fetches the assets of a batch.
#[async_trait]
pub trait AssetPreloader: Send + Sync {
    async fn preload(&self, batch: &AssetBatch) -> Result<()>;
}

/// Preloader that records which batches were requested, for testing.
#[derive(Debug, Default)]
pub struct RecordingPreloader {
    loaded: Mutex<Vec<usize>>,
}

impl RecordingPreloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch indices in the order they were preloaded.
    pub async fn loaded(&self) -> Vec<usize> {
        self.loaded.lock().await.clone()
    }
}

#[async_trait]
impl AssetPreloader for RecordingPreloader {
    async fn preload(&self, batch: &AssetBatch) -> Result<()> {
        self.loaded.lock().await.push(batch.index);
        Ok(())
    }
}

/// Loads batches on demand and keeps one batch of lookahead in flight.
pub struct PreloadPipeline {
    preloader: Arc<dyn AssetPreloader>,
    batches: Vec<AssetBatch>,
    pending: HashMap<usize, JoinHandle<Result<()>>>,
    loaded: HashSet<usize>,
}

impl PreloadPipeline {
    pub fn new(preloader: Arc<dyn AssetPreloader>, batches: Vec<AssetBatch>) -> Self {
        Self {
            preloader,
            batches,
            pending: HashMap::new(),
            loaded: HashSet::new(),
        }
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        self.loaded.contains(&index)
    }

    /// Start fetching a batch in the background if it is not loaded or
    /// already in flight. Must be called from within a tokio runtime.
    pub fn prefetch(&mut self, index: usize) {
        if self.loaded.contains(&index) || self.pending.contains_key(&index) {
            return;
        }
        let Some(batch) = self.batches.get(index).cloned() else {
            return;
        };

        debug!(batch = index, assets = batch.asset_count(), "Prefetching asset batch");
        let preloader = Arc::clone(&self.preloader);
        let handle = tokio::spawn(async move { preloader.preload(&batch).await });
        self.pending.insert(index, handle);
    }

    /// Wait until a batch is loaded, then prefetch the next one.
    pub async fn ensure_loaded(&mut self, index: usize) -> Result<()> {
        if !self.loaded.contains(&index) {
            match self.pending.remove(&index) {
                Some(handle) => handle.await.map_err(|e| TrialkitError::Preload {
                    batch: index,
                    message: e.to_string(),
                })??,
                None => {
                    let Some(batch) = self.batches.get(index) else {
                        warn!(batch = index, "Unknown asset batch requested");
                        return Ok(());
                    };
                    self.preloader.preload(batch).await?;
                }
            }
            self.loaded.insert(index);
            debug!(batch = index, "Asset batch loaded");
        }

        self.prefetch(index + 1);
        Ok(())
    }

    /// Abort background fetches that are no longer needed.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

impl Drop for PreloadPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
