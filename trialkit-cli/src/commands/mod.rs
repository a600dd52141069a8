pub mod plan;
pub mod simulate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use rand::Rng;
use tracing::info;
use trialkit_core::{
    AssetCatalog, AssetResolver, BankFormat, CorpusLoader, Item, PermissiveResolver,
    SessionConfig,
};

use crate::config::{RawSessionConfig, RawTrialkitConfig};

/// Arguments shared by commands that build a session.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Item bank: CSV with a header row (`.csv`) or a JSON array of row objects
    pub bank: PathBuf,

    /// Asset catalog (JSON). Without one every asset is assumed present
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Maximum session length in minutes
    #[arg(long)]
    pub max_minutes: Option<f64>,

    /// Consecutive misses that skip the rest of a trial type
    #[arg(long)]
    pub max_incorrect: Option<u32>,

    /// Requested number of test trials
    #[arg(long)]
    pub trials: Option<usize>,

    /// Number of stimulus blocks
    #[arg(long)]
    pub blocks: Option<usize>,

    /// Items per asset preload batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Shuffle test items within each trial type
    #[arg(long)]
    pub randomize: bool,

    /// Split the adaptive pool by block index
    #[arg(long)]
    pub group_by_block: bool,
}

impl SessionArgs {
    /// Session settings given on the command line, as the last config layer.
    pub fn overrides(&self) -> RawTrialkitConfig {
        RawTrialkitConfig {
            session: RawSessionConfig {
                max_time_minutes: self.max_minutes,
                max_incorrect: self.max_incorrect,
                number_of_trials: self.trials,
                stimulus_blocks: self.blocks,
                batch_size: self.batch_size,
                randomize: self.randomize.then_some(true),
                group_by_block: self.group_by_block.then_some(true),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Load the item bank, choosing the format by extension. An unparseable
/// bank yields an empty corpus.
pub fn load_items<R: Rng + ?Sized>(
    path: &Path,
    config: &SessionConfig,
    rng: &mut R,
) -> Result<Vec<Item>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read item bank {}", path.display()))?;
    let format = BankFormat::from_path(path);
    let items = CorpusLoader::from_config(config).load_bank_or_empty(format, &text, rng);
    info!(path = %path.display(), ?format, items = items.len(), "Loaded item bank");
    Ok(items)
}

pub fn load_catalog(path: &Path) -> Result<AssetCatalog> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read asset catalog {}", path.display()))?;
    let catalog = serde_json::from_str(&json)
        .with_context(|| format!("Invalid asset catalog {}", path.display()))?;
    Ok(catalog)
}

pub fn load_resolver(path: Option<&Path>) -> Result<Arc<dyn AssetResolver>> {
    let resolver: Arc<dyn AssetResolver> = match path {
        Some(path) => Arc::new(load_catalog(path)?),
        None => Arc::new(PermissiveResolver),
    };
    Ok(resolver)
}
