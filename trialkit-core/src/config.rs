//! Session configuration types.
//!
//! Provides configuration for a trial session including the time budget,
//! practice cap, failure tolerance, warm-up seeding, stopping rule and asset
//! batching.

use serde::{Deserialize, Serialize};

use crate::assets::ItemField;
use crate::choices::ChoiceOrder;
use crate::error::{Result, TrialkitError};

/// Main configuration for a trial session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum session duration in minutes. Values below 1 are raised to 1.
    pub max_time_minutes: f64,
    /// Practice items kept per contiguous run of a trial type.
    pub num_practice_trials: usize,
    /// Consecutive incorrect responses that skip the rest of a trial type.
    pub max_incorrect: u32,
    /// Requested number of test trials across all stimulus blocks.
    pub number_of_trials: usize,
    /// Number of stimulus blocks the test trials are split into.
    pub stimulus_blocks: usize,
    /// Items per asset preload batch.
    pub batch_size: usize,
    /// Shuffle test items within each trial type.
    pub randomize: bool,
    /// Use the expanded (heavy) instruction sequence.
    pub heavy_instructions: bool,
    /// Split the adaptive pool into blocks by block index.
    pub group_by_block: bool,
    /// Present unnormed items after the adaptive phase.
    pub run_unnormed: bool,
    /// Ordering of the choice set handed to the renderer.
    pub choice_order: ChoiceOrder,
    /// What to do when the item bank yields no items.
    pub empty_corpus: EmptyCorpusPolicy,
    /// Non-adaptive warm-up block.
    pub start_items: StartItemsConfig,
    /// Early termination based on recent test responses.
    pub stopping: StoppingConfig,
    /// Time budget enforcement.
    pub timer: TimerConfig,
    /// Which item fields reference media.
    pub assets: AssetFieldsConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_time_minutes: 100.0,
            num_practice_trials: 2,
            max_incorrect: 3,
            number_of_trials: 300,
            stimulus_blocks: 3,
            batch_size: 10,
            randomize: false,
            heavy_instructions: false,
            group_by_block: false,
            run_unnormed: false,
            choice_order: ChoiceOrder::default(),
            empty_corpus: EmptyCorpusPolicy::default(),
            start_items: StartItemsConfig::default(),
            stopping: StoppingConfig::default(),
            timer: TimerConfig::default(),
            assets: AssetFieldsConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Check values that would make a session impossible to run.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TrialkitError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.max_incorrect == 0 {
            return Err(TrialkitError::InvalidConfig(
                "max_incorrect must be at least 1".into(),
            ));
        }
        if self.stimulus_blocks == 0 {
            return Err(TrialkitError::InvalidConfig(
                "stimulus_blocks must be at least 1".into(),
            ));
        }
        if self.stopping.window == 0 || self.stopping.max_incorrect > self.stopping.window {
            return Err(TrialkitError::InvalidConfig(format!(
                "stopping rule needs 0 < max_incorrect ({}) <= window ({})",
                self.stopping.max_incorrect, self.stopping.window
            )));
        }
        if !self.max_time_minutes.is_finite() {
            return Err(TrialkitError::InvalidConfig(
                "max_time_minutes must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Behaviour when the item bank could not be parsed or is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCorpusPolicy {
    /// Run a session with zero trials; it ends immediately as exhausted.
    #[default]
    Proceed,
    /// Refuse to start the session.
    Fail,
}

/// Configuration for the warm-up block of fixed-difficulty start items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartItemsConfig {
    /// Whether start items are drawn and removed from the adaptive pool.
    pub enabled: bool,
    /// Number of start items.
    pub count: usize,
    /// Only items of this block are eligible. `None` accepts every block.
    pub block_index: Option<u32>,
    /// Eligible items have difficulty at or below this value.
    pub max_difficulty: f64,
}

impl Default for StartItemsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 5,
            block_index: Some(0),
            max_difficulty: 0.0,
        }
    }
}

/// Configuration for the recent-history stopping rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoppingConfig {
    pub enabled: bool,
    /// Number of most recent test responses inspected.
    pub window: usize,
    /// Incorrect responses within the window that end the session.
    pub max_incorrect: usize,
}

impl Default for StoppingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 10,
            max_incorrect: 4,
        }
    }
}

/// Configuration for the session time budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    /// Time reserved for the respondent on top of the stimulus audio.
    pub safety_buffer_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            safety_buffer_ms: 2000,
        }
    }
}

/// Item fields whose references are preloaded as images or audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetFieldsConfig {
    pub image_fields: Vec<ItemField>,
    pub audio_fields: Vec<ItemField>,
}

impl Default for AssetFieldsConfig {
    fn default() -> Self {
        Self {
            image_fields: vec![ItemField::Image],
            audio_fields: vec![ItemField::AudioFile],
        }
    }
}
