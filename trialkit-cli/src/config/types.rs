use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use trialkit_core::SessionConfig;
use trialkit_core::config::{AssetFieldsConfig, StartItemsConfig, StoppingConfig, TimerConfig};
use trialkit_core::{ChoiceOrder, EmptyCorpusPolicy};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawTrialkitConfig {
    #[serde(default)]
    pub session: RawSessionConfig,

    #[serde(default)]
    pub simulation: RawSimulationConfig,
}

/// Session settings as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawSessionConfig {
    pub max_time_minutes: Option<f64>,
    pub num_practice_trials: Option<usize>,
    pub max_incorrect: Option<u32>,
    pub number_of_trials: Option<usize>,
    pub stimulus_blocks: Option<usize>,
    pub batch_size: Option<usize>,
    pub randomize: Option<bool>,
    pub heavy_instructions: Option<bool>,
    pub group_by_block: Option<bool>,
    pub run_unnormed: Option<bool>,
    pub choice_order: Option<ChoiceOrder>,
    pub empty_corpus: Option<EmptyCorpusPolicy>,
    /// Shorthand for `timer.safety_buffer_ms`; wins over the `timer` section
    pub safety_buffer_ms: Option<u64>,

    /// Sections are replaced as a whole
    pub start_items: Option<StartItemsConfig>,
    pub stopping: Option<StoppingConfig>,
    pub timer: Option<TimerConfig>,
    pub assets: Option<AssetFieldsConfig>,
}

/// Simulation settings as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawSimulationConfig {
    pub true_theta: Option<f64>,
    pub seed: Option<u64>,
    pub latency_ms: Option<u64>,
    pub engine: Option<EngineKind>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrialkitConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Item selection used by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Present items in pool order
    #[default]
    Sequential,
    /// Present the most informative item at the current estimate
    MaxInformation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Ability of the simulated respondent
    pub true_theta: f64,

    /// Seed for item sampling, choice shuffling and simulated answers
    pub seed: u64,

    /// Simulated response latency
    pub latency_ms: u64,

    pub engine: EngineKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            true_theta: 0.0,
            seed: DEFAULT_SEED,
            latency_ms: DEFAULT_LATENCY_MS,
            engine: EngineKind::default(),
        }
    }
}

/// Default seed for simulated sessions
pub const DEFAULT_SEED: u64 = 7;

/// Default simulated response latency
pub const DEFAULT_LATENCY_MS: u64 = 1500;
