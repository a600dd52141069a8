use super::types::{
    RawSessionConfig, RawSimulationConfig, RawTrialkitConfig, SimulationConfig, TrialkitConfig,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use trialkit_core::SessionConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (defaults + user + project + overrides)
    pub fn load(overrides: RawTrialkitConfig) -> Result<TrialkitConfig> {
        let mut raw = RawTrialkitConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path() {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        raw = Self::merge_raw(raw, Self::read_raw(&Self::project_config_path())?);

        // Layer 3: Command-line flags
        raw = Self::merge_raw(raw, overrides);

        let config = Self::finalize(raw);
        config.session.validate()?;
        Ok(config)
    }

    /// Load a single config file, applying defaults for anything unset
    pub fn load_from_path(path: &Path) -> Result<TrialkitConfig> {
        Ok(Self::finalize(Self::read_raw(path)?))
    }

    /// Read a raw layer. Missing files are an empty layer.
    fn read_raw(path: &Path) -> Result<RawTrialkitConfig> {
        if !path.exists() {
            return Ok(RawTrialkitConfig::default());
        }
        debug!(path = %path.display(), "Reading config layer");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(raw)
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("trialkit").join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TRIALKIT_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TRIALKIT_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".trialkit/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawTrialkitConfig, overlay: RawTrialkitConfig) -> RawTrialkitConfig {
        let (b, o) = (base.session, overlay.session);
        RawTrialkitConfig {
            session: RawSessionConfig {
                max_time_minutes: o.max_time_minutes.or(b.max_time_minutes),
                num_practice_trials: o.num_practice_trials.or(b.num_practice_trials),
                max_incorrect: o.max_incorrect.or(b.max_incorrect),
                number_of_trials: o.number_of_trials.or(b.number_of_trials),
                stimulus_blocks: o.stimulus_blocks.or(b.stimulus_blocks),
                batch_size: o.batch_size.or(b.batch_size),
                randomize: o.randomize.or(b.randomize),
                heavy_instructions: o.heavy_instructions.or(b.heavy_instructions),
                group_by_block: o.group_by_block.or(b.group_by_block),
                run_unnormed: o.run_unnormed.or(b.run_unnormed),
                choice_order: o.choice_order.or(b.choice_order),
                empty_corpus: o.empty_corpus.or(b.empty_corpus),
                safety_buffer_ms: o.safety_buffer_ms.or(b.safety_buffer_ms),
                start_items: o.start_items.or(b.start_items),
                stopping: o.stopping.or(b.stopping),
                timer: o.timer.or(b.timer),
                assets: o.assets.or(b.assets),
            },
            simulation: RawSimulationConfig {
                true_theta: overlay.simulation.true_theta.or(base.simulation.true_theta),
                seed: overlay.simulation.seed.or(base.simulation.seed),
                latency_ms: overlay.simulation.latency_ms.or(base.simulation.latency_ms),
                engine: overlay.simulation.engine.or(base.simulation.engine),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawTrialkitConfig) -> TrialkitConfig {
        let defaults = SessionConfig::default();
        let s = raw.session;
        let mut session = SessionConfig {
            max_time_minutes: s.max_time_minutes.unwrap_or(defaults.max_time_minutes),
            num_practice_trials: s.num_practice_trials.unwrap_or(defaults.num_practice_trials),
            max_incorrect: s.max_incorrect.unwrap_or(defaults.max_incorrect),
            number_of_trials: s.number_of_trials.unwrap_or(defaults.number_of_trials),
            stimulus_blocks: s.stimulus_blocks.unwrap_or(defaults.stimulus_blocks),
            batch_size: s.batch_size.unwrap_or(defaults.batch_size),
            randomize: s.randomize.unwrap_or(defaults.randomize),
            heavy_instructions: s.heavy_instructions.unwrap_or(defaults.heavy_instructions),
            group_by_block: s.group_by_block.unwrap_or(defaults.group_by_block),
            run_unnormed: s.run_unnormed.unwrap_or(defaults.run_unnormed),
            choice_order: s.choice_order.unwrap_or(defaults.choice_order),
            empty_corpus: s.empty_corpus.unwrap_or(defaults.empty_corpus),
            start_items: s.start_items.unwrap_or(defaults.start_items),
            stopping: s.stopping.unwrap_or(defaults.stopping),
            timer: s.timer.unwrap_or(defaults.timer),
            assets: s.assets.unwrap_or(defaults.assets),
        };
        if let Some(buffer) = s.safety_buffer_ms {
            session.timer.safety_buffer_ms = buffer;
        }

        let sim_defaults = SimulationConfig::default();
        let sim = raw.simulation;
        TrialkitConfig {
            session,
            simulation: SimulationConfig {
                true_theta: sim.true_theta.unwrap_or(sim_defaults.true_theta),
                seed: sim.seed.unwrap_or(sim_defaults.seed),
                latency_ms: sim.latency_ms.unwrap_or(sim_defaults.latency_ms),
                engine: sim.engine.unwrap_or(sim_defaults.engine),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::EngineKind;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;
    use trialkit_core::assets::ItemField;
    use trialkit_core::{ChoiceOrder, EmptyCorpusPolicy};

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", contents).unwrap();
        path
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.session.max_incorrect, 3);
        assert_eq!(config.session.num_practice_trials, 2);
        assert_eq!(config.session.empty_corpus, EmptyCorpusPolicy::Proceed);
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
[session]
max_time_minutes = 12.5
batch_size = 4
empty_corpus = "fail"
safety_buffer_ms = 3000

[simulation]
true_theta = 1.25
"#,
        );

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.session.max_time_minutes, 12.5);
        assert_eq!(config.session.batch_size, 4);
        assert_eq!(config.session.empty_corpus, EmptyCorpusPolicy::Fail);
        assert_eq!(config.session.timer.safety_buffer_ms, 3000);
        assert_eq!(config.simulation.true_theta, 1.25);
        assert_eq!(config.simulation.engine, EngineKind::Sequential);
    }

    #[test]
    fn test_load_timer_and_asset_field_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            r#"
[session.timer]
safety_buffer_ms = 4500

[session.assets]
image_fields = ["image", "distractors", "answer"]
"#,
        );

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.session.timer.safety_buffer_ms, 4500);
        assert_eq!(
            config.session.assets.image_fields,
            vec![ItemField::Image, ItemField::Distractors, ItemField::Answer]
        );
        assert_eq!(config.session.assets.audio_fields, vec![ItemField::AudioFile]);
    }

    #[test]
    fn test_safety_buffer_shorthand_wins_over_timer_section() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            &temp_dir,
            "[session]\nsafety_buffer_ms = 1000\n\n[session.timer]\nsafety_buffer_ms = 4500\n",
        );

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.session.timer.safety_buffer_ms, 1000);
    }

    #[test]
    fn test_load_unknown_key_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "[session.assets]\nimage_field = [\"image\"]\n");

        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(&temp_dir, "this is not valid toml {{{{");

        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawTrialkitConfig {
            session: RawSessionConfig {
                max_incorrect: Some(5),
                batch_size: Some(8),
                choice_order: Some(ChoiceOrder::No),
                ..Default::default()
            },
            simulation: RawSimulationConfig {
                seed: Some(1),
                ..Default::default()
            },
        };
        let overlay = RawTrialkitConfig {
            session: RawSessionConfig {
                max_incorrect: Some(2),
                batch_size: None, // Should preserve base value
                ..Default::default()
            },
            simulation: RawSimulationConfig {
                engine: Some(EngineKind::MaxInformation),
                ..Default::default()
            },
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.session.max_incorrect, Some(2));
        assert_eq!(merged.session.batch_size, Some(8));
        assert_eq!(merged.session.choice_order, Some(ChoiceOrder::No));
        assert_eq!(merged.simulation.seed, Some(1));
        assert_eq!(merged.simulation.engine, Some(EngineKind::MaxInformation));
    }

    #[test]
    #[serial]
    fn test_project_config_layer_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            &temp_dir,
            r#"
[session]
batch_size = 6
stimulus_blocks = 2
"#,
        );
        unsafe { std::env::set_var("TRIALKIT_PROJECT_CONFIG_DIR", temp_dir.path()) };

        let overrides = RawTrialkitConfig {
            session: RawSessionConfig {
                stimulus_blocks: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = ConfigLoader::load(overrides);

        unsafe { std::env::remove_var("TRIALKIT_PROJECT_CONFIG_DIR") };

        let config = config.unwrap();
        assert_eq!(config.session.batch_size, 6);
        assert_eq!(config.session.stimulus_blocks, 4);
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        write_config(&temp_dir, "[session]\nbatch_size = 0\n");
        unsafe { std::env::set_var("TRIALKIT_PROJECT_CONFIG_DIR", temp_dir.path()) };

        let result = ConfigLoader::load(RawTrialkitConfig::default());

        unsafe { std::env::remove_var("TRIALKIT_PROJECT_CONFIG_DIR") };
        assert!(result.is_err());
    }

    #[test]
    fn test_user_config_path_returns_some() {
        let path = ConfigLoader::user_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("trialkit"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_path() {
        let path = ConfigLoader::project_config_path();
        assert_eq!(path, PathBuf::from(".trialkit/config.toml"));
    }
}
