mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    EngineKind, RawSessionConfig, RawSimulationConfig, RawTrialkitConfig, TrialkitConfig,
};
