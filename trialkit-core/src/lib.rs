//! trialkit-core - Adaptive trial session engine
//!
//! Loads an item bank, partitions it into warm-up, adaptive and instruction
//! pools, plans incremental asset preloading and runs a session that feeds
//! responses to an external IRT engine under a time budget and a
//! failure-skipping policy.

pub mod assets;
pub mod choices;
pub mod config;
pub mod corpus;
pub mod error;
pub mod item;
pub mod partition;
pub mod selector;
pub mod session;
pub mod skipper;
pub mod timer;

pub use assets::{
    AssetBatch, AssetCatalog, AssetKey, AssetKind, AssetPlan, AssetPreloader, AssetResolver,
    PermissiveResolver, RecordingPreloader,
};
pub use choices::{ChoiceOrder, ChoicePreparer, ChoiceSet};
pub use config::{EmptyCorpusPolicy, SessionConfig};
pub use corpus::{BankFormat, Corpus, CorpusLoader, ItemPool, PoolName};
pub use error::{Result, TrialkitError};
pub use item::{Answer, AssessmentStage, IrtParams, Item, ItemId, TrialType};
pub use partition::{PreparedCorpus, group_by_block, prepare_corpus, stimulus_block_counts};
pub use selector::{
    AdaptiveSelector, IrtEngine, MaxInformationEngine, SequentialEngine, StoppingRule, Zeta,
};
pub use session::{
    Collaborators, InMemoryTrialSink, ScriptedRenderer, Session, SessionPlan, SessionSummary,
    TrialRecord, TrialRenderer, TrialRequest, TrialResponse, TrialSink,
};
pub use skipper::FailureSkipper;
pub use timer::{EndLatch, EndReason, SessionTimer};
