//! Run a whole session against a simulated respondent.
//!
//! The respondent answers test items with the 4PL probability of a correct
//! response at a fixed true ability. Trial records and the session summary
//! are printed as JSON lines.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};
use trialkit_core::assets::{AssetBatch, AssetKind};
use trialkit_core::selector::Zeta;
use trialkit_core::{
    AssetPreloader, AssetResolver, Collaborators, IrtEngine, MaxInformationEngine,
    SequentialEngine, Session, SessionSummary, TrialRecord, TrialRenderer, TrialRequest,
    TrialResponse, TrialSink,
};

use super::{SessionArgs, load_items, load_resolver};
use crate::config::{ConfigLoader, EngineKind, RawSimulationConfig};

/// Simulation arguments.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// True ability of the simulated respondent
    #[arg(long, allow_negative_numbers = true)]
    pub theta: Option<f64>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Item selection strategy
    #[arg(long, value_enum)]
    pub engine: Option<EngineKind>,

    /// Print only the summary, not every trial record
    #[arg(long)]
    pub summary_only: bool,
}

/// Run simulate command.
pub async fn run(args: SimulateArgs) -> Result<()> {
    let mut overrides = args.session.overrides();
    overrides.simulation = RawSimulationConfig {
        true_theta: args.theta,
        seed: args.seed,
        engine: args.engine,
        ..Default::default()
    };
    let config = ConfigLoader::load(overrides)?;
    let sim = config.simulation.clone();

    let mut rng = StdRng::seed_from_u64(sim.seed);
    let items = load_items(&args.session.bank, &config.session, &mut rng)?;
    let resolver = load_resolver(args.session.assets.as_deref())?;

    let engine: Box<dyn IrtEngine> = match sim.engine {
        EngineKind::Sequential => Box::new(SequentialEngine::new()),
        EngineKind::MaxInformation => Box::new(MaxInformationEngine::new()),
    };

    let collaborators = Collaborators {
        resolver: Arc::clone(&resolver),
        preloader: Arc::new(ResolvingPreloader::new(resolver)),
        renderer: Arc::new(SimulatedRespondent::new(
            sim.true_theta,
            sim.latency_ms,
            sim.seed.wrapping_add(1),
        )),
        sink: Arc::new(JsonLinesSink::new(!args.summary_only)),
    };

    info!(
        true_theta = sim.true_theta,
        engine = ?sim.engine,
        seed = sim.seed,
        "Starting simulated session"
    );
    let session = Session::new(config.session, items, engine, collaborators, rng)?;
    let summary = session.run().await?;

    eprintln!(
        "Session {} ended ({}): {} presented, {} correct, theta {:.3} (true {:.3})",
        summary.session_id,
        summary.end_reason,
        summary.presented,
        summary.correct,
        summary.theta,
        sim.true_theta
    );
    Ok(())
}

/// Answers like a respondent of known ability.
pub struct SimulatedRespondent {
    theta: f64,
    latency_ms: u64,
    rng: Mutex<StdRng>,
}

impl SimulatedRespondent {
    pub fn new(theta: f64, latency_ms: u64, seed: u64) -> Self {
        Self {
            theta,
            latency_ms,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Probability of answering an item correctly. Items without norms are a
    /// coin flip.
    pub fn p_correct(&self, request: &TrialRequest) -> f64 {
        Zeta::from_item(&request.item)
            .map(|zeta| zeta.probability(self.theta))
            .filter(|p| p.is_finite())
            .unwrap_or(0.5)
            .clamp(0.0, 1.0)
    }
}

#[async_trait]
impl TrialRenderer for SimulatedRespondent {
    async fn present(&self, request: &TrialRequest) -> trialkit_core::Result<TrialResponse> {
        let p = self.p_correct(request);
        let mut rng = self.rng.lock().await;
        let is_correct = rng.gen_bool(p);
        let latency_ms = rng.gen_range(self.latency_ms / 2..=self.latency_ms + self.latency_ms / 2);
        debug!(item_id = %request.item.id, p, is_correct, "Simulated response");
        Ok(TrialResponse {
            is_correct,
            latency_ms,
            response_source: "simulated".to_string(),
        })
    }
}

/// Preloader that resolves every key of a batch.
pub struct ResolvingPreloader {
    resolver: Arc<dyn AssetResolver>,
}

impl ResolvingPreloader {
    pub fn new(resolver: Arc<dyn AssetResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl AssetPreloader for ResolvingPreloader {
    async fn preload(&self, batch: &AssetBatch) -> trialkit_core::Result<()> {
        let kinds = batch
            .images
            .iter()
            .map(|key| (AssetKind::Image, key))
            .chain(batch.audio.iter().map(|key| (AssetKind::Audio, key)));
        let resolved = kinds
            .filter(|(kind, key)| self.resolver.resolve(*kind, key).is_some())
            .count();
        debug!(
            batch = batch.index,
            assets = batch.asset_count(),
            resolved,
            "Preloaded asset batch"
        );
        Ok(())
    }
}

/// Prints records and the summary to stdout as JSON lines.
pub struct JsonLinesSink {
    print_records: bool,
}

impl JsonLinesSink {
    pub fn new(print_records: bool) -> Self {
        Self { print_records }
    }
}

#[async_trait]
impl TrialSink for JsonLinesSink {
    async fn record(&self, record: TrialRecord) -> trialkit_core::Result<()> {
        if self.print_records {
            println!("{}", serde_json::to_string(&record)?);
        }
        Ok(())
    }

    async fn finish(&self, summary: &SessionSummary) -> trialkit_core::Result<()> {
        println!("{}", serde_json::to_string(summary)?);
        Ok(())
    }
}
