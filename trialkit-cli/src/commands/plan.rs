//! Show how an item bank would be partitioned and preloaded.

use anyhow::Result;
use clap::Args;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use trialkit_core::assets::{AssetBatch, AssetKey, AssetKind};
use trialkit_core::session::Phase;
use trialkit_core::{SessionConfig, SessionPlan};

use super::{SessionArgs, load_catalog, load_items};
use crate::config::{ConfigLoader, RawSimulationConfig};

/// Plan arguments.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Seed for start-item sampling and shuffling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct PoolReport {
    pub name: String,
    pub items: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub items: usize,
    pub pools: Vec<PoolReport>,
    pub phases: Vec<Phase>,
    pub batches: Vec<AssetBatch>,
    /// Catalog assets no batch needs. Only known when a catalog is given.
    pub leftover: Option<Vec<(AssetKind, AssetKey)>>,
}

impl PlanReport {
    pub fn new(plan: &SessionPlan, leftover: Option<Vec<(AssetKind, AssetKey)>>) -> Self {
        Self {
            items: plan.item_count(),
            pools: plan
                .corpus
                .names()
                .map(|name| PoolReport {
                    name: name.to_string(),
                    items: plan.corpus.pool(name).map_or(0, |pool| pool.len()),
                })
                .collect(),
            phases: plan.phases.clone(),
            batches: plan.assets.batches().to_vec(),
            leftover,
        }
    }
}

impl std::fmt::Display for PlanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Items: {}", self.items)?;

        writeln!(f, "\nPools:")?;
        for pool in &self.pools {
            writeln!(f, "  {:<22} {:>5}", pool.name, pool.items)?;
        }

        writeln!(f, "\nPhases:")?;
        for phase in &self.phases {
            let budget = phase
                .budget
                .map_or_else(|| "all".to_string(), |b| b.to_string());
            writeln!(
                f,
                "  {:<22} block {:<3} budget {}",
                phase.pool.to_string(),
                phase.block,
                budget
            )?;
        }

        writeln!(f, "\nAsset batches:")?;
        for batch in &self.batches {
            writeln!(
                f,
                "  #{:<3} {:>3} items  {:>3} images  {:>3} audio",
                batch.index,
                batch.items.len(),
                batch.images.len(),
                batch.audio.len()
            )?;
        }

        if let Some(leftover) = &self.leftover {
            writeln!(f, "\nLeftover assets: {}", leftover.len())?;
            for (kind, key) in leftover {
                writeln!(f, "  {:?} {}", kind, key)?;
            }
        }
        Ok(())
    }
}

/// Build the plan an actual session would use.
pub fn build_plan(args: &PlanArgs, config: &SessionConfig, seed: u64) -> Result<PlanReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let items = load_items(&args.session.bank, config, &mut rng)?;
    let plan = SessionPlan::build(items, config, &mut rng);

    let leftover = match &args.session.assets {
        Some(path) => Some(plan.assets.leftover_assets(&load_catalog(path)?)),
        None => None,
    };
    Ok(PlanReport::new(&plan, leftover))
}

/// Run plan command.
pub fn run(args: PlanArgs) -> Result<()> {
    let mut overrides = args.session.overrides();
    overrides.simulation = RawSimulationConfig {
        seed: args.seed,
        ..Default::default()
    };
    let config = ConfigLoader::load(overrides)?;

    let report = build_plan(&args, &config.session, config.simulation.seed)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
