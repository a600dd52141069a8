use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "trialkit", about = "Adaptive trial session orchestrator")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pools, phases and asset batches for an item bank
    Plan(commands::plan::PlanArgs),
    /// Run a session against a simulated respondent
    Simulate(commands::simulate::SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Records go to stdout, logs to stderr. RUST_LOG wins over --verbose.
    let filter = log_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Simulate(args) => commands::simulate::run(args).await,
    }
}

fn log_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    #[serial]
    fn test_log_filter_defaults_follow_verbose() {
        unsafe { std::env::remove_var("RUST_LOG") };
        assert_eq!(log_filter(false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(true).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    #[serial]
    fn test_log_filter_prefers_rust_log() {
        unsafe { std::env::set_var("RUST_LOG", "trialkit_core=trace") };
        let filter = log_filter(false);
        unsafe { std::env::remove_var("RUST_LOG") };
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }
}
