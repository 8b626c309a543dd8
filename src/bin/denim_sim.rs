//! DenIM simulation CLI.
//!
//! Loads the simulation configuration, provisions a local-process client
//! fleet, and runs one traffic-generation pass. Containerized fleets are
//! driven by external tooling that implements the runtime interfaces.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use denim::config::Config;
use denim::runtime::{ClientHandle, LocalProcessFactory};
use denim::sim::TrafficSimulator;

/// Synthetic DenIM traffic generation over a local client fleet.
#[derive(Parser)]
#[command(name = "denim-sim", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulated agents (overrides config)
    #[arg(long)]
    population: Option<usize>,

    /// Traffic generation time in seconds (overrides config)
    #[arg(long)]
    duration: Option<u64>,

    /// Master RNG seed (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Directory run logs are written under (overrides config)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Client command, e.g. --client-cmd ./client (overrides config)
    #[arg(long, num_args = 1.., value_name = "ARGV")]
    client_cmd: Option<Vec<String>>,

    /// Validate the configuration and print the plan without running
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .apply_env();

    if let Some(population) = args.population {
        config.simulation.population = population;
    }
    if let Some(duration) = args.duration {
        config.simulation.duration_secs = duration;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(output) = args.output {
        config.simulation.output_dir = output;
    }
    if let Some(client_cmd) = args.client_cmd {
        config.client.command = client_cmd;
    }

    config.validate()?;

    if args.dry_run {
        tracing::info!(
            "dry run: {} agents, {}s, seed {}, client {:?}",
            config.simulation.population,
            config.simulation.duration_secs,
            config.simulation.seed,
            config.client.command
        );
        return Ok(());
    }

    let clients: Vec<ClientHandle> = (0..config.simulation.population)
        .map(|_| ClientHandle::new(Arc::new(LocalProcessFactory)))
        .collect();

    let run_dir = TrafficSimulator::new(config, clients)?.run().await?;
    tracing::info!("run complete; logs in {:?}", run_dir);
    Ok(())
}
