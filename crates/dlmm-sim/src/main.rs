use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dlmm_core::{DlmmEngine, EngineConfig};
use dlmm_sim::{Runner, Scenario};

#[derive(Parser, Debug)]
#[command(name = "dlmm-sim")]
#[command(about = "Replay a liquidity scenario against the DLMM settlement engine")]
struct Args {
    /// Path to engine configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Path to scenario file
    #[arg(short, long)]
    scenario: String,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    info!(
        max_bin_walk = config.max_bin_walk,
        default_fee_bps = config.default_fee_bps,
        "Loaded engine configuration"
    );

    let engine = DlmmEngine::new(config)?;
    let scenario = Scenario::load(&args.scenario)?;
    let report = Runner::new(engine, &scenario).run(&scenario)?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("Failed to encode report")?;
    println!("{}", output);

    if !report.conservation.holds {
        warn!("Token totals do not reconcile");
        bail!("conservation check failed for scenario {}", args.scenario);
    }
    info!(steps = report.steps.len(), "Scenario complete");
    Ok(())
}
