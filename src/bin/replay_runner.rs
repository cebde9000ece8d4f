//! Headless Replay Runner
//!
//! Feeds a recorded (or synthetic) frame sequence through the full pipeline in
//! lockstep and prints a JSON summary. Useful for tuning policy files offline.

use vault_autopilot::control::{run_lockstep, LoggingActuator, Orchestrator, RunSummary, StatusBoard};
use vault_autopilot::core::{load_config, save_config, AutopilotConfig, Result};
use vault_autopilot::vision::{ReplayVision, SyntheticVision, VaultScenario};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Headless Replay Runner - pipeline summary for a frame sequence
#[derive(Parser, Debug)]
#[command(name = "replay_runner")]
#[command(about = "Run recorded or synthetic frames through the autopilot and output a summary")]
struct Args {
    /// Policy file (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines recording of frames; a synthetic vault is used when omitted
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Seed for the synthetic vault
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many frames
    #[arg(long, default_value_t = 200)]
    frames: u64,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Write the effective policy (defaults filled in) to this TOML file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Log per-cycle detail to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct ReplayResult {
    source: String,
    seed: Option<u64>,
    #[serde(flatten)]
    summary: RunSummary,
    final_state_cycle: Option<u64>,
    dwellers: usize,
    rooms: usize,
    pending_incidents: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(if args.verbose {
            "vault_autopilot=debug"
        } else {
            "vault_autopilot=warn"
        })
        .init();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AutopilotConfig::default(),
    };
    if let Some(path) = &args.save_config {
        save_config(&config, path)?;
    }

    let rt = Runtime::new()?;
    let board = StatusBoard::new();
    let mut orchestrator = Orchestrator::new(&config, LoggingActuator::new(), board.clone());

    let (source, seed, summary) = match &args.replay {
        Some(path) => {
            let vision = ReplayVision::from_path(path)?;
            let summary = rt.block_on(run_lockstep(&config, vision, &mut orchestrator, Some(args.frames)))?;
            (path.display().to_string(), None, summary)
        }
        None => {
            let seed = args.seed.unwrap_or_else(rand::random);
            let vision = SyntheticVision::new(VaultScenario::starter_vault(), seed);
            let summary = rt.block_on(run_lockstep(&config, vision, &mut orchestrator, Some(args.frames)))?;
            ("synthetic".to_string(), Some(seed), summary)
        }
    };

    let state = board.current_state();
    let result = ReplayResult {
        source,
        seed,
        summary,
        final_state_cycle: state.as_ref().map(|s| s.cycle),
        dwellers: state.as_ref().map_or(0, |s| s.dwellers.len()),
        rooms: state.as_ref().map_or(0, |s| s.rooms.len()),
        pending_incidents: board.pending_incidents().len(),
    };

    match args.format.as_str() {
        "text" => {
            println!("Replay Result");
            println!("=============");
            println!("Source: {}", result.source);
            if let Some(seed) = result.seed {
                println!("Seed: {}", seed);
            }
            let s = &result.summary;
            println!("Frames: {} ({} cycles, {} skipped)", s.frames, s.cycles, s.skipped);
            println!(
                "Proposals: {} ({} filtered, {} dispatched, {} failed, {} rejected)",
                s.proposed, s.filtered, s.dispatched, s.failed, s.rejected
            );
            println!(
                "Incidents: {} resolved, {} timed out, {} pending",
                s.incidents_resolved, s.incidents_timed_out, result.pending_incidents
            );
            println!("Final state: {} dwellers, {} rooms", result.dwellers, result.rooms);
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
