//! Vault Autopilot - Entry Point
//!
//! Sets up logging and the async runtime, loads the policy file, and provides
//! a small control prompt for starting, stopping and inspecting the autopilot.

use vault_autopilot::control::{spawn_autopilot, AutopilotHandle, LoggingActuator, StatusBoard};
use vault_autopilot::core::{load_config, AutopilotConfig, Result};
use vault_autopilot::vision::{ReplayVision, SyntheticVision, VaultScenario};

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Vault Autopilot - automated vault management
#[derive(Parser, Debug)]
#[command(name = "vault-autopilot")]
struct Args {
    /// Policy file (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay frames from a JSON-lines recording instead of the synthetic vault
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Seed for the synthetic vault
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vault_autopilot=info")),
        )
        .init();

    tracing::info!("Vault Autopilot starting...");

    // A broken policy file is the one fatal error
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AutopilotConfig::default(),
    };

    let rt = Runtime::new()?;
    let board = StatusBoard::new();
    let mut running: Option<AutopilotHandle> = None;

    println!("\n=== VAULT AUTOPILOT ===");
    println!();
    println!("Commands:");
    println!("  start / go      - Start capture and decision loops");
    println!("  stop            - Stop after the current cycle");
    println!("  status / s      - Show counters and the latest snapshot");
    println!("  incidents / i   - List incidents being handled");
    println!("  quit / q        - Stop and exit");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input {
            "" => continue,
            "quit" | "q" => break,
            "start" | "go" => {
                if running.as_ref().is_some_and(|h| !h.is_finished()) {
                    println!("Already running.");
                    continue;
                }
                if let Some(done) = running.take() {
                    report_stopped(&rt, done);
                }
                let _guard = rt.enter();
                let handle = match &args.replay {
                    Some(path) => match ReplayVision::from_path(path) {
                        Ok(vision) => spawn_autopilot(&config, vision, LoggingActuator::new(), board.clone()),
                        Err(e) => {
                            println!("Cannot load {}: {}", path.display(), e);
                            continue;
                        }
                    },
                    None => {
                        let vision = SyntheticVision::new(VaultScenario::starter_vault(), args.seed);
                        spawn_autopilot(&config, vision, LoggingActuator::new(), board.clone())
                    }
                };
                running = Some(handle);
                println!("Autopilot started.");
            }
            "stop" => match running.take() {
                Some(handle) => {
                    handle.stop();
                    report_stopped(&rt, handle);
                }
                None => println!("Not running."),
            },
            "status" | "s" => display_status(&board, running.as_ref()),
            "incidents" | "i" => display_incidents(&board),
            other => println!("Unknown command: {}", other),
        }
    }

    if let Some(handle) = running.take() {
        handle.stop();
        report_stopped(&rt, handle);
    }
    tracing::info!("Vault Autopilot exiting");
    Ok(())
}

fn report_stopped(rt: &Runtime, handle: AutopilotHandle) {
    match rt.block_on(handle.join()) {
        Ok(summary) => println!(
            "Stopped after {} frames, {} cycles, {} actions dispatched.",
            summary.frames, summary.cycles, summary.dispatched
        ),
        Err(e) => println!("Autopilot ended with an error: {}", e),
    }
}

fn display_status(board: &StatusBoard, running: Option<&AutopilotHandle>) {
    let active = running.is_some_and(|h| !h.is_finished());
    let c = board.counters();
    println!("\n--- Status ({}) ---", if active { "running" } else { "idle" });
    println!(
        "Cycles: {} ({} skipped) | Dispatched: {} | Rejected: {}",
        c.cycles, c.skipped, c.dispatched, c.rejected
    );
    println!(
        "Incidents: {} resolved, {} timed out",
        c.resolved_incidents, c.timed_out_incidents
    );

    let Some(state) = board.current_state() else {
        println!("No trusted snapshot yet.");
        return;
    };
    println!("Snapshot cycle {} at {}ms", state.cycle, state.timestamp_ms);
    for (kind, level) in &state.resources {
        match level.fraction() {
            Some(f) => println!("  {:<9} {:>6.1} / {:<6.0} ({:.0}%)", kind.label(), level.level, level.capacity, f * 100.0),
            None => println!("  {:<9} {:>6.1} (capacity unknown)", kind.label(), level.level),
        }
    }
    for room in &state.rooms {
        println!(
            "  {} {:?} L{} [{}/{}] progress {:.0}%",
            room.id,
            room.room_type,
            room.level,
            room.assigned_dwellers.len(),
            room.capacity,
            room.production_progress * 100.0
        );
    }
    for dweller in &state.dwellers {
        let place = match dweller.current_room {
            Some(room) => room.to_string(),
            None => "idle".to_string(),
        };
        println!("  {} {} (L{}, {} hp) - {}", dweller.id, dweller.name, dweller.level, dweller.health, place);
    }
    println!();
}

fn display_incidents(board: &StatusBoard) {
    let incidents = board.pending_incidents();
    if incidents.is_empty() {
        println!("No active incidents.");
        return;
    }
    for incident in incidents {
        println!(
            "  {} since cycle {}, {} responses sent",
            incident, incident.detected_cycle, incident.responses_sent
        );
    }
}
