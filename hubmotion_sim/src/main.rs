//! # hubmotion simulator binary
//!
//! Plays a motion scenario against simulated motors and streams telemetry
//! as JSON lines on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Run the scenario embedded in the config for its configured duration
//! hubmotion_sim --config config/arm.toml
//!
//! # Separate scenario file, fixed number of control periods
//! hubmotion_sim --config config/arm.toml --scenario stall.toml --ticks 2000
//!
//! # Pace the loop to wall-clock time, debug logs as JSON
//! hubmotion_sim --config config/arm.toml --realtime -v --json
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use hubmotion_common::config::ConfigLoader;
use hubmotion_common::consts::CONTROL_LOOP_TIME_MS;
use hubmotion_sim::{MonotonicClock, Pacer, Scenario, ScenarioRunner, SimConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// hubmotion simulator - run motion scenarios on simulated LEGO motors
#[derive(Parser, Debug)]
#[command(name = "hubmotion_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Run motion scenarios on simulated hub motors")]
#[command(long_about = None)]
struct Args {
    /// Simulator configuration (shared + sim + axes + optional scenario).
    #[arg(short, long, default_value = "config/arm.toml")]
    config: PathBuf,

    /// Scenario file replacing the one embedded in the configuration.
    #[arg(short, long, value_name = "FILE")]
    scenario: Option<PathBuf>,

    /// Number of control periods to simulate (default: sim.duration_ms).
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Pace control periods to wall-clock time.
    #[arg(short, long)]
    realtime: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        // Tracing may not be up yet if the configuration failed to load.
        error!("Simulation failed: {}", e);
        eprintln!("hubmotion_sim: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = SimConfig::load(&args.config)?;
    if let Some(path) = &args.scenario {
        config.scenario = Scenario::load(path)?;
    }

    setup_tracing(&args, &config);
    info!("Loaded config from {:?}", args.config);
    info!(
        "hubmotion_sim v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let mut runner = ScenarioRunner::from_config(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let periods = args
        .ticks
        .unwrap_or(config.sim.duration_ms as u64 / CONTROL_LOOP_TIME_MS as u64);
    let every = config.sim.telemetry_every as u64;
    let mut pacer = if args.realtime {
        Some(Pacer::new(MonotonicClock::new()?))
    } else {
        None
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for _ in 0..periods {
        if !running.load(Ordering::SeqCst) {
            warn!("Stopped after {} periods", runner.stats().periods);
            break;
        }
        runner.step();
        if runner.stats().periods % every == 0 {
            let frame = runner.telemetry()?;
            serde_json::to_writer(&mut out, &frame)?;
            writeln!(out)?;
        }
        if let Some(pacer) = pacer.as_mut() {
            pacer.wait();
        }
    }
    out.flush()?;

    let stats = runner.stats();
    info!(
        "Simulation complete: {} periods, {} commands ({} rejected), {} tick errors",
        stats.periods,
        stats.commands_applied + stats.commands_rejected,
        stats.commands_rejected,
        stats.tick_errors
    );
    if let Some(pacer) = pacer {
        info!("Timing violations: {}", pacer.overruns());
    }
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
///
/// Logs go to stderr; stdout carries telemetry.
fn setup_tracing(args: &Args, config: &SimConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        config.shared.log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
