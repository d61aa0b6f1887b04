//! # EMS Edge Binary
//!
//! Loads the site configuration, builds one controller per device and runs
//! the cycle loop until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Run the site described in config/edge.toml
//! ems_edge --config config/edge.toml
//!
//! # Verbose logging, stop after 120 cycles
//! ems_edge -c config/edge.toml -v --cycles 120
//! ```

use clap::Parser;
use ems_common::clock::SystemClock;
use ems_edge::{CycleRunner, DriverRegistry, EdgeConfig, Fleet};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// EMS Edge - device lifecycle scheduler
#[derive(Parser, Debug)]
#[command(name = "ems_edge")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Cyclic scheduler for battery, inverter and ESS state machines")]
#[command(long_about = None)]
struct Args {
    /// Path to the site configuration file
    #[arg(short, long, default_value = "config/edge.toml")]
    config: PathBuf,

    /// Enable verbose logging (overrides log_level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Stop after this many cycles
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("EMS edge failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load first so that log_level applies; report the error once tracing is up.
    let config = EdgeConfig::load_validated(&args.config);
    let level = match (&config, args.verbose) {
        (_, true) => Level::DEBUG,
        (Ok(config), false) => config.shared.log_level.into(),
        (Err(_), false) => Level::INFO,
    };
    setup_tracing(level, args.json);

    info!("EMS edge v{} starting...", env!("CARGO_PKG_VERSION"));
    let config = config?;
    info!(
        service = %config.shared.service_name,
        config = %args.config.display(),
        "configuration loaded"
    );

    let registry = DriverRegistry::with_builtin();
    let mut fleet = Fleet::build(&config, &registry)?;
    info!(
        batteries = config.batteries.len(),
        inverters = config.inverters.len(),
        ess = config.ess.len(),
        "fleet built"
    );

    let mut runner = CycleRunner::new(&config.cycle)?;
    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    runner.run(&mut fleet, &SystemClock, args.cycles)?;

    info!("EMS edge shutdown complete");
    Ok(())
}

/// Setup tracing subscriber.
fn setup_tracing(level: Level, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
