//! Deribit position robot - entry point.
//!
//! Accumulates a long position toward a target volume with IOC limit orders
//! while the price stays under a ceiling, and sells it down once the cooldown
//! deadline passes or the last trade breaks the ceiling.

use anyhow::Result;
use clap::Parser;
use drb_core::{Clock, SystemClock, TradeWindow};
use drb_gateway::DeribitGateway;
use drb_position::{ControllerState, PositionController};
use drb_telemetry::ConsoleReporter;
use drb_ws::{ConnectionManager, TungsteniteConnector};
use std::path::Path;
use tracing::{info, warn};

/// Deribit position robot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DRB_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Target position volume; skips the prompt. Must be a multiple of 10.
    #[arg(long)]
    volume: Option<String>,

    /// Price ceiling; skips the prompt.
    #[arg(long)]
    ceiling: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    drb_ws::init_crypto();

    let args = Args::parse();

    // Determine config path: CLI arg > DRB_CONFIG env var > default
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("DRB_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = drb_bot::AppConfig::load(&config_path)?;
    drb_telemetry::init_logging(&config.log_config())?;

    info!("Starting drb-bot v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&config_path).exists() {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Config file not found, using defaults and environment");
    }
    config.validate()?;
    info!(?config.exchange, ?config.trading, "Effective configuration");

    let user_input = {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        drb_bot::input::collect(
            args.volume.as_deref(),
            args.ceiling.as_deref(),
            &mut input,
            &mut output,
        )?
    };

    let clock = SystemClock;
    let window = TradeWindow::new(
        user_input.target_volume,
        user_input.price_ceiling,
        config.trading.cooldown(),
        clock.now(),
    )?;

    let connection = ConnectionManager::new(
        config.connection_config(),
        TungsteniteConnector,
        config.credentials(),
    );
    let gateway = DeribitGateway::new(config.gateway_config(), connection);
    let controller = PositionController::new(config.controller_config(), clock);
    let reporter = ConsoleReporter::stdout(config.display.clear_console);

    let mut app = drb_bot::Application::new(
        gateway,
        reporter,
        controller,
        ControllerState::new(window),
        config.trading.iteration_interval(),
    );
    app.run().await?;

    Ok(())
}
