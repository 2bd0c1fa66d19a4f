//! NSE intraday trading helper entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kite_daytrader::api::create_router;
use kite_daytrader::broker::KiteBroker;
use kite_daytrader::config::Config;
use kite_daytrader::engine::ExitWatcher;
use kite_daytrader::hours;
use kite_daytrader::metrics;
use kite_daytrader::state::AppState;
use kite_daytrader::utils::shutdown_signal;

/// NSE intraday trading helper on Kite Connect.
#[derive(Parser, Debug)]
#[command(name = "kite-daytrader")]
#[command(about = "Intraday trading helper with a TP/SL exit engine on Kite Connect")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web service and exit watcher (default).
    Run {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("kite_daytrader=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Run { port }) => cmd_run(port).await,
        None => cmd_run(args.port).await,
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("KITE DAYTRADER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Invest Amount: Rs {}", config.invest_amount);
    println!("  Poll Interval: {}s", config.poll_interval_secs);
    println!("  Price Max Age: {}s", config.price_max_age_secs);
    println!("  Redirect URL: {}", config.redirect_url);
    println!("  Port: {}", config.port);
    if config.has_placeholder_token() {
        println!("  WARNING: AUTO_CONFIRM_TOKEN is still the shipped placeholder!");
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the web service and the exit watcher.
async fn cmd_run(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Some(port) = port_override {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    if config.has_placeholder_token() {
        warn!("AUTO_CONFIRM_TOKEN is still the shipped placeholder; set a real secret");
    }

    info!("Configuration loaded successfully");
    info!("Invest amount: Rs {}", config.invest_amount);
    info!("Poll interval: {}s", config.poll_interval_secs);
    info!(
        "NSE session live now: {}",
        if hours::is_market_open_now() { "yes" } else { "no" }
    );

    // Install the Prometheus recorder before any metric is touched.
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    metrics::init_metrics();

    let broker = Arc::new(KiteBroker::new(&config));
    let port = config.port;
    let state = Arc::new(AppState::new(config, broker).with_prometheus(prometheus));

    // Exit watcher runs for the life of the process.
    let watcher = ExitWatcher::new(state.clone());
    tokio::spawn(watcher.run());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    info!("Login at http://localhost:{}/login/start", port);

    let router = create_router(state.clone());
    state.set_ready(true);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
