mod api;
mod db;
mod services;
mod types;

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use api::agents::AppState;

#[derive(Parser, Debug)]
#[command(name = "fleetpulse-collector")]
#[command(about = "Fleet heartbeat collector", long_about = None)]
struct Args {
    /// Bind address for HTTP server
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Database file path
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Seconds without a heartbeat before a PC is marked OFFLINE
    #[arg(long, default_value_t = 10)]
    offline_after: u64,

    /// Run session time-to-live in seconds
    #[arg(long, default_value_t = 900)]
    session_ttl: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting FleetPulse Collector");

    // Initialize database
    let db = db::init_db(args.db_path)?;

    let offline_after = Duration::from_secs(args.offline_after);
    let session_ttl = Duration::from_secs(args.session_ttl);

    // Create application state
    let state = Arc::new(AppState {
        db: db.clone(),
        session_ttl,
    });

    // Start presence monitor in background
    let monitor_db = db.clone();
    tokio::spawn(async move {
        if let Err(e) = services::presence_monitor(monitor_db, offline_after).await {
            tracing::error!("Presence monitor failed: {}", e);
        }
    });

    // Start session sweeper in background
    tokio::spawn(async move {
        if let Err(e) = services::session_sweeper(db, session_ttl).await {
            tracing::error!("Session sweeper failed: {}", e);
        }
    });

    // Create router
    let app = api::create_router(state);

    // Parse bind address
    let addr: SocketAddr = args.bind.parse()?;
    info!("Listening on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
