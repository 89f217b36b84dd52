mod collector_client;
mod facts;
mod journal;
mod types;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use collector_client::{CollectorClient, HeartbeatError};
use journal::Journal;
use types::{HeartbeatRequest, PcStatus, RegisterRequest};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "fleetpulse-agent")]
#[command(about = "FleetPulse heartbeat agent", long_about = None)]
struct Args {
    /// Machine identifier assigned by the operator
    pc_id: String,

    /// Auth token minted when the machine was provisioned
    auth_token: String,

    /// Collector base URL, e.g. http://collector.internal:8080
    collector_url: String,

    /// Path of the append-only agent log file
    #[arg(long, default_value = "agent.log")]
    log_file: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Process-scoped run state shared between the heartbeat loop, in-flight
/// beat tasks, and the signal handler. Owns the one cancellable unit of
/// work (the shutdown token); cancelling twice is harmless, so the shutdown
/// path is safe to enter more than once.
struct AgentState {
    pc_id: String,
    started: Instant,
    last_heartbeat_success: AtomicBool,
    auth_rejected: AtomicBool,
    shutdown: CancellationToken,
    shutdown_reason: tokio::sync::Mutex<Option<String>>,
}

#[tokio::main]
async fn main() {
    // Missing arguments are a configuration error: usage on stderr, exit 1,
    // no network activity.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        },
    };

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

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", err);
        std::process::exit(1);
    }

    let journal = match Journal::open(&args.log_file, &args.pc_id) {
        Ok(journal) => Arc::new(journal),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(1);
        }
    };

    let code = match run(args, journal.clone()).await {
        Ok(code) => code,
        Err(err) => {
            // Unexpected fault: log the detail and go down rather than
            // continue in an unknown state.
            journal.error(&format!("Unexpected failure: {:#}", err));
            1
        }
    };

    std::process::exit(code);
}

async fn run(args: Args, journal: Arc<Journal>) -> Result<i32> {
    let started = Instant::now();

    let client = CollectorClient::new(
        &args.collector_url,
        &args.pc_id,
        &args.auth_token,
        REQUEST_TIMEOUT,
    )
    .context("Failed to create collector client")?;

    journal.info(&format!(
        "Starting agent, collector at {}",
        args.collector_url
    ));

    // Exactly one registration attempt; any failure is fatal and the
    // supervisor is expected to restart us.
    let register = RegisterRequest {
        pc_id: args.pc_id.clone(),
        auth_token: args.auth_token.clone(),
        system_info: facts::register_info(),
    };

    match client.register(&register).await {
        Ok(message) => journal.info(&format!("Registered with collector: {}", message)),
        Err(err) => {
            journal.error(&format!("Registration failed: {}", err));
            return Ok(1);
        }
    }

    let state = Arc::new(AgentState {
        pc_id: args.pc_id.clone(),
        started,
        // The very first heartbeat reports the registration exchange that
        // just succeeded.
        last_heartbeat_success: AtomicBool::new(true),
        auth_rejected: AtomicBool::new(false),
        shutdown: CancellationToken::new(),
        shutdown_reason: tokio::sync::Mutex::new(None),
    });

    // Signal handler: SIGINT and SIGTERM share one shutdown path
    let sig_state = state.clone();
    let sig_journal = journal.clone();
    tokio::spawn(async move {
        let reason = shutdown_signal().await;
        sig_journal.info(&format!("Received {}, shutting down", reason));
        *sig_state.shutdown_reason.lock().await = Some(reason.to_string());
        sig_state.shutdown.cancel();
    });

    // Heartbeat loop. The first tick fires immediately, and every beat runs
    // as its own task so a slow response never delays the next tick.
    let tracker = TaskTracker::new();
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let client = client.clone();
                let state = state.clone();
                let journal = journal.clone();
                tracker.spawn(async move {
                    send_heartbeat(&client, &state, &journal).await;
                });
            }
        }
    }

    // Drain in-flight beats so a late ONLINE report cannot land after the
    // offline notice. Each is bounded by the request timeout.
    tracker.close();
    tracker.wait().await;

    // The timer is gone; decide how to leave.
    if state.auth_rejected.load(Ordering::SeqCst) {
        journal.error("Stopping after credential rejection; no offline notice sent");
        return Ok(1);
    }

    let reason = state
        .shutdown_reason
        .lock()
        .await
        .take()
        .unwrap_or_else(|| "shutdown".to_string());

    // Best-effort OFFLINE notice; its failure never blocks shutdown
    let offline = build_heartbeat(&state, PcStatus::Offline, Some(reason));
    match client.heartbeat(&offline).await {
        Ok(()) => journal.info("Offline notice delivered"),
        Err(err) => journal.warn(&format!("Offline notice failed: {}", err)),
    }

    journal.info("Agent stopped");
    Ok(0)
}

async fn send_heartbeat(client: &CollectorClient, state: &AgentState, journal: &Journal) {
    let beat = build_heartbeat(state, PcStatus::Online, None);

    match client.heartbeat(&beat).await {
        Ok(()) => {
            state.last_heartbeat_success.store(true, Ordering::SeqCst);
        }
        Err(HeartbeatError::Auth) => {
            // Credentials will not become valid on their own; stop for good
            journal.error("Collector rejected credentials, stopping heartbeats");
            state.auth_rejected.store(true, Ordering::SeqCst);
            state.shutdown.cancel();
        }
        Err(err) => {
            // The 3s cadence is the only retry mechanism
            state.last_heartbeat_success.store(false, Ordering::SeqCst);
            journal.warn(&format!("Heartbeat failed: {}", err));
        }
    }
}

fn build_heartbeat(
    state: &AgentState,
    status: PcStatus,
    shutdown_reason: Option<String>,
) -> HeartbeatRequest {
    HeartbeatRequest {
        pc_id: state.pc_id.clone(),
        timestamp: now_ms(),
        status,
        system_info: Some(facts::heartbeat_info(
            state.started,
            state.last_heartbeat_success.load(Ordering::SeqCst),
        )),
        shutdown_reason,
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
