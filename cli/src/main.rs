mod client;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use client::CollectorApi;
use config::{default_config_path, Config};

#[derive(Parser, Debug)]
#[command(name = "fleetpulsectl")]
#[command(about = "FleetPulse operator CLI", long_about = None)]
struct Cli {
    /// Collector base URL (falls back to the saved config)
    #[arg(long, env = "FLEETPULSE_COLLECTOR_URL")]
    collector_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage registered machines
    #[command(subcommand)]
    Pc(PcCommand),

    /// Manage the stored API key and run sessions
    #[command(subcommand)]
    Credentials(CredentialsCommand),

    /// Manage saved CLI configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum PcCommand {
    /// Provision a machine and print its one-time auth token
    Add {
        pc_id: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        pc_type: Option<String>,
    },
    /// List machines and their liveness
    List,
    /// Deregister a machine
    Remove { pc_id: String },
}

#[derive(Subcommand, Debug)]
enum CredentialsCommand {
    /// Store the API key used by downstream runs
    SetKey { api_key: String },
    /// Show the stored API key
    ShowKey,
    /// Mint a run session (uses the stored key unless one is given)
    Run {
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Show a run session
    Session { session_id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Persist the collector URL for future invocations
    SetUrl { url: String },
    /// Show the saved configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = default_config_path();
    let mut config = Config::load(&config_path)?;

    // Config commands work without a reachable collector
    if let Command::Config(cmd) = &cli.command {
        match cmd {
            ConfigCommand::SetUrl { url } => {
                config.collector_url = Some(url.clone());
                config.save(&config_path)?;
                println!("Saved collector URL: {}", url);
            }
            ConfigCommand::Show => match &config.collector_url {
                Some(url) => println!("collector_url: {}", url),
                None => println!("collector_url: (not set)"),
            },
        }
        return Ok(());
    }

    let base_url = cli
        .collector_url
        .or(config.collector_url)
        .context("No collector URL; pass --collector-url or run `config set-url`")?;

    let api = CollectorApi::new(&base_url)?;

    match cli.command {
        Command::Pc(cmd) => pc_command(&api, cmd).await,
        Command::Credentials(cmd) => credentials_command(&api, cmd).await,
        Command::Config(_) => unreachable!("handled above"),
    }
}

async fn pc_command(api: &CollectorApi, cmd: PcCommand) -> Result<()> {
    match cmd {
        PcCommand::Add {
            pc_id,
            owner,
            location,
            pc_type,
        } => {
            let resp = api
                .provision_pc(
                    &pc_id,
                    owner.as_deref(),
                    location.as_deref(),
                    pc_type.as_deref(),
                )
                .await?;
            println!("Provisioned {}", resp.pc_id);
            println!("Auth token (shown once): {}", resp.auth_token);
        }
        PcCommand::List => {
            let resp = api.list_pcs().await?;
            if resp.pcs.is_empty() {
                println!("No machines provisioned");
                return Ok(());
            }
            println!(
                "{:<20} {:<8} {:<20} {:<15} {:<15} {}",
                "PC ID", "STATUS", "HOSTNAME", "OWNER", "LOCATION", "LAST SEEN"
            );
            for pc in resp.pcs {
                println!(
                    "{:<20} {:<8} {:<20} {:<15} {:<15} {}",
                    pc.pc_id,
                    pc.status,
                    pc.hostname.as_deref().unwrap_or("-"),
                    pc.owner.as_deref().unwrap_or("-"),
                    pc.location.as_deref().unwrap_or("-"),
                    pc.last_seen
                        .map(|ms| format!("{}", ms))
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        PcCommand::Remove { pc_id } => {
            api.remove_pc(&pc_id).await?;
            println!("Removed {}", pc_id);
        }
    }
    Ok(())
}

async fn credentials_command(api: &CollectorApi, cmd: CredentialsCommand) -> Result<()> {
    match cmd {
        CredentialsCommand::SetKey { api_key } => {
            api.set_api_key(&api_key).await?;
            println!("API key stored");
        }
        CredentialsCommand::ShowKey => {
            let resp = api.get_api_key().await?;
            match resp.api_key {
                Some(key) => println!("{}", key),
                None => println!("(no API key stored)"),
            }
        }
        CredentialsCommand::Run { api_key } => {
            let resp = api.run_credentials(api_key.as_deref()).await?;
            println!("Session: {}", resp.session_id);
        }
        CredentialsCommand::Session { session_id } => {
            let resp = api.session(&session_id).await?;
            println!("session_id: {}", resp.session_id);
            println!("api_key:    {}", resp.api_key);
            println!("created_at: {}", resp.created_at);
        }
    }
    Ok(())
}
