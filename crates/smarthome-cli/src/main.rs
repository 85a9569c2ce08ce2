//! SmartHome control plane entry point.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smarthome_api::ServerState;
use smarthome_commands::{ExpirySweeper, SweeperConfig};
use smarthome_core::config::{Config, LogConfig};
use smarthome_storage::{Store, StoreOptions};

#[derive(Parser, Debug)]
#[command(name = "smarthome")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform. Defaults to `serve`.
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (TOML). Defaults to ./config.toml when present.
    #[arg(short, long, global = true, env = "SMARTHOME_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway and the expiry sweeper.
    Serve {
        /// Address to bind, overriding HTTP_ADDR.
        #[arg(long)]
        addr: Option<String>,
    },
    /// Create or check the database layout and exit.
    Migrate,
    /// Print the effective configuration and exit.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.log, args.verbose);

    match args.command.unwrap_or(Command::Serve { addr: None }) {
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.http.addr = addr;
            }
            serve(config).await
        }
        Command::Migrate => migrate(&config).await,
        Command::Config => {
            let mut printable = config.clone();
            printable.auth.api_key = "<redacted>".to_string();
            print!("{}", toml::to_string_pretty(&printable)?);
            Ok(())
        }
    }
}

fn init_tracing(log: &LogConfig, verbose: bool) {
    // RUST_LOG wins over the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { log.level.as_str() };
        tracing_subscriber::EnvFilter::try_new(level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });

    if log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.storage.path, StoreOptions::from(&config.storage)).map_err(|e| {
        tracing::error!(
            category = "storage",
            path = %config.storage.path,
            error = %e,
            "db_open_error"
        );
        anyhow::Error::new(e).context(format!("opening store at {}", config.storage.path))
    })
}

async fn serve(config: Config) -> Result<()> {
    let store = open_store(&config)?;

    if config.auth.api_key == "devkey" {
        tracing::warn!(category = "auth", "default_api_key_in_use");
    }

    let state = ServerState::new(store, &config.auth.api_key);

    let sweeper = if config.commands.sweeper_enabled {
        let sweeper = ExpirySweeper::new(
            state.commands.clone(),
            SweeperConfig::from(&config.commands),
        );
        let handle = sweeper.start().await;
        Some((sweeper, handle))
    } else {
        tracing::info!(category = "commands", "sweeper_disabled");
        None
    };

    let result = smarthome_api::run(state, &config.http).await;

    if let Some((sweeper, handle)) = sweeper {
        sweeper.stop().await;
        let _ = tokio::time::timeout(sweeper_drain_timeout(config.commands.sweep_interval), handle)
            .await;
    }

    result
}

/// How long to wait for the sweep loop after stopping it. The loop notices
/// the stop at its next tick.
fn sweeper_drain_timeout(sweep_interval: Duration) -> Duration {
    sweep_interval.saturating_mul(2)
}

async fn migrate(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let version = store.schema_version().await?;
    tracing::info!(
        category = "storage",
        path = %store.path(),
        schema_version = version,
        "migrate_ok"
    );
    Ok(())
}
