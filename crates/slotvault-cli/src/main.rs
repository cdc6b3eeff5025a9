mod cli;
mod config;
mod storage;

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use slotvault_core::KeyValueBackend;
use slotvault_storage::SecureRecordStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Health => run_health_check(&config, cli.session).await?,
        Command::Put { key, value } => {
            let store = storage::store_from_config(&config, cli.session).await?;
            store
                .put(&key, &parse_value(&value))
                .map_err(|e| eyre!(e.to_string()))?;
        }
        Command::Get { key } => {
            let store = storage::store_from_config(&config, cli.session).await?;
            let value: Value = store.get(&key).map_err(|e| eyre!(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Remove { key } => {
            let store = storage::store_from_config(&config, cli.session).await?;
            store.remove(&key).map_err(|e| eyre!(e.to_string()))?;
        }
        Command::Slots { key } => {
            let store = storage::store_from_config(&config, cli.session).await?;
            let slots = store.slots_for(&key);
            println!("data: {}", slots.data);
            println!("auth: {}", slots.auth);
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("slotvault {}", env!("CARGO_PKG_VERSION"));
}

/// JSON if it parses, otherwise the raw text as a JSON string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Runs a quick round-trip of the record store.
async fn run_health_check(config: &config::Config, session: bool) -> Result<()> {
    let store = storage::store_from_config(config, session).await?;
    run_store_health(&store)?;
    println!("Storage: ok");
    Ok(())
}

fn run_store_health<B: KeyValueBackend>(store: &SecureRecordStore<B>) -> Result<()> {
    let check_key = "health/check";
    let payload = Value::String("ok".into());
    store
        .put(check_key, &payload)
        .map_err(|e| eyre!(e.to_string()))?;
    let round_trip: Value = store.get(check_key).map_err(|e| eyre!(e.to_string()))?;
    store.remove(check_key).map_err(|e| eyre!(e.to_string()))?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
