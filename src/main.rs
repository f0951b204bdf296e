use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::app::App;
use crate::config::AppConfig;

mod app;
mod config;
mod modem;
mod pdu;
mod sms;

/// Sends queued outbox rows as PDU-mode SMS through a serial GSM modem.
#[derive(Parser, Debug)]
#[command(name = "sms-outbox", version = env!("VERSION"), about)]
struct Args {

    /// TOML config file, otherwise settings are read from the environment (and .env).
    #[arg(short, long)]
    config: Option<PathBuf>
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting sms-outbox v{}", env!("VERSION"));
    App::create(config).await?.run().await
}
