//! Assistant Chat server.
//!
//! Entry point: loads configuration, then serves the chat front-end.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use tracing::info;

use assistant_chat::auth::hash_password;
use assistant_chat::config::{AppConfig, ChatSettings, Cli, Command};
use assistant_chat::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(Command::HashPassword { password }) = &cli.command {
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    telemetry::init(cli.log_json);

    let config = Arc::new(AppConfig::from_cli(&cli).context("loading server configuration")?);
    let settings = ChatSettings::from_env().context("loading chat settings")?;

    info!(
        name: "config.loaded",
        host = %config.server.host,
        port = config.server.port,
        credentials = %config.auth.credentials_path,
        "Configuration loaded"
    );

    server::start_server(config, settings).await
}
