//! Gatehouse Web Server
//!
//! Portal authentication and authorization service.

use anyhow::Context;
use clap::Parser;
use gatehouse_core::{init_logging, GatehouseConfig};
use gatehouse_web::GatehouseServerBuilder;
use std::path::PathBuf;
use tracing::info;

/// Gatehouse - portal authentication and authorization service
#[derive(Parser)]
#[command(name = "gatehouse-web")]
#[command(about = "Portal authentication and authorization service")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// SQLite database URL for the credential store
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut GatehouseConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.dev {
            config.server.dev_mode = true;
        }
        if let Some(url) = self.database_url {
            config.server.database_url = Some(url);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before reading GATEHOUSE_*
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config =
        GatehouseConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    info!("Starting Gatehouse {}", env!("CARGO_PKG_VERSION"));
    if config.server.database_url.is_none() {
        info!("No database_url configured; accounts live in memory only");
    }

    let server = GatehouseServerBuilder::new()
        .config(config)
        .build()
        .await
        .context("Failed to build server")?;

    server.start().await.context("Server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["gatehouse-web"]);
        assert!(args.host.is_none());
        assert!(!args.dev);

        let args = Args::parse_from([
            "gatehouse-web",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--dev",
            "--log-level",
            "debug",
        ]);
        let mut config = GatehouseConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.address(), "0.0.0.0:3000");
        assert!(config.server.dev_mode);
        assert_eq!(config.logging.level, "debug");
    }
}
