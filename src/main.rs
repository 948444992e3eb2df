//! OCPP remote authorization service
//!
//! ```sh
//! # Run with default config (~/.config/ocpp-remote-auth/config.toml)
//! ocpp-remote-auth
//!
//! # Custom config path, overridden ports
//! ocpp-remote-auth --config /etc/ocpp-remote-auth/config.toml --ws-port 9000 --api-port 8080
//!
//! # Validate config without starting
//! ocpp-remote-auth --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use ocpp_remote_auth::config::AppConfig;
use ocpp_remote_auth::server::{init_tracing, ServerHandle};

/// OCPP 1.6 central system that authorizes each charge point's remote id tag.
#[derive(Parser, Debug)]
#[command(name = "ocpp-remote-auth", version, about)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "OCPP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the WebSocket listen port.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(ocpp_remote_auth::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) if cli.check => {
            eprintln!("❌ Invalid configuration in {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_tracing(&cfg);
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            cfg
        }
    };

    if let Some(port) = cli.api_port {
        config.api.port = port;
    }
    if let Some(port) = cli.ws_port {
        config.server.ws_port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file   : {}", config_path.display());
        println!("   WS address    : {}:{}", config.server.ws_host, config.server.ws_port);
        if config.api.enabled {
            println!("   API address   : {}:{}", config.api.host, config.api.port);
        }
        println!("   Charge points : {}", config.charge_points.len());
        println!("   Log level     : {}", config.logging.level);
        return Ok(());
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    let handle = ServerHandle::start(config).await?;
    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.wait().await;
    Ok(())
}
