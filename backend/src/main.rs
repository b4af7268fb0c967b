//! SSE MCP server.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    prelude::*,
    EnvFilter,
};

use sse_mcp_server::{
    config::{CliOverrides, Config},
    create_app_with_config,
    state::AppState,
};

/// JWT-gated MCP server over HTTP and Server-Sent Events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Additional TOML config file, merged over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Credential signing secret
    #[arg(long, env = "SSE_MCP_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(CliOverrides {
        config_file: args.config,
        host: args.host,
        port: args.port,
        jwt_secret: args.jwt_secret,
        log_level: args.log_level,
    })?;

    // Must outlive the server so buffered file logs are flushed on exit
    let _log_guard = init_logging(&config)?;
    info!("Configuration loaded: {:?}", config);

    let authority = config.credential_authority()?;
    let state = AppState::new(authority, config.default_username.clone());
    let app = create_app_with_config(state.clone(), config.cors_allowed_origins.clone());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C, shutting down gracefully...");

        // Open event streams never finish on their own
        let closed = state.sessions().close_all();
        info!("Closed {} MCP session(s)", closed);
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Initialize logging to stdout and, if configured, a log file.
///
/// The configured level wins over `RUST_LOG`, which wins over `info`.
fn init_logging(config: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match config.log_level {
        Some(ref level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, guard) = match config.log_file {
        Some(ref path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(directory)?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(UtcTime::new(Rfc3339));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    Ok(guard)
}
