use anyhow::Result;
use clap::{Parser, Subcommand};
use fincore::config::ServiceConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "fincored",
    about = "fincore — personal-finance tools service",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP API port
    #[arg(long, env = "FINCORE_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "FINCORE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FINCORE_LOG")]
    log: Option<String>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "FINCORE_BIND")]
    bind_address: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the service in the foreground (default when no subcommand given).
    Serve,
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fincore")
}

fn init_logging(config: &ServiceConfig) {
    let filter = config.log.clone();
    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Some(Command::Serve) | None => {
            let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
            std::fs::create_dir_all(&data_dir)?;
            let config = ServiceConfig::load(data_dir, args.port, args.bind_address, args.log);
            init_logging(&config);
            info!(data_dir = %config.data_dir.display(), "starting fincore");

            let ctx = fincore::build_context(config).await?;
            fincore::rest::start_rest_server(ctx).await?;
        }
    }
    Ok(())
}
