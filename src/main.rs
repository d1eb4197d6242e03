//! Enrollment authority binary.
//!
//! # Usage
//!
//! ```bash
//! # Socket path and secrets directory on the command line
//! enrolld /run/enrolld.sock --secrets-dir /etc/enrolld/secrets
//!
//! # Or from a TOML configuration file
//! enrolld --config /etc/enrolld/enrolld.toml
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use enrolld::config::Config;
use enrolld::secrets::FsSecretStore;
use enrolld::service::Multiplexer;
use enrolld::transport::local;

/// Local enrollment authority for bus endpoints
#[derive(Parser, Debug)]
#[command(name = "enrolld")]
#[command(about = "Issues deployment key material to endpoints that prove a provisioned secret")]
#[command(version)]
struct Args {
    /// Path at which to create the listening socket
    socket: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding per-device secrets and deployment keys
    #[arg(long)]
    secrets_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    if let Some(dir) = args.secrets_dir {
        config.secrets_dir = dir;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    config.validate_strict()?;

    tracing::info!(socket = %config.socket_path.display(), "enrollment authority starting");

    let listener = local::bind(&config.socket_path).await?;
    let store = FsSecretStore::new(&config.secrets_dir);

    Multiplexer::new(listener, store).run().await?;

    Ok(())
}
