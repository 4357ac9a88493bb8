//! devicemgrd daemon entry point.
//!
//! Initializes logging, loads the configuration and schema, then keeps the
//! configured devices connected until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gnmi_connector::session::{SessionManager, SessionManagerConfig};
use gnmi_devicemgrd::config::DEFAULT_CONFIG_PATH;
use gnmi_devicemgrd::{
    ConnectionManagerConfig, DaemonConfig, DeviceConnectionManager, DeviceTableWatcher,
    MemoryOperationalStore, NodeListener,
};
use gnmi_yang::SchemaContext;

/// gNMI device connection manager
#[derive(Parser, Debug)]
#[command(name = "devicemgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Schema context (JSON module descriptions)
    #[arg(short = 's', long, default_value = "/etc/gnmi/schema.json")]
    schema: PathBuf,

    /// Log filter (trace, debug, info, warn, error); defaults to RUST_LOG or info
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Load configuration and schema, then exit
    #[arg(long)]
    validate: bool,
}

fn init_logging(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = DaemonConfig::load(&args.config)?;
    let schema = SchemaContext::from_json_file(&args.schema)
        .with_context(|| format!("failed to load schema {}", args.schema.display()))?;
    info!(
        devices = config.devices.len(),
        modules = schema.modules().len(),
        "Configuration loaded"
    );
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let sessions = Arc::new(SessionManager::new(SessionManagerConfig {
        shutdown_grace: config.bridge.shutdown_grace(),
        connect_timeout: config.bridge.connect_timeout(),
    }));
    let manager = Arc::new(DeviceConnectionManager::new(
        sessions.clone(),
        Arc::new(schema),
        ConnectionManagerConfig {
            encoding: config.bridge.encoding()?,
            connect_timeout: config.bridge.connect_timeout(),
        },
    ));
    let store = Arc::new(MemoryOperationalStore::new());
    let listener = Arc::new(NodeListener::new(
        manager,
        store.clone(),
        config.bridge.connect_workers,
    ));

    let shutdown = CancellationToken::new();
    let watcher = DeviceTableWatcher::new(&args.config, config.bridge.poll_interval());
    let watcher_task = tokio::spawn(watcher.run(listener.clone(), shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");

    shutdown.cancel();
    watcher_task.await.context("device table watcher panicked")?;
    listener.shutdown().await;

    info!(
        states = %serde_json::to_string(&store.snapshot())?,
        channels = sessions.channel_count(),
        "Final device states"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(args.log_level.as_deref()) {
        eprintln!("devicemgrd: {e:#}");
        return ExitCode::FAILURE;
    }

    info!("--- Starting devicemgrd ---");
    match run(args).await {
        Ok(()) => {
            info!("devicemgrd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("devicemgrd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
