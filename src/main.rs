//! Tallydeck - Authentication and pairing server for counter display devices
//!
//! Devices prove their identity with a P-256 challenge-response handshake,
//! receive a short-lived 6-digit pairing code, and are claimed by users
//! from the dashboard. A background sweep keeps linked metrics fresh and
//! republishes changed values toward the devices.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tallydeck_auth::{Authenticator, SignatureVerifier};
use tallydeck_core::{Config, SignatureMode};
use tallydeck_server::{create_router, AppState};
use tallydeck_store::{DeviceKeyStore, DeviceStore};
use tallydeck_sync::{IntegrationStore, LogPublisher, NullFetcher, SyncRunner};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Tallydeck - device authentication and pairing server
#[derive(Parser, Debug)]
#[command(name = "tallydeck")]
#[command(version, about, long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Directory for the JSON store files (defaults to the platform data dir)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// MQTT broker host handed to devices
    #[arg(long, default_value = "localhost")]
    broker_host: String,

    /// MQTT broker port handed to devices
    #[arg(long, default_value = "1883")]
    broker_port: u16,

    /// Seconds between integration sync sweeps
    #[arg(long, default_value = "60")]
    sync_interval: u64,

    /// Accept simulated device signatures (development firmware without a
    /// secure element). Refused in release builds.
    #[arg(long)]
    simulated_signatures: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Tallydeck v{}", env!("CARGO_PKG_VERSION"));

    let signature_mode = if args.simulated_signatures {
        if cfg!(debug_assertions) {
            warn!("Signature verification: SIMULATED (development only)");
            SignatureMode::Simulated
        } else {
            anyhow::bail!("--simulated-signatures is only available in debug builds");
        }
    } else {
        SignatureMode::Ecdsa
    };

    let data_dir = args
        .data_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("tallydeck")))
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new()
        .with_port(args.port)
        .with_data_dir(data_dir)
        .with_broker(args.broker_host, args.broker_port)
        .with_sync_interval(args.sync_interval)
        .with_signature_mode(signature_mode);

    info!("Loading stores from {:?}...", config.data_dir);
    let keys = Arc::new(DeviceKeyStore::with_path(config.keys_path()).await?);
    let devices = Arc::new(DeviceStore::with_path(config.devices_path()).await?);
    info!("{} device keys provisioned", keys.count().await);

    let verifier = match config.signature_mode {
        SignatureMode::Ecdsa => SignatureVerifier::Ecdsa,
        SignatureMode::Simulated => SignatureVerifier::Simulated,
    };
    let auth = Arc::new(Authenticator::new(
        keys,
        devices.clone(),
        verifier,
        config.broker.clone(),
    ));

    // Integration sync sweep over the same registry the HTTP handlers
    // populate; provider clients and the broker connection are wired in
    // behind the traits when available.
    let integrations = IntegrationStore::new();
    let runner = SyncRunner::new(
        integrations.clone(),
        Arc::new(NullFetcher),
        Arc::new(LogPublisher),
        Duration::from_secs(config.sync_interval_secs),
    );
    tokio::spawn(runner.run());

    let state = Arc::new(AppState::new(auth, devices, integrations));
    let router = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);
    info!(
        "Devices will be directed to MQTT broker {}:{}",
        config.broker.host, config.broker.port
    );

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Goodbye!");
    Ok(())
}
