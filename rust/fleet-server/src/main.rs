//! Fleet orchestrator endpoint
//!
//! Accepts worker connections over gRPC and keeps each one available as a
//! proxy in the worker registry.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! fleet-server
//!
//! # Custom port and eligibility threshold
//! fleet-server --port 9091 --threshold 0.5
//!
//! # Start with configuration file, probing properties every 10s
//! fleet-server --config fleet.toml --probe-interval-ms 10000
//! ```

mod probe;
mod service;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_core::transport::FleetServiceServer;
use fleet_core::{FleetConfig, WorkerRegistry};
use service::FleetServiceImpl;

/// Fleet orchestrator endpoint
#[derive(Parser, Debug)]
#[command(name = "fleet-server")]
#[command(about = "Exposes connected workers to an orchestrator")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short, long)]
    address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Eligibility threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Property the criterion scores workers by
    #[arg(long)]
    key: Option<String>,

    /// Property refresh period in milliseconds (0 disables)
    #[arg(long)]
    probe_interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut FleetConfig) {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(threshold) = self.threshold {
            config.sampling.threshold = threshold;
        }
        if let Some(key) = &self.key {
            config.sampling.criterion.set_score_key(key);
        }
        if let Some(interval) = self.probe_interval_ms {
            config.sampling.probe_interval_ms = interval;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    }
    .with_env_overrides();
    args.apply(&mut config);
    config.validate()?;

    tracing::info!("Starting fleet server");
    tracing::info!("  Criterion: {:?}", config.sampling.criterion);
    tracing::info!("  Threshold: {}", config.sampling.threshold);
    tracing::info!("  Probe interval: {}ms", config.sampling.probe_interval_ms);

    let registry = Arc::new(WorkerRegistry::new());
    let service = FleetServiceImpl::new(registry.clone(), config.server.outbound_buffer);

    let addr: SocketAddr = config.server.bind_address().parse()?;
    tracing::info!("Listening on {}", addr);

    // Start background tasks
    if let Some(interval) = config.sampling.probe_interval() {
        tokio::spawn(probe::run_probe(
            registry.clone(),
            config.sampling.clone(),
            interval,
        ));
    }

    let limit = config.server.max_message_length;
    Server::builder()
        .add_service(
            FleetServiceServer::new(service)
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit),
        )
        .serve_with_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for CTRL+C: {}", e);
            }
            tracing::info!("Shutting down fleet server...");
        })
        .await?;

    Ok(())
}
