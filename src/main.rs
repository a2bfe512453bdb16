//! Admission gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ auth ─▶ protection ─▶ role gate ─▶ handler
//!                                    │          │             │
//!                                    ▼          ▼             ▼
//!                                   401     403 / 500        403
//! ```
//!
//! Protection runs bot and shield rules concurrently, then the sliding
//! window limiter. In observe mode rule denials are logged and the request
//! continues.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gate::config::load_config;
use admission_gate::lifecycle::{shutdown_on_signal, Shutdown};
use admission_gate::observability::{logging, metrics};
use admission_gate::users::InMemoryDirectory;
use admission_gate::AdmissionServer;

#[derive(Parser)]
#[command(name = "admission-gate")]
#[command(about = "Authenticating, rate-limiting admission gateway", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admission-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = %config.mode,
        request_timeout_secs = config.listener.request_timeout_secs,
        remote_shield = config.shield.service_url.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = match AdmissionServer::new(&config, Arc::new(InMemoryDirectory::new())) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    shutdown_on_signal(shutdown);

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
