//! Route matcher service.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!     Client Request     │  ┌─────────┐    ┌──────────────────────────┐ │
//!     ───────────────────┼─▶│  http   │───▶│ routing::Registry        │ │
//!                        │  │ server  │    │  Simple | Cached router  │ │
//!     Client Response    │  │         │◀───│  adaptive cache          │ │
//!     ◀──────────────────┼──│         │    └────────────▲─────────────┘ │
//!                        │  └─────────┘                 │ sync_routes   │
//!                        │  ┌─────────┐    ┌────────────┴─────────────┐ │
//!     Admin (bearer) ────┼─▶│  admin  │    │ config watcher (notify)  │ │
//!                        │  └─────────┘    └──────────────────────────┘ │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_matcher::admin::setup_admin_router;
use route_matcher::config::loader::load_config;
use route_matcher::config::watcher::ConfigWatcher;
use route_matcher::config::MatcherConfig;
use route_matcher::http::{AppState, MatchServer};
use route_matcher::lifecycle::signals::shutdown_signal;
use route_matcher::lifecycle::startup::{build_registry, run_reload_loop};
use route_matcher::lifecycle::Shutdown;
use route_matcher::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "route-matcher")]
#[command(about = "Resolve HTTP requests to configured routes", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MatcherConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("route-matcher v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        cache_enabled = config.cache.enabled,
        compute_rate = config.cache.compute_rate,
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

    let registry = Arc::new(build_registry(&config)?);
    let state = AppState::new(registry.clone(), config.clone());
    let shutdown = Shutdown::new();

    // Keep the watcher alive until shutdown.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(run_reload_loop(registry.clone(), state.config.clone(), updates));
            match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher disabled");
                    None
                }
            }
        }
        None => None,
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(state.clone());
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = MatchServer::new(state);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    if let Some(task) = admin_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
