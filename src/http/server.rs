//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all match handler
//! - Wire up middleware (tracing)
//! - Bind server to listener with graceful shutdown
//! - Translate lookups into responses (match → 200, no match → status by reason)

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::MatcherConfig;
use crate::observability::metrics;
use crate::routing::{Registry, RequestView};

/// Largest form body read for parameter matching.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry<String>>,
    pub config: Arc<ArcSwap<MatcherConfig>>,
    pub started: Instant,
}

impl AppState {
    pub fn new(registry: Arc<Registry<String>>, config: MatcherConfig) -> Self {
        Self {
            registry,
            config: Arc::new(ArcSwap::from_pointee(config)),
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchBody {
    pub route: String,
    pub target: String,
    pub produces: Option<String>,
    pub executor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NoMatchBody {
    pub status: u16,
    pub reason: Option<&'static str>,
}

/// HTTP front end answering which route a request resolves to.
pub struct MatchServer {
    router: Router,
}

impl MatchServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(match_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The service, for embedding or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn is_form(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Resolve the request against the registry.
async fn match_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let mut view = RequestView::from_http(&request);
    let method = request.method().to_string();

    if is_form(&request) {
        match axum::body::to_bytes(request.into_body(), MAX_FORM_BYTES).await {
            Ok(bytes) => view.extend_params(&bytes),
            Err(e) => {
                tracing::warn!(error = %e, "Form body rejected");
                metrics::record_request(&method, 413, start);
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
        }
    }

    let (status, response) = match state.registry.route_request(&view) {
        Ok(matched) => {
            tracing::debug!(
                method = %method,
                path = %view.path(),
                route = %matched.route.name(),
                "Request matched"
            );
            let body = MatchBody {
                route: matched.route.name().to_string(),
                target: matched.route.handler().clone(),
                produces: matched.produces.as_ref().map(ToString::to_string),
                executor: matched.route.executor().map(str::to_string),
            };
            (StatusCode::OK, Json(body).into_response())
        }
        Err(no_match) => {
            let status = no_match.status_code();
            tracing::debug!(
                method = %method,
                path = %view.path(),
                reason = ?no_match.last_mismatch,
                "No route matched"
            );
            let body = NoMatchBody {
                status: status.as_u16(),
                reason: no_match.last_mismatch.map(|r| r.as_str()),
            };
            (status, (status, Json(body)).into_response())
        }
    };

    metrics::record_request(&method, status.as_u16(), start);
    response
}
