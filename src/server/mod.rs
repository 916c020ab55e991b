//! HTTP Chat Service
//!
//! Thin axum layer over [`ChatService`] with CORS, request tracing and
//! graceful shutdown.
//!
//! Routes:
//! - POST /api/chat - one question, JSON answer
//! - POST /api/chat/stream - same, as Server-Sent Events
//! - GET /api/skills - skill metadata
//! - POST /api/skills/reload - re-read the skills directory
//! - GET /api/health - status, uptime, skill count, cache stats
//! - GET /healthz - liveness probe

pub mod chat;
pub mod error;
pub mod health;
pub mod skills;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::chat::ChatService;
use crate::config::Config;

pub use error::{ApiError, ErrorResponse};

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<ChatService>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub version: &'static str,
}

impl AppState {
    pub fn new(service: Arc<ChatService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() || cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods([Method::GET, Method::POST])
    .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/stream", post(chat::chat_stream))
        .route("/api/skills", get(skills::list_skills))
        .route("/api/skills/reload", post(skills::reload_skills))
        .route("/api/health", get(health::health_check))
        .route("/healthz", get(health::liveness))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C or SIGTERM
pub async fn serve(config: &Config, service: Arc<ChatService>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = config.socket_addr();
    let router = build_router(Arc::new(AppState::new(service)), &config.cors_origins);

    info!("Starting chat service on http://{}", addr);
    if !addr.ip().is_loopback() {
        warn!("Chat service bound to {} - it has no authentication of its own", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat service shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
