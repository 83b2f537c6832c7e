//! HTTP server configuration and request routing.
//!
//! Provides Axum server setup with the middleware stack and graceful
//! shutdown. Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. CORS handling
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! The server handles SIGTERM gracefully: it stops accepting new
//! connections and waits for in-flight requests before returning.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use usersync_core::{Clock, UserStore};
use uuid::Uuid;

use crate::{crypto::WebhookVerifier, handlers, monitor::Monitor};

/// Shared application state handed to every handler.
///
/// Holds the long-lived resources built once at startup: the user store,
/// the webhook verifier, the monitoring sink, and the clock.
#[derive(Clone)]
pub struct AppState {
    /// User store the sync handler mutates.
    pub store: Arc<dyn UserStore>,

    /// Verifier for inbound webhook deliveries.
    pub verifier: WebhookVerifier,

    /// Fire-and-forget error sink.
    pub monitor: Monitor,

    /// Clock used for health reporting and verification.
    pub clock: Arc<dyn Clock>,
}

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use usersync_api::{create_router, AppState};
///
/// fn build(state: AppState) {
///     let app = create_router(state, Duration::from_secs(30));
///     // Serve the app...
/// }
/// ```
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check));

    let api_routes = Router::new().route("/webhooks", post(handlers::handle_webhook));

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Binds to the specified address and serves requests until a shutdown
/// signal is received.
///
/// # Errors
///
/// Returns `std::io::Error` if the port is already in use or the network
/// interface is unavailable.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    request_timeout: Duration,
) -> Result<(), std::io::Error> {
    let app = create_router(state, request_timeout);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
