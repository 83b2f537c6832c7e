//! Health check handlers for service monitoring.
//!
//! Provides liveness, readiness, and health endpoints with a user store
//! connectivity check for orchestration systems.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::server::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Critical systems failing
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// User store connectivity and basic query test
    pub store: ComponentHealth,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Optional error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is experiencing issues
    Down,
}

/// Health check endpoint handler.
///
/// Performs a lightweight store connectivity check. This endpoint is
/// called frequently by orchestration systems and load balancers, so it
/// avoids expensive operations.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let timestamp = DateTime::<Utc>::from(state.clock.now_system());
    let start = state.clock.now();

    let (status, message) = match state.store.health_check().await {
        Ok(()) => {
            debug!("store health check passed");
            (ComponentStatus::Up, None)
        },
        Err(e) => {
            error!("store health check failed: {}", e);
            (ComponentStatus::Down, Some(format!("store connection failed: {e}")))
        },
    };
    let elapsed = start.elapsed();

    let overall = match status {
        ComponentStatus::Up => HealthStatus::Healthy,
        ComponentStatus::Down => HealthStatus::Unhealthy,
    };
    let status_code = match overall {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: overall,
        timestamp,
        checks: HealthChecks {
            store: ComponentHealth {
                status,
                message,
                response_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            },
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response)).into_response()
}

/// Readiness check endpoint.
///
/// Identical to the health check: the service is ready once the store is
/// reachable.
#[instrument(name = "readiness_check", skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    health_check(State(state)).await
}

/// Liveness check endpoint.
///
/// Returns a minimal response indicating the process is alive without
/// testing external dependencies.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<AppState>) -> Response {
    debug!("performing liveness check");

    let response = serde_json::json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(state.clock.now_system()),
        "service": "usersync-api"
    });

    (StatusCode::OK, Json(response)).into_response()
}
