//! HTTP endpoints for signal-relay.
//!
//! Provides health checks and a Prometheus-text metrics endpoint.

use crate::server::SignalRelay;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<SignalRelay>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(relay))
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of registered identities.
    pub online: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
async fn health_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        online: relay.directory().len(),
        uptime_seconds: uptime,
    })
}

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format: gauges for current state and
/// monotonic counters since startup.
async fn metrics_handler(Extension(relay): Extension<Arc<SignalRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    let online = relay.directory().len();
    let connections = m.connections_total.load(Ordering::Relaxed);
    let registrations = m.registrations_total.load(Ordering::Relaxed);
    let displacements = m.displacements_total.load(Ordering::Relaxed);
    let signals = m.signals_forwarded.load(Ordering::Relaxed);
    let app = m.app_forwarded.load(Ordering::Relaxed);
    let offline = m.target_offline_total.load(Ordering::Relaxed);
    let presence = m.presence_broadcasts.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP signal_relay_online_identities Registered identities
# TYPE signal_relay_online_identities gauge
signal_relay_online_identities {online}

# HELP signal_relay_info Server information
# TYPE signal_relay_info gauge
signal_relay_info{{version="{version}"}} 1

# HELP signal_relay_connections_total Total channels accepted
# TYPE signal_relay_connections_total counter
signal_relay_connections_total {connections}

# HELP signal_relay_registrations_total Total successful registrations
# TYPE signal_relay_registrations_total counter
signal_relay_registrations_total {registrations}

# HELP signal_relay_displacements_total Registrations that evicted a stale endpoint
# TYPE signal_relay_displacements_total counter
signal_relay_displacements_total {displacements}

# HELP signal_relay_signals_forwarded_total Signaling messages forwarded
# TYPE signal_relay_signals_forwarded_total counter
signal_relay_signals_forwarded_total {signals}

# HELP signal_relay_app_forwarded_total Fallback application messages forwarded
# TYPE signal_relay_app_forwarded_total counter
signal_relay_app_forwarded_total {app}

# HELP signal_relay_target_offline_total Forwards dropped for offline targets
# TYPE signal_relay_target_offline_total counter
signal_relay_target_offline_total {offline}

# HELP signal_relay_presence_broadcasts_total Presence broadcasts published
# TYPE signal_relay_presence_broadcasts_total counter
signal_relay_presence_broadcasts_total {presence}

# HELP signal_relay_rate_limit_hits_total Rate limit rejections
# TYPE signal_relay_rate_limit_hits_total counter
signal_relay_rate_limit_hits_total {rate_limits}

# HELP signal_relay_errors_total Protocol errors
# TYPE signal_relay_errors_total counter
signal_relay_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn test_relay() -> Arc<SignalRelay> {
        Arc::new(SignalRelay::new(Config::default()))
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_router(test_relay());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let app = build_router(test_relay());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn health_status_serializes() {
        let status = HealthStatus {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            online: 42,
            uptime_seconds: 3600,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"online\":42"));
    }
}
