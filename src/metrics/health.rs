//! Health, Prometheus and leaderboard HTTP endpoints
//!
//! Served with Axum next to the AMQP consumer. Health endpoints report on
//! the shared service context; `/leaderboard` and `/players/{id}` read
//! straight from the match store.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::ServiceContext;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "six-mans";

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    /// Typically "0.0.0.0" for all interfaces
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub context: Option<Arc<ServiceContext>>,
}

/// HTTP server for health checks, metrics and the leaderboard
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                context: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the service context used by health checks and the leaderboard
    pub fn with_context(mut self, context: Arc<ServiceContext>) -> Self {
        self.state.context = Some(context);
        self
    }

    /// Serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .route("/leaderboard", get(leaderboard_handler))
            .route("/players/{id}", get(player_handler))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }
        Ok(())
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/leaderboard",
            "/players/{id}"
        ]
    }))
}

fn not_initialized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "unhealthy",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "error": "Service not initialized"
        })),
    )
}

async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let Some(context) = &state.context else {
        return not_initialized();
    };

    let (code, status) = match HealthCheck::liveness_check(context).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "degraded"),
        Ok(HealthStatus::Unhealthy) | Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.context {
        Some(context) => match HealthCheck::readiness_check(context).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    match &state.context {
        Some(context) => match HealthCheck::liveness_check(context).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    let metric_families = state.metrics_collector.registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                metrics_output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(context) = &state.context else {
        return not_initialized();
    };

    match HealthCheck::check(context).await {
        Ok(health) => {
            let formations = context
                .coordinator()
                .registry()
                .summaries()
                .unwrap_or_default();

            let stats = json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime_seconds": health.stats.uptime_seconds
                },
                "queues": {
                    "active": health.stats.active_queues,
                    "players_waiting": health.stats.players_waiting
                },
                "formations": {
                    "active": health.stats.active_formations,
                    "locked_players": health.stats.locked_players,
                    "started": health.stats.formations_started,
                    "in_progress": formations
                },
                "matches": {
                    "created": health.stats.matches_created,
                    "ranked_players": health.stats.ranked_players
                },
                "components": health.checks,
                "timestamp": chrono::Utc::now()
            });

            (StatusCode::OK, Json(stats))
        }
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": { "name": SERVICE_NAME, "status": "error" },
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}

async fn leaderboard_handler(
    State(state): State<HealthServerState>,
    Query(query): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let Some(context) = &state.context else {
        return not_initialized();
    };

    let limit = query
        .limit
        .unwrap_or(context.config().mmr.leaderboard_limit)
        .clamp(1, 100);

    match context.reporter().leaderboard(limit) {
        Ok(players) => {
            let rows: Vec<_> = players
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    json!({
                        "rank": i + 1,
                        "id": p.id,
                        "name": p.name,
                        "mmr": p.mmr,
                        "wins": p.wins,
                        "losses": p.losses,
                        "matches": p.matches
                    })
                })
                .collect();

            (
                StatusCode::OK,
                Json(json!({ "limit": limit, "players": rows })),
            )
        }
        Err(e) => {
            error!("Failed to load leaderboard: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load leaderboard" })),
            )
        }
    }
}

/// One player's stats and leaderboard position
async fn player_handler(
    State(state): State<HealthServerState>,
    Path(player_id): Path<String>,
) -> impl IntoResponse {
    let Some(context) = &state.context else {
        return not_initialized();
    };

    match context.reporter().standing(&player_id) {
        Ok(Some((p, rank))) => (
            StatusCode::OK,
            Json(json!({
                "rank": rank,
                "id": p.id,
                "name": p.name,
                "mmr": p.mmr,
                "wins": p.wins,
                "losses": p.losses,
                "matches": p.matches,
                "last_updated": p.last_updated
            })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No reported matches for player {}", player_id) })),
        ),
        Err(e) => {
            error!("Failed to load player {}: {}", player_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load player" })),
            )
        }
    }
}
