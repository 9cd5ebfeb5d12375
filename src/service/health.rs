//! Health checks behind the readiness and liveness endpoints

use crate::service::app::ServiceContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Value exported on the health status gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Combine two statuses, keeping the worse one
    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when the component is not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Channels with waiting players
    pub active_queues: usize,
    pub players_waiting: usize,
    /// Formations currently voting or drafting
    pub active_formations: usize,
    pub locked_players: usize,
    pub formations_started: u64,
    pub matches_created: usize,
    pub ranked_players: usize,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(context: &ServiceContext) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(context).await,
            Self::check_queue_manager(context),
            Self::check_formations(context),
            Self::check_match_store(context),
            Self::check_amqp_health(context),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

        Ok(HealthCheck {
            status,
            service: context.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(context),
        })
    }

    /// Liveness: the service loop is running
    pub async fn liveness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if context.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness: running, and the queue and formation state are reachable
    pub async fn readiness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_queue_manager(context)
            .status
            .worst(Self::check_formations(context).status))
    }

    async fn check_service_running(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_queue_manager(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match context.queue_manager().get_stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Queue manager stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "queue_manager".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_formations(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match context.coordinator().registry().active_count() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Unhealthy,
                Some(format!("Formation registry unavailable: {}", e)),
            ),
        };

        ComponentCheck {
            name: "formations".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_match_store(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        // Reports fail without the store but queueing still works
        let (status, message) = match context.store().match_count() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Degraded,
                Some(format!("Match store unavailable: {}", e)),
            ),
        };

        ComponentCheck {
            name: "match_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_amqp_health(context: &ServiceContext) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match context.amqp_connection() {
            Some(connection) if connection.is_alive() => (HealthStatus::Healthy, None),
            Some(_) => (
                HealthStatus::Unhealthy,
                Some("AMQP connection is closed".to_string()),
            ),
            None => (
                HealthStatus::Degraded,
                Some("No AMQP connection configured".to_string()),
            ),
        };

        ComponentCheck {
            name: "amqp_connection".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(context: &ServiceContext) -> ServiceStats {
        let mut stats = ServiceStats {
            uptime_seconds: context.uptime().as_secs(),
            ..ServiceStats::default()
        };

        match context.queue_manager().get_stats() {
            Ok(queue_stats) => {
                stats.active_queues = queue_stats.active_queues;
                stats.players_waiting = queue_stats.players_waiting;
                stats.formations_started = queue_stats.formations_started;
            }
            Err(e) => debug!("Failed to get queue stats for health check: {}", e),
        }

        let registry = context.coordinator().registry().clone();
        stats.active_formations = registry.active_count().unwrap_or(0);
        stats.locked_players = registry.locked_player_count().unwrap_or(0);

        let store = context.store();
        stats.matches_created = store.match_count().unwrap_or(0);
        stats.ranked_players = store.player_count().unwrap_or(0);

        stats
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::messaging::RecordingMessenger;
    use crate::metrics::MetricsCollector;
    use std::sync::Arc;

    fn context() -> ServiceContext {
        ServiceContext::new(
            AppConfig::default(),
            Arc::new(RecordingMessenger::new()),
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    #[test]
    fn test_worst_status() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Unhealthy.worst(HealthStatus::Degraded),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_stopped_service_is_not_live() {
        let context = context();
        assert_eq!(
            HealthCheck::liveness_check(&context).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(&context).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_running_without_amqp_is_degraded() {
        let context = context();
        context.set_running(true).await;

        assert_eq!(
            HealthCheck::readiness_check(&context).await.unwrap(),
            HealthStatus::Healthy
        );

        let health = HealthCheck::check(&context).await.unwrap();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.service, "six-mans");
        assert_eq!(health.checks.len(), 5);
        assert!(health.to_json().unwrap().contains("amqp_connection"));
    }
}
