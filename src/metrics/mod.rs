//! Metrics and monitoring
//!
//! Prometheus collection plus the HTTP server exposing health checks, metrics,
//! service stats and the leaderboard.

pub mod collector;
pub mod health;

pub use collector::{
    FormationMetrics, MatchMetrics, MetricsCollector, MetricsTimer, QueueMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};

use std::sync::Arc;

/// Collector plus the server that exposes it
#[derive(Clone)]
pub struct MetricsService {
    collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,
}

impl MetricsService {
    /// Create a new metrics service
    pub fn new(collector: Arc<MetricsCollector>, health_server: Arc<HealthServer>) -> Self {
        Self {
            collector,
            health_server,
        }
    }

    /// Get the metrics collector
    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Get the health server
    pub fn health_server(&self) -> Arc<HealthServer> {
        self.health_server.clone()
    }

    /// Serve the HTTP endpoints until stopped
    pub async fn start(&self) -> anyhow::Result<()> {
        self.health_server.start().await
    }

    /// Stop the HTTP endpoints
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.health_server.stop().await
    }
}
