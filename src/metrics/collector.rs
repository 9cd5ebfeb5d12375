//! Metrics collection using Prometheus
//!
//! Counters and gauges for queues, team formation and match reporting.

use crate::formation::FormationOutcome;
use crate::queue::QueueManagerStats;
use crate::types::{PickSource, TeamMethod};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the six mans service
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    service_metrics: ServiceMetrics,
    queue_metrics: QueueMetrics,
    formation_metrics: FormationMetrics,
    match_metrics: MatchMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Inbound AMQP messages by kind and status
    pub amqp_messages_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    pub joins_total: IntCounter,
    pub active_queues: IntGauge,
    pub players_waiting: IntGauge,
}

/// Voting and drafting metrics
#[derive(Clone)]
pub struct FormationMetrics {
    pub formations_started_total: IntCounter,
    /// Finished formations by outcome (finalized, cancelled, failed)
    pub formations_finished_total: IntCounterVec,
    pub active_formations: IntGauge,
    pub locked_players: IntGauge,
    pub votes_total: IntCounterVec,
    /// Decided methods, labelled by method and whether the window expired
    pub methods_decided_total: IntCounterVec,
    pub vote_timeouts_total: IntCounter,
    /// Draft picks by source (captain, timeout, last_player)
    pub picks_total: IntCounterVec,
    pub formation_duration_seconds: Histogram,
}

/// Match metrics
#[derive(Clone)]
pub struct MatchMetrics {
    pub matches_created_total: IntCounterVec,
    pub matches_reported_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let formation_metrics = FormationMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            formation_metrics,
            match_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn formation(&self) -> &FormationMetrics {
        &self.formation_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Refresh gauges from a queue manager snapshot
    pub fn update_from_queue_stats(&self, stats: &QueueManagerStats) {
        self.queue_metrics
            .active_queues
            .set(stats.active_queues as i64);
        self.queue_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
    }

    /// Refresh formation gauges from the registry counts
    pub fn update_formation_gauges(&self, active_formations: usize, locked_players: usize) {
        self.formation_metrics
            .active_formations
            .set(active_formations as i64);
        self.formation_metrics
            .locked_players
            .set(locked_players as i64);
    }

    pub fn record_queue_join(&self) {
        self.queue_metrics.joins_total.inc();
    }

    pub fn record_formation_started(&self) {
        self.formation_metrics.formations_started_total.inc();
    }

    pub fn record_vote(&self, choice: TeamMethod) {
        self.formation_metrics
            .votes_total
            .with_label_values(&[method_label(choice)])
            .inc();
    }

    /// Record the team method a vote settled on
    pub fn record_method_decided(&self, method: TeamMethod, timed_out: bool) {
        let timed_out_label = if timed_out { "true" } else { "false" };
        self.formation_metrics
            .methods_decided_total
            .with_label_values(&[method_label(method), timed_out_label])
            .inc();

        if timed_out {
            self.formation_metrics.vote_timeouts_total.inc();
        }
    }

    pub fn record_pick(&self, source: PickSource) {
        let source_label = match source {
            PickSource::Captain => "captain",
            PickSource::Timeout => "timeout",
            PickSource::LastPlayer => "last_player",
        };
        self.formation_metrics
            .picks_total
            .with_label_values(&[source_label])
            .inc();
    }

    /// Record how a formation ended and how long it ran
    pub fn record_formation_finished(&self, outcome: &FormationOutcome, elapsed: Duration) {
        let outcome_label = match outcome {
            FormationOutcome::Finalized(record) => {
                self.match_metrics
                    .matches_created_total
                    .with_label_values(&[method_label(record.method)])
                    .inc();
                "finalized"
            }
            FormationOutcome::Cancelled { .. } => "cancelled",
            FormationOutcome::Failed { .. } => "failed",
        };

        self.formation_metrics
            .formations_finished_total
            .with_label_values(&[outcome_label])
            .inc();
        self.formation_metrics
            .formation_duration_seconds
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_match_reported(&self) {
        self.match_metrics.matches_reported_total.inc();
    }

    /// Record one inbound AMQP message
    pub fn record_amqp_message(&self, kind: &str, success: bool) {
        let status = if success { "ok" } else { "error" };
        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[kind, status])
            .inc();
    }

    /// Update health status (0=unhealthy, 1=degraded, 2=healthy)
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    pub fn update_component_health(&self, component: &str, healthy: bool) {
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(if healthy { 1 } else { 0 });
    }

    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| panic!("Failed to create default metrics collector: {}", e))
    }
}

fn method_label(method: TeamMethod) -> &'static str {
    match method {
        TeamMethod::Random => "random",
        TeamMethod::Captains => "captains",
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("six_mans_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "six_mans_amqp_messages_total",
                "Inbound AMQP messages processed",
            ),
            &["kind", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let health_status = IntGauge::new(
            "six_mans_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("six_mans_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounter::new("six_mans_queue_joins_total", "Total queue joins")?;
        registry.register(Box::new(joins_total.clone()))?;

        let active_queues = IntGauge::new(
            "six_mans_active_queues",
            "Channels with at least one waiting player",
        )?;
        registry.register(Box::new(active_queues.clone()))?;

        let players_waiting =
            IntGauge::new("six_mans_players_waiting", "Players waiting in queues")?;
        registry.register(Box::new(players_waiting.clone()))?;

        Ok(Self {
            joins_total,
            active_queues,
            players_waiting,
        })
    }
}

impl FormationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let formations_started_total = IntCounter::new(
            "six_mans_formations_started_total",
            "Total team formations started",
        )?;
        registry.register(Box::new(formations_started_total.clone()))?;

        let formations_finished_total = IntCounterVec::new(
            Opts::new(
                "six_mans_formations_finished_total",
                "Total team formations finished by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(formations_finished_total.clone()))?;

        let active_formations =
            IntGauge::new("six_mans_active_formations", "Formations in progress")?;
        registry.register(Box::new(active_formations.clone()))?;

        let locked_players = IntGauge::new(
            "six_mans_locked_players",
            "Players locked into a formation",
        )?;
        registry.register(Box::new(locked_players.clone()))?;

        let votes_total = IntCounterVec::new(
            Opts::new("six_mans_votes_total", "Accepted team method votes"),
            &["choice"],
        )?;
        registry.register(Box::new(votes_total.clone()))?;

        let methods_decided_total = IntCounterVec::new(
            Opts::new(
                "six_mans_methods_decided_total",
                "Team methods decided by vote",
            ),
            &["method", "timed_out"],
        )?;
        registry.register(Box::new(methods_decided_total.clone()))?;

        let vote_timeouts_total = IntCounter::new(
            "six_mans_vote_timeouts_total",
            "Votes resolved by window expiry",
        )?;
        registry.register(Box::new(vote_timeouts_total.clone()))?;

        let picks_total = IntCounterVec::new(
            Opts::new("six_mans_picks_total", "Captain draft picks by source"),
            &["source"],
        )?;
        registry.register(Box::new(picks_total.clone()))?;

        let formation_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "six_mans_formation_duration_seconds",
                "Time from full queue to finished formation",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0]),
        )?;
        registry.register(Box::new(formation_duration_seconds.clone()))?;

        Ok(Self {
            formations_started_total,
            formations_finished_total,
            active_formations,
            locked_players,
            votes_total,
            methods_decided_total,
            vote_timeouts_total,
            picks_total,
            formation_duration_seconds,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total = IntCounterVec::new(
            Opts::new("six_mans_matches_created_total", "Matches created by method"),
            &["method"],
        )?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let matches_reported_total = IntCounter::new(
            "six_mans_matches_reported_total",
            "Matches with a reported result",
        )?;
        registry.register(Box::new(matches_reported_total.clone()))?;

        Ok(Self {
            matches_created_total,
            matches_reported_total,
        })
    }
}
