//! Main application state and service coordination
//!
//! `ServiceContext` holds the domain components shared by the AMQP handler
//! and the HTTP endpoints. `AppState` owns the context plus the AMQP
//! connection, consumer and background tasks, and drives startup and
//! graceful shutdown.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::InboundConsumer;
use crate::amqp::publisher::{AmqpMessenger, PublisherConfig};
use crate::config::AppConfig;
use crate::formation::{FormationCoordinator, FormationTimings};
use crate::matches::{InMemoryMatchStore, MatchReporter, MatchStore, MmrRule};
use crate::messaging::Messenger;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::queue::QueueManager;
use crate::service::handler::InboundRouter;
use crate::service::health::{HealthCheck, HealthStatus};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

const METRICS_UPDATE_INTERVAL: Duration = Duration::from_secs(15);
const HEALTH_METRICS_INTERVAL: Duration = Duration::from_secs(60);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Domain components shared across the service
pub struct ServiceContext {
    config: AppConfig,
    store: Arc<dyn MatchStore>,
    coordinator: Arc<FormationCoordinator>,
    queue_manager: Arc<QueueManager>,
    reporter: Arc<MatchReporter>,
    messenger: Arc<dyn Messenger>,
    metrics_collector: Arc<MetricsCollector>,
    amqp_connection: Option<Arc<AmqpConnection>>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ServiceContext {
    /// Wire the store, coordinator, queue manager and reporter together
    pub fn new(
        config: AppConfig,
        messenger: Arc<dyn Messenger>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let store: Arc<dyn MatchStore> = Arc::new(InMemoryMatchStore::new());

        let coordinator = Arc::new(
            FormationCoordinator::new(
                messenger.clone(),
                store.clone(),
                FormationTimings::from(&config),
            )
            .with_event_buffer(config.formation.event_buffer_size)
            .with_metrics(metrics_collector.clone()),
        );

        let queue_manager = Arc::new(
            QueueManager::new(coordinator.clone(), messenger.clone())
                .with_metrics(metrics_collector.clone()),
        );

        let reporter = Arc::new(
            MatchReporter::new(store.clone(), messenger.clone(), MmrRule::from(&config.mmr))
                .with_metrics(metrics_collector.clone()),
        );

        Self {
            config,
            store,
            coordinator,
            queue_manager,
            reporter,
            messenger,
            metrics_collector,
            amqp_connection: None,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        }
    }

    pub fn with_amqp_connection(mut self, amqp_connection: Arc<AmqpConnection>) -> Self {
        self.amqp_connection = Some(amqp_connection);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn MatchStore> {
        self.store.clone()
    }

    pub fn coordinator(&self) -> Arc<FormationCoordinator> {
        self.coordinator.clone()
    }

    pub fn queue_manager(&self) -> Arc<QueueManager> {
        self.queue_manager.clone()
    }

    pub fn reporter(&self) -> Arc<MatchReporter> {
        self.reporter.clone()
    }

    /// Outbound surface for replies that bypass the domain components
    pub fn messenger(&self) -> Arc<dyn Messenger> {
        self.messenger.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn amqp_connection(&self) -> Option<Arc<AmqpConnection>> {
        self.amqp_connection.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Cancel every formation still in progress
    pub fn cancel_all_formations(&self, reason: &str) -> usize {
        let summaries = match self.coordinator.registry().summaries() {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!("Failed to list active formations: {}", e);
                return 0;
            }
        };

        summaries
            .iter()
            .filter(|summary| self.coordinator.cancel_formation(summary.id, reason).is_ok())
            .count()
    }
}

/// Main application state containing all service components
pub struct AppState {
    context: Arc<ServiceContext>,
    amqp_connection: Arc<AmqpConnection>,
    metrics_service: Arc<MetricsService>,
    background_tasks: Vec<JoinHandle<()>>,
    inbound_consumer: Option<InboundConsumer>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);
        info!(
            "Configuration: vote_window={}s, pick_timeout={}s, amqp_queue={}",
            config.formation.vote_window_seconds,
            config.formation.pick_timeout_seconds,
            config.amqp.queue_name
        );

        let amqp_connection = Self::initialize_amqp(&config).await?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let messenger = Self::initialize_messenger(&config, &amqp_connection).await?;

        let context = Arc::new(
            ServiceContext::new(config, messenger, metrics_collector.clone())
                .with_amqp_connection(amqp_connection.clone()),
        );

        let metrics_service = Self::initialize_metrics(context.clone(), metrics_collector);

        Ok(Self {
            context,
            amqp_connection,
            metrics_service,
            background_tasks: Vec::new(),
            inbound_consumer: None,
        })
    }

    /// Start all background services and message consumption
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} service", self.context.config().service.name);

        self.context.set_running(true).await;

        self.start_metrics_service().await?;
        self.start_amqp_consumption().await?;
        self.start_background_tasks();

        info!("✅ Six mans service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown");

        self.context.set_running(false).await;

        if let Some(consumer) = &self.inbound_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            } else {
                info!("✅ AMQP message consumption stopped");
            }
        }

        let cancelled = self.context.cancel_all_formations("service shutting down");
        if cancelled > 0 {
            info!("Cancelled {} formation(s) in progress", cancelled);
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        let final_stats = self.context.queue_manager().get_stats().map_err(|e| {
            ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            }
        })?;

        info!(
            "Final statistics: joins={}, formations={}, matches={}",
            final_stats.players_joined,
            final_stats.formations_started,
            self.context.store().match_count().unwrap_or(0)
        );
        info!("✅ Shutdown completed");

        Ok(())
    }

    pub fn context(&self) -> Arc<ServiceContext> {
        self.context.clone()
    }

    pub fn config(&self) -> &AppConfig {
        self.context.config()
    }

    pub async fn is_running(&self) -> bool {
        self.context.is_running().await
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        let amqp_config =
            AmqpConfig::from_settings(&config.amqp).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        info!(
            "Connecting to AMQP broker at {}:{}",
            amqp_config.host, amqp_config.port
        );

        let connect = AmqpConnection::new(amqp_config);
        let connection = tokio::time::timeout(config.amqp_connection_timeout(), connect)
            .await
            .map_err(|_| ServiceError::AmqpConnection {
                message: format!(
                    "Timed out after {}s connecting to AMQP",
                    config.amqp.connection_timeout_seconds
                ),
            })?
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            })?;

        Ok(Arc::new(connection))
    }

    async fn initialize_messenger(
        config: &AppConfig,
        amqp_connection: &AmqpConnection,
    ) -> Result<Arc<dyn Messenger>, ServiceError> {
        let channel = amqp_connection
            .connection()
            .open_channel(None)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to open AMQP channel: {}", e),
            })?;

        let publisher_config = PublisherConfig {
            exchange_name: config.amqp.exchange_name.clone(),
            ..PublisherConfig::default()
        };

        let messenger = AmqpMessenger::new(channel, publisher_config)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize event publisher: {}", e),
            })?;

        Ok(Arc::new(messenger))
    }

    fn initialize_metrics(
        context: Arc<ServiceContext>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Arc<MetricsService> {
        let health_config = HealthServerConfig {
            port: context.config().service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server =
            Arc::new(HealthServer::new(health_config, metrics_collector.clone()).with_context(context));

        Arc::new(MetricsService::new(metrics_collector, health_server))
    }

    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        let metrics_service = self.metrics_service.clone();
        let port = self.context.config().service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Health and metrics endpoints started on port {}", port);
        Ok(())
    }

    async fn start_amqp_consumption(&mut self) -> Result<(), ServiceError> {
        let queue_name = self.context.config().amqp.queue_name.clone();

        let channel = self
            .amqp_connection
            .open_queue_channel(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open consumer channel: {}", e),
            })?;

        let handler = Arc::new(InboundRouter::new(self.context.clone()));
        let consumer = InboundConsumer::new(handler, channel);

        consumer
            .start_consuming(&queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to start consuming messages: {}", e),
            })?;

        self.inbound_consumer = Some(consumer);

        info!("✅ Listening for Discord interactions on '{}'", queue_name);
        Ok(())
    }

    fn start_background_tasks(&mut self) {
        let metrics_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(METRICS_UPDATE_INTERVAL);
                debug!("Metrics update task started");

                while context.is_running().await {
                    interval.tick().await;
                    update_gauges(&context);
                }

                debug!("Metrics update task stopped");
            })
        };

        let health_metrics_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(HEALTH_METRICS_INTERVAL);
                debug!("Health metrics task started");

                while context.is_running().await {
                    interval.tick().await;

                    let metrics_collector = context.metrics_collector();
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(context.uptime().as_secs() as i64);

                    match HealthCheck::check(&context).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }

                debug!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(metrics_task);
        self.background_tasks.push(health_metrics_task);
        info!("Background maintenance tasks started");
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        info!("✅ All {} background tasks stopped", task_count);
    }
}

/// Push queue and formation gauges to the collector
pub fn update_gauges(context: &ServiceContext) {
    let metrics_collector = context.metrics_collector();

    match context.queue_manager().get_stats() {
        Ok(stats) => {
            debug!(
                "Updating metrics - queues: {}, waiting: {}",
                stats.active_queues, stats.players_waiting
            );
            metrics_collector.update_from_queue_stats(&stats);
        }
        Err(e) => warn!("Failed to get queue stats for metrics update: {}", e),
    }

    let registry = context.coordinator().registry().clone();
    match (registry.active_count(), registry.locked_player_count()) {
        (Ok(active), Ok(locked)) => metrics_collector.update_formation_gauges(active, locked),
        _ => warn!("Failed to read formation registry for metrics update"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::RecordingMessenger;
    use crate::types::QueuedPlayer;

    fn context() -> ServiceContext {
        ServiceContext::new(
            AppConfig::default(),
            Arc::new(RecordingMessenger::new()),
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_running_flag() {
        let context = context();
        assert!(!context.is_running().await);
        context.set_running(true).await;
        assert!(context.is_running().await);
    }

    #[tokio::test]
    async fn test_update_gauges_reflects_queue() {
        let context = context();
        context
            .queue_manager()
            .join("42", QueuedPlayer::new("1", "One"))
            .await
            .unwrap();

        update_gauges(&context);

        let metrics = context.metrics_collector();
        assert_eq!(metrics.queue().players_waiting.get(), 1);
        assert_eq!(metrics.queue().active_queues.get(), 1);
        assert_eq!(metrics.formation().active_formations.get(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_formations() {
        let context = context();
        let queue = context.queue_manager();
        for i in 0..6 {
            queue
                .join("42", QueuedPlayer::new(i.to_string(), format!("P{}", i)))
                .await
                .unwrap();
        }
        assert_eq!(context.coordinator().registry().active_count().unwrap(), 1);

        assert_eq!(context.cancel_all_formations("shutdown"), 1);
        assert_eq!(context.coordinator().registry().active_count().unwrap(), 0);
        assert!(!context.coordinator().is_locked("0").unwrap());
    }
}
