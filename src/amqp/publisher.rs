//! AMQP messenger for outbound events

use crate::amqp::messages::{MessageEnvelope, MessageUtils};
use crate::error::{Result, SixMansError};
use crate::messaging::Messenger;
use crate::types::OutboundEvent;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: crate::amqp::messages::EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
        }
    }
}

/// Publishes outbound events to a topic exchange for the Discord gateway
pub struct AmqpMessenger {
    channel: Channel,
    config: PublisherConfig,
    published_messages: Mutex<HashSet<String>>,
}

impl AmqpMessenger {
    /// Create a messenger and declare its exchange
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let messenger = Self {
            channel,
            config,
            published_messages: Mutex::new(HashSet::new()),
        };

        messenger.setup_exchange().await?;

        Ok(messenger)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            SixMansError::AmqpConnectionFailed {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange_name, e
                ),
            }
        })?;

        info!(
            "Successfully set up AMQP exchange {}",
            self.config.exchange_name
        );
        Ok(())
    }

    /// Publish with retry and exponential backoff
    async fn publish_envelope(&self, envelope: &MessageEnvelope<OutboundEvent>) -> Result<()> {
        if self.config.enable_deduplication && self.already_published(&envelope.correlation_id)? {
            debug!(
                "Message {} already published, skipping",
                envelope.correlation_id
            );
            return Ok(());
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    if self.config.enable_deduplication {
                        self.published_messages
                            .lock()
                            .map_err(|_| SixMansError::InternalError {
                                message: "Failed to acquire published messages lock".to_string(),
                            })?
                            .insert(envelope.correlation_id.clone());
                    }

                    debug!(
                        "Published {} as {}",
                        envelope.routing_key, envelope.correlation_id
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    fn already_published(&self, correlation_id: &str) -> Result<bool> {
        let published = self
            .published_messages
            .lock()
            .map_err(|_| SixMansError::InternalError {
                message: "Failed to acquire published messages lock".to_string(),
            })?;
        Ok(published.contains(correlation_id))
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<OutboundEvent>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| SixMansError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }

    /// Clear deduplication cache
    pub fn clear_deduplication_cache(&self) {
        if let Ok(mut published_messages) = self.published_messages.lock() {
            published_messages.clear();
        }
    }

    /// Number of cached message IDs
    pub fn cached_message_count(&self) -> usize {
        self.published_messages
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Messenger for AmqpMessenger {
    async fn publish(&self, event: OutboundEvent) -> Result<()> {
        let routing_key = MessageUtils::get_routing_key(&event);
        let envelope = MessageEnvelope::new(event, routing_key);
        self.publish_envelope(&envelope).await
    }
}
