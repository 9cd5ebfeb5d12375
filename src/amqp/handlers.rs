//! AMQP consumer for inbound gateway messages

use crate::amqp::messages::MessageUtils;
use crate::error::{Result, SixMansError};
use crate::types::InboundMessage;
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Trait defining the interface for handling inbound messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one interaction relayed by the gateway
    async fn handle_inbound(&self, message: InboundMessage) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: SixMansError, message_data: &[u8]);
}

/// Consumer for the inbound interaction queue
pub struct InboundConsumer {
    handler: Arc<dyn MessageHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl InboundConsumer {
    pub fn new(handler: Arc<dyn MessageHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("sixmans-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag)
            .manual_ack(false)
            .finish();

        self.channel
            .basic_consume(InteractionConsumer::new(self.handler.clone()), args)
            .await
            .map_err(|e| SixMansError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming messages from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            SixMansError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming messages");
        Ok(())
    }
}

struct InteractionConsumer {
    handler: Arc<dyn MessageHandler>,
}

impl InteractionConsumer {
    fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl AsyncConsumer for InteractionConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        debug!(
            "AMQP message received - delivery_tag: {}, size: {} bytes",
            delivery_tag,
            content.len()
        );

        let start_time = std::time::Instant::now();
        if let Err(e) = process_message(self.handler.as_ref(), &content).await {
            error!(
                "Message processing failed - delivery_tag: {}, processing_time: {:.2}ms, error: {}",
                delivery_tag,
                start_time.elapsed().as_secs_f64() * 1000.0,
                e
            );
            let error = match e.downcast::<SixMansError>() {
                Ok(domain) => domain,
                Err(other) => SixMansError::InternalError {
                    message: other.to_string(),
                },
            };
            self.handler.handle_error(error, &content).await;
        }
    }
}

/// Decode and dispatch one delivery
pub async fn process_message(handler: &dyn MessageHandler, content: &[u8]) -> Result<()> {
    let message = MessageUtils::deserialize_inbound(content)?;
    handler.handle_inbound(message).await
}

/// Message handler that records what it receives
#[derive(Default)]
pub struct MockMessageHandler {
    pub received: tokio::sync::Mutex<Vec<InboundMessage>>,
    pub errors: tokio::sync::Mutex<Vec<String>>,
}

impl MockMessageHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageHandler for MockMessageHandler {
    async fn handle_inbound(&self, message: InboundMessage) -> Result<()> {
        self.received.lock().await.push(message);
        Ok(())
    }

    async fn handle_error(&self, error: SixMansError, _message_data: &[u8]) {
        self.errors.lock().await.push(error.to_string());
    }
}
