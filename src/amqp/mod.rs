//! AMQP integration for the six mans service
//!
//! The Discord gateway publishes interactions to an inbound queue and
//! renders whatever this service publishes on the events exchange.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{InboundConsumer, MessageHandler};
pub use messages::*;
pub use publisher::{AmqpMessenger, PublisherConfig};
