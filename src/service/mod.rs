//! Service runtime: component wiring, inbound routing and health checks

pub mod app;
pub mod handler;
pub mod health;

pub use app::{AppState, ServiceContext, ServiceError};
pub use handler::InboundRouter;
pub use health::{HealthCheck, HealthStatus};
