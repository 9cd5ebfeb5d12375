//! Configuration management for the six mans service
//!
//! This module handles configuration loading from environment variables or a
//! TOML file, validation, and default values.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AmqpSettings, AppConfig, FormationSettings, MmrSettings, ServiceSettings,
    MAX_TIMER_SECONDS,
};
