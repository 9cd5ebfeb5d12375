//! Six Mans - queue, team selection vote and captain draft for 3v3 matches
//!
//! Players queue in a Discord channel; once six are waiting the service runs
//! a timed Random vs Captains vote, builds two teams of three (random split
//! or alternating captain draft), records the match and tracks MMR. The
//! Discord gateway talks to it over AMQP.

pub mod amqp;
pub mod config;
pub mod draft;
pub mod error;
pub mod formation;
pub mod matches;
pub mod messaging;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod types;
pub mod utils;
pub mod voting;

// Re-export commonly used types and traits
pub use error::{Result, SixMansError};
pub use types::*;

// Re-export key components
pub use formation::{FormationCoordinator, TeamAssembler};
pub use matches::{InMemoryMatchStore, MatchReporter, MatchStore};
pub use messaging::Messenger;
pub use queue::QueueManager;
pub use voting::VotingSession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
