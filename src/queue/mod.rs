//! Per-channel join queues
//!
//! Players queue in a Discord channel; the sixth join drains the queue into
//! a snapshot and starts a team formation.

pub mod instance;
pub mod manager;

pub use instance::{JoinResult, QueueInstance};
pub use manager::{ClearOutcome, JoinOutcome, QueueManager, QueueManagerStats};
