//! Team formation
//!
//! This module turns a full queue into two teams: the coordinator locks the
//! six players and spawns a task that runs the vote, assembles the teams
//! (random split or captain draft) and persists the match.

pub mod assembler;
pub mod coordinator;
pub mod registry;
pub mod task;

pub use assembler::TeamAssembler;
pub use coordinator::FormationCoordinator;
pub use registry::{FormationHandle, FormationPhase, FormationRegistry, FormationSummary};
pub use task::{FormationEvent, FormationOutcome, FormationTask, FormationTimings};
