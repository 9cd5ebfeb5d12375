//! Match records, result reporting and MMR
//!
//! Matches are persisted when a formation finalizes its teams. Players later
//! report a win or loss, which completes the match and moves every
//! participant's MMR by a fixed amount.

pub mod mmr;
pub mod reporting;
pub mod store;

pub use mmr::MmrRule;
pub use reporting::MatchReporter;
pub use store::{
    persist_new_match, InMemoryMatchStore, MatchRecord, MatchStatus, MatchStore, NewMatch,
    PlayerStats, Score,
};
