//! Team-selection voting
//!
//! A `VotingSession` collects Random/Captains votes from the six players of a
//! snapshot until everyone has voted or the window closes.

pub mod session;

pub use session::{IgnoreReason, VoteCounts, VoteOutcome, VoteStatus, VotingSession};
