//! Timed team-selection vote for one queue-full event

use crate::types::{PlayerId, QueueSnapshot, TeamMethod, SNAPSHOT_SIZE};
use crate::utils;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Lifecycle of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    Open,
    /// Deadline passed; existing votes still count at resolution
    Expired,
    Decided(TeamMethod),
}

/// Why a vote was not counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotParticipant,
    Closed,
}

/// Result of `VotingSession::record_vote`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote from this player
    Recorded,
    /// Player switched sides
    Changed { previous: TeamMethod },
    /// Player clicked the option they already had
    Unchanged,
    Ignored(IgnoreReason),
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, VoteOutcome::Ignored(_))
    }
}

/// Running counts per option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub random: usize,
    pub captains: usize,
}

impl VoteCounts {
    pub fn voted(&self) -> usize {
        self.random + self.captains
    }
}

#[derive(Debug)]
pub struct VotingSession {
    snapshot: Arc<QueueSnapshot>,
    votes: HashMap<PlayerId, TeamMethod>,
    deadline: Instant,
    status: VoteStatus,
}

impl VotingSession {
    /// Open a vote that closes `window` from now
    pub fn start(snapshot: Arc<QueueSnapshot>, window: Duration) -> Self {
        Self {
            snapshot,
            votes: HashMap::with_capacity(SNAPSHOT_SIZE),
            deadline: utils::deadline_after(window),
            status: VoteStatus::Open,
        }
    }

    pub fn snapshot(&self) -> &Arc<QueueSnapshot> {
        &self.snapshot
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn status(&self) -> VoteStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == VoteStatus::Open
    }

    /// Record or overwrite a player's choice
    pub fn record_vote(&mut self, player_id: &str, choice: TeamMethod) -> VoteOutcome {
        if !self.is_open() {
            debug!("Ignoring vote from {} on a closed session", player_id);
            return VoteOutcome::Ignored(IgnoreReason::Closed);
        }
        if !self.snapshot.contains(player_id) {
            debug!("Ignoring vote from non-participant {}", player_id);
            return VoteOutcome::Ignored(IgnoreReason::NotParticipant);
        }

        match self.votes.insert(player_id.to_string(), choice) {
            None => VoteOutcome::Recorded,
            Some(previous) if previous == choice => VoteOutcome::Unchanged,
            Some(previous) => VoteOutcome::Changed { previous },
        }
    }

    pub fn counts(&self) -> VoteCounts {
        self.votes
            .values()
            .fold(VoteCounts::default(), |mut counts, choice| {
                match choice {
                    TeamMethod::Random => counts.random += 1,
                    TeamMethod::Captains => counts.captains += 1,
                }
                counts
            })
    }

    /// True once every snapshot member has a recorded vote
    pub fn all_voted(&self) -> bool {
        self.votes.len() == self.snapshot.players().len()
    }

    /// Close the session to new votes after the deadline
    pub fn expire(&mut self) {
        if self.status == VoteStatus::Open {
            self.status = VoteStatus::Expired;
        }
    }

    /// Decide the method. Captains needs a strict majority of cast votes;
    /// ties (including no votes) fall back to Random. Once decided, later
    /// calls return the same method.
    pub fn resolve(&mut self) -> TeamMethod {
        if let VoteStatus::Decided(method) = self.status {
            return method;
        }

        let counts = self.counts();
        let method = if counts.captains > counts.random {
            TeamMethod::Captains
        } else {
            TeamMethod::Random
        };

        self.status = VoteStatus::Decided(method);
        method
    }
}
