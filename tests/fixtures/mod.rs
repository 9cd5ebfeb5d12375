//! Shared builders and a wired-up test system for integration tests

#![allow(dead_code)]

use six_mans::formation::{FormationCoordinator, FormationTimings};
use six_mans::matches::{InMemoryMatchStore, MatchReporter, MatchStore, MmrRule};
use six_mans::messaging::RecordingMessenger;
use six_mans::queue::QueueManager;
use six_mans::types::*;
use std::sync::Arc;
use std::time::Duration;

pub const CHANNEL: &str = "420000000000000001";
pub const SEED: u64 = 0x5eed;

pub fn player(n: usize) -> QueuedPlayer {
    QueuedPlayer::new(format!("u{}", n), format!("Player{}", n))
}

pub fn players(count: usize) -> Vec<QueuedPlayer> {
    (1..=count).map(player).collect()
}

pub fn snapshot() -> QueueSnapshot {
    QueueSnapshot::new(CHANNEL, players(SNAPSHOT_SIZE)).expect("six distinct players")
}

pub fn timings() -> FormationTimings {
    FormationTimings {
        vote_window: Duration::from_secs(60),
        pick_timeout: Duration::from_secs(30),
        match_id_attempts: 16,
    }
}

/// Coordinator, queue and reporter sharing a recording messenger and an
/// in-memory store
pub struct TestSystem {
    pub messenger: Arc<RecordingMessenger>,
    pub store: Arc<InMemoryMatchStore>,
    pub coordinator: Arc<FormationCoordinator>,
    pub queue: Arc<QueueManager>,
    pub reporter: MatchReporter,
}

impl TestSystem {
    pub fn new() -> Self {
        let messenger = Arc::new(RecordingMessenger::new());
        let store = Arc::new(InMemoryMatchStore::new());
        let coordinator = Arc::new(
            FormationCoordinator::new(messenger.clone(), store.clone(), timings()).with_seed(SEED),
        );
        let queue = Arc::new(QueueManager::new(coordinator.clone(), messenger.clone()));
        let reporter = MatchReporter::new(store.clone(), messenger.clone(), MmrRule::default());

        Self {
            messenger,
            store,
            coordinator,
            queue,
            reporter,
        }
    }

    pub fn match_count(&self) -> usize {
        self.store.match_count().expect("store readable")
    }

    /// Cast the given votes in order, `choices[i]` for player `i + 1`
    pub async fn vote_all(&self, formation_id: FormationId, choices: &[TeamMethod]) {
        for (i, choice) in choices.iter().enumerate() {
            let delivered = self
                .coordinator
                .cast_vote(formation_id, &format!("u{}", i + 1), *choice)
                .await
                .expect("vote routed");
            assert!(delivered);
        }
    }

    pub fn captains_selected(&self) -> CaptainsSelected {
        self.messenger
            .events()
            .into_iter()
            .find_map(|event| match event {
                OutboundEvent::CaptainsSelected(e) => Some(e),
                _ => None,
            })
            .expect("captains were announced")
    }

    pub fn pick_requests(&self) -> Vec<PickRequested> {
        self.messenger
            .events()
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::PickRequested(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn picks(&self) -> Vec<PickMade> {
        self.messenger
            .events()
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::PickMade(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn teams_finalized(&self) -> Option<TeamsFinalized> {
        self.messenger
            .events()
            .into_iter()
            .find_map(|event| match event {
                OutboundEvent::TeamsFinalized(e) => Some(e),
                _ => None,
            })
    }
}

pub fn ids(players: &[QueuedPlayer]) -> Vec<PlayerId> {
    players.iter().map(|p| p.id.clone()).collect()
}
