//! Match and player persistence
//!
//! This module defines the storage interface for match records and player
//! stats, with an in-memory implementation.

use crate::error::{Result, SixMansError};
use crate::types::{
    ChannelId, FormationId, MatchId, PlayerId, QueuedPlayer, TeamAssignment, TeamMethod, TeamSide,
};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub a: u32,
    pub b: u32,
}

/// A persisted match, created when teams are finalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub team_a: Vec<QueuedPlayer>,
    pub team_b: Vec<QueuedPlayer>,
    pub method: TeamMethod,
    pub captains: Option<(PlayerId, PlayerId)>,
    pub status: MatchStatus,
    pub winner: Option<TeamSide>,
    pub score: Score,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reported_by: Option<PlayerId>,
}

impl MatchRecord {
    /// Side a player was on, if they played
    pub fn side_of(&self, player_id: &str) -> Option<TeamSide> {
        if self.team_a.iter().any(|p| p.id == player_id) {
            Some(TeamSide::A)
        } else if self.team_b.iter().any(|p| p.id == player_id) {
            Some(TeamSide::B)
        } else {
            None
        }
    }

    pub fn team(&self, side: TeamSide) -> &[QueuedPlayer] {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }
}

/// Everything needed to persist a freshly formed match
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub teams: TeamAssignment,
    pub method: TeamMethod,
    pub captains: Option<(PlayerId, PlayerId)>,
}

impl NewMatch {
    fn into_record(self, match_id: MatchId) -> MatchRecord {
        MatchRecord {
            match_id,
            formation_id: self.formation_id,
            channel_id: self.channel_id,
            team_a: self.teams.team_a().to_vec(),
            team_b: self.teams.team_b().to_vec(),
            method: self.method,
            captains: self.captains,
            status: MatchStatus::InProgress,
            winner: None,
            score: Score::default(),
            created_at: Utc::now(),
            completed_at: None,
            reported_by: None,
        }
    }
}

/// Per-player results and rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub id: PlayerId,
    pub name: String,
    pub mmr: i64,
    pub wins: u32,
    pub losses: u32,
    pub matches: u32,
    pub last_updated: DateTime<Utc>,
}

impl PlayerStats {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, mmr: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mmr,
            wins: 0,
            losses: 0,
            matches: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Trait for match and player storage operations
#[cfg_attr(test, mockall::automock)]
pub trait MatchStore: Send + Sync {
    /// Insert a new match; returns false if the id is already taken
    fn insert_match(&self, record: MatchRecord) -> Result<bool>;

    fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>>;

    /// Atomically move an in-progress match to completed
    fn complete_match(
        &self,
        match_id: &str,
        winner: TeamSide,
        reported_by: &str,
    ) -> Result<MatchRecord>;

    fn get_player(&self, player_id: &str) -> Result<Option<PlayerStats>>;

    /// Store multiple player updates at once
    fn store_players(&self, players: Vec<PlayerStats>) -> Result<()>;

    /// Top players by MMR
    fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerStats>>;

    fn match_count(&self) -> Result<usize>;

    fn player_count(&self) -> Result<usize>;
}

/// Persist a new match under a freshly generated short id, retrying on
/// collision
pub fn persist_new_match(
    store: &dyn MatchStore,
    new_match: NewMatch,
    attempts: u32,
) -> Result<MatchRecord> {
    for attempt in 1..=attempts {
        let record = new_match.clone().into_record(utils::generate_match_id());
        let match_id = record.match_id.clone();
        if store.insert_match(record.clone())? {
            debug!("Stored match {} on attempt {}", match_id, attempt);
            return Ok(record);
        }
        warn!("Match id {} already in use, regenerating", match_id);
    }

    Err(SixMansError::StorageError {
        message: format!("No unused match id after {} attempts", attempts),
    }
    .into())
}

/// Sort order for the leaderboard: MMR, then wins, then id
pub fn leaderboard_order(a: &PlayerStats, b: &PlayerStats) -> std::cmp::Ordering {
    b.mmr
        .cmp(&a.mmr)
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| a.id.cmp(&b.id))
}

/// In-memory match storage implementation
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: RwLock<HashMap<MatchId, MatchRecord>>,
    players: RwLock<HashMap<PlayerId, PlayerStats>>,
}

fn lock_error(what: &str) -> SixMansError {
    SixMansError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn insert_match(&self, record: MatchRecord) -> Result<bool> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| lock_error("matches write"))?;

        if matches.contains_key(&record.match_id) {
            return Ok(false);
        }
        matches.insert(record.match_id.clone(), record);
        Ok(true)
    }

    fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        let matches = self.matches.read().map_err(|_| lock_error("matches read"))?;
        Ok(matches.get(match_id).cloned())
    }

    fn complete_match(
        &self,
        match_id: &str,
        winner: TeamSide,
        reported_by: &str,
    ) -> Result<MatchRecord> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| lock_error("matches write"))?;

        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| SixMansError::MatchNotFound {
                match_id: match_id.to_string(),
            })?;

        if record.status == MatchStatus::Completed {
            return Err(SixMansError::MatchAlreadyReported {
                match_id: match_id.to_string(),
            }
            .into());
        }

        record.status = MatchStatus::Completed;
        record.winner = Some(winner);
        record.score = match winner {
            TeamSide::A => Score { a: 1, b: 0 },
            TeamSide::B => Score { a: 0, b: 1 },
        };
        record.completed_at = Some(Utc::now());
        record.reported_by = Some(reported_by.to_string());

        Ok(record.clone())
    }

    fn get_player(&self, player_id: &str) -> Result<Option<PlayerStats>> {
        let players = self.players.read().map_err(|_| lock_error("players read"))?;
        Ok(players.get(player_id).cloned())
    }

    fn store_players(&self, updates: Vec<PlayerStats>) -> Result<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| lock_error("players write"))?;

        for stats in updates {
            players.insert(stats.id.clone(), stats);
        }
        Ok(())
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerStats>> {
        let players = self.players.read().map_err(|_| lock_error("players read"))?;

        let mut ranked: Vec<PlayerStats> = players.values().cloned().collect();
        ranked.sort_by(leaderboard_order);
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn match_count(&self) -> Result<usize> {
        let matches = self.matches.read().map_err(|_| lock_error("matches read"))?;
        Ok(matches.len())
    }

    fn player_count(&self) -> Result<usize> {
        let players = self.players.read().map_err(|_| lock_error("players read"))?;
        Ok(players.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueSnapshot;
    use uuid::Uuid;

    fn new_match() -> NewMatch {
        let players: Vec<QueuedPlayer> = (1..=6)
            .map(|i| QueuedPlayer::new(format!("p{}", i), format!("P{}", i)))
            .collect();
        let snapshot = QueueSnapshot::new("chan", players.clone()).unwrap();
        let teams =
            TeamAssignment::new(&snapshot, players[..3].to_vec(), players[3..].to_vec()).unwrap();
        NewMatch {
            formation_id: Uuid::new_v4(),
            channel_id: "chan".to_string(),
            teams,
            method: TeamMethod::Random,
            captains: None,
        }
    }

    #[test]
    fn test_persist_and_complete() {
        let store = InMemoryMatchStore::new();
        let record = persist_new_match(&store, new_match(), 4).unwrap();

        assert_eq!(record.status, MatchStatus::InProgress);
        assert_eq!(record.match_id.len(), 6);
        assert_eq!(store.match_count().unwrap(), 1);
        assert_eq!(record.side_of("p2"), Some(TeamSide::A));
        assert_eq!(record.side_of("p5"), Some(TeamSide::B));

        let completed = store
            .complete_match(&record.match_id, TeamSide::B, "p5")
            .unwrap();
        assert_eq!(completed.status, MatchStatus::Completed);
        assert_eq!(completed.score, Score { a: 0, b: 1 });
        assert_eq!(completed.reported_by.as_deref(), Some("p5"));

        let again = store.complete_match(&record.match_id, TeamSide::A, "p1");
        assert!(again.is_err());
    }

    #[test]
    fn test_complete_unknown_match() {
        let store = InMemoryMatchStore::new();
        let err = store.complete_match("abcdef", TeamSide::A, "p1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SixMansError>(),
            Some(SixMansError::MatchNotFound { .. })
        ));
    }

    #[test]
    fn test_persist_retries_on_collision() {
        let mut store = MockMatchStore::new();
        let mut calls = 0;
        store.expect_insert_match().times(3).returning(move |_| {
            calls += 1;
            Ok(calls == 3)
        });

        let record = persist_new_match(&store, new_match(), 5).unwrap();
        assert_eq!(record.status, MatchStatus::InProgress);
    }

    #[test]
    fn test_persist_gives_up() {
        let mut store = MockMatchStore::new();
        store.expect_insert_match().times(2).returning(|_| Ok(false));
        assert!(persist_new_match(&store, new_match(), 2).is_err());
    }

    #[test]
    fn test_leaderboard_order() {
        let store = InMemoryMatchStore::new();
        let mut a = PlayerStats::new("a", "A", 1015);
        a.wins = 1;
        let mut b = PlayerStats::new("b", "B", 1015);
        b.wins = 3;
        let c = PlayerStats::new("c", "C", 988);
        let d = PlayerStats::new("d", "D", 1030);
        store.store_players(vec![a, b, c, d]).unwrap();

        let ids: Vec<String> = store
            .leaderboard(3)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["d", "b", "a"]);
        assert_eq!(store.player_count().unwrap(), 4);
    }
}
