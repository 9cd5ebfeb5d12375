//! Single-channel queue

use crate::error::{Result, SixMansError};
use crate::types::{ChannelId, QueueSnapshot, QueuedPlayer, SNAPSHOT_SIZE};
use chrono::{DateTime, Utc};

/// What happened when a player joined
#[derive(Debug)]
pub enum JoinResult {
    /// Waiting at this 1-based position
    Waiting { position: usize },
    /// The join filled the queue; it has been emptied into this snapshot
    Full(QueueSnapshot),
}

#[derive(Debug, Clone)]
pub struct QueueInstance {
    channel_id: ChannelId,
    players: Vec<QueuedPlayer>,
    capacity: usize,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl QueueInstance {
    pub fn new(channel_id: impl Into<ChannelId>) -> Self {
        let now = Utc::now();
        Self {
            channel_id: channel_id.into(),
            players: Vec::with_capacity(SNAPSHOT_SIZE),
            capacity: SNAPSHOT_SIZE,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn players(&self) -> &[QueuedPlayer] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn join(&mut self, player: QueuedPlayer) -> Result<JoinResult> {
        if self.contains(&player.id) {
            return Err(SixMansError::AlreadyQueued {
                player_id: player.id,
                channel_id: self.channel_id.clone(),
            }
            .into());
        }

        self.players.push(player);
        self.last_activity = Utc::now();

        if self.players.len() < self.capacity {
            return Ok(JoinResult::Waiting {
                position: self.players.len(),
            });
        }

        let drained = std::mem::take(&mut self.players);
        match QueueSnapshot::new(self.channel_id.clone(), drained.clone()) {
            Ok(snapshot) => Ok(JoinResult::Full(snapshot)),
            Err(e) => {
                self.players = drained;
                Err(e)
            }
        }
    }

    /// Put drained players back, e.g. when a formation could not start
    pub fn restore(&mut self, players: Vec<QueuedPlayer>) {
        self.players = players;
        self.last_activity = Utc::now();
    }

    pub fn leave(&mut self, player_id: &str) -> Result<QueuedPlayer> {
        let index = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| SixMansError::NotInQueue {
                player_id: player_id.to_string(),
                channel_id: self.channel_id.clone(),
            })?;
        self.last_activity = Utc::now();
        Ok(self.players.remove(index))
    }

    pub fn clear(&mut self) -> Vec<QueuedPlayer> {
        self.last_activity = Utc::now();
        std::mem::take(&mut self.players)
    }
}
