//! Keyed registry of running formations
//!
//! Maps formation ids to the sender of each formation task's event queue,
//! and players to the formation they are locked into. Removal from the
//! registry is the single point that decides whether a formation ends by
//! finalizing or by cancellation.

use crate::error::{Result, SixMansError};
use crate::formation::FormationEvent;
use crate::types::{ChannelId, FormationId, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Where a formation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationPhase {
    Voting,
    Drafting,
    Finalizing,
}

#[derive(Debug, Clone)]
pub struct FormationHandle {
    pub id: FormationId,
    pub channel_id: ChannelId,
    pub players: Vec<PlayerId>,
    pub phase: FormationPhase,
    pub started_at: DateTime<Utc>,
    sender: mpsc::Sender<FormationEvent>,
}

impl FormationHandle {
    pub fn new(
        id: FormationId,
        channel_id: ChannelId,
        players: Vec<PlayerId>,
        sender: mpsc::Sender<FormationEvent>,
    ) -> Self {
        Self {
            id,
            channel_id,
            players,
            phase: FormationPhase::Voting,
            started_at: Utc::now(),
            sender,
        }
    }

    /// Use the moment the queue filled rather than registration time
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn sender(&self) -> &mpsc::Sender<FormationEvent> {
        &self.sender
    }
}

/// Summary row for the stats endpoint and queue status replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationSummary {
    pub id: FormationId,
    pub channel_id: ChannelId,
    pub phase: FormationPhase,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    formations: HashMap<FormationId, FormationHandle>,
    players: HashMap<PlayerId, FormationId>,
}

impl RegistryInner {
    fn remove(&mut self, id: &FormationId) -> Option<FormationHandle> {
        let handle = self.formations.remove(id)?;
        for player in &handle.players {
            if self.players.get(player) == Some(id) {
                self.players.remove(player);
            }
        }
        Some(handle)
    }
}

#[derive(Debug, Default)]
pub struct FormationRegistry {
    inner: Mutex<RegistryInner>,
}

impl FormationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryInner>> {
        self.inner.lock().map_err(|_| {
            SixMansError::InternalError {
                message: "Failed to acquire formation registry lock".to_string(),
            }
            .into()
        })
    }

    /// Register a formation and lock its players
    pub fn register(&self, handle: FormationHandle) -> Result<()> {
        let mut inner = self.lock()?;

        if let Some(locked) = handle
            .players
            .iter()
            .find(|p| inner.players.contains_key(*p))
        {
            return Err(SixMansError::PlayerLocked {
                player_id: locked.clone(),
            }
            .into());
        }

        for player in &handle.players {
            inner.players.insert(player.clone(), handle.id);
        }
        inner.formations.insert(handle.id, handle);
        Ok(())
    }

    pub fn sender_for(&self, id: &FormationId) -> Result<Option<mpsc::Sender<FormationEvent>>> {
        let inner = self.lock()?;
        Ok(inner.formations.get(id).map(|h| h.sender.clone()))
    }

    pub fn formation_for_player(&self, player_id: &str) -> Result<Option<FormationId>> {
        let inner = self.lock()?;
        Ok(inner.players.get(player_id).copied())
    }

    pub fn is_locked(&self, player_id: &str) -> Result<bool> {
        Ok(self.formation_for_player(player_id)?.is_some())
    }

    pub fn set_phase(&self, id: &FormationId, phase: FormationPhase) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(handle) = inner.formations.get_mut(id) {
            handle.phase = phase;
        }
        Ok(())
    }

    /// Claim the right to finalize. Returns false if the formation was
    /// already cancelled.
    pub fn finish(&self, id: &FormationId) -> Result<bool> {
        let mut inner = self.lock()?;
        Ok(inner.remove(id).is_some())
    }

    /// Remove a formation so it can no longer finalize
    pub fn cancel(&self, id: &FormationId) -> Result<Option<FormationHandle>> {
        let mut inner = self.lock()?;
        Ok(inner.remove(id))
    }

    /// Remove every formation started from `channel_id`
    pub fn cancel_channel(&self, channel_id: &str) -> Result<Vec<FormationHandle>> {
        let mut inner = self.lock()?;
        let ids: Vec<FormationId> = inner
            .formations
            .values()
            .filter(|h| h.channel_id == channel_id)
            .map(|h| h.id)
            .collect();
        Ok(ids.iter().filter_map(|id| inner.remove(id)).collect())
    }

    pub fn active_count(&self) -> Result<usize> {
        Ok(self.lock()?.formations.len())
    }

    pub fn locked_player_count(&self) -> Result<usize> {
        Ok(self.lock()?.players.len())
    }

    pub fn summaries(&self) -> Result<Vec<FormationSummary>> {
        self.summaries_where(|_| true)
    }

    /// Formations started from one channel
    pub fn channel_summaries(&self, channel_id: &str) -> Result<Vec<FormationSummary>> {
        self.summaries_where(|h| h.channel_id == channel_id)
    }

    fn summaries_where<F>(&self, keep: F) -> Result<Vec<FormationSummary>>
    where
        F: Fn(&FormationHandle) -> bool,
    {
        let inner = self.lock()?;
        let mut rows: Vec<FormationSummary> = inner
            .formations
            .values()
            .filter(|h| keep(h))
            .map(|h| FormationSummary {
                id: h.id,
                channel_id: h.channel_id.clone(),
                phase: h.phase,
                started_at: h.started_at,
            })
            .collect();
        rows.sort_by_key(|r| r.started_at);
        Ok(rows)
    }
}
