//! Queue manager for all channels
//!
//! Owns one `QueueInstance` per channel and enforces that a player waits in
//! at most one queue. When a queue fills, its players are handed to the
//! formation coordinator while the queue lock is still held, so nobody can
//! slip into another queue between draining and locking.

use crate::error::{Result, SixMansError};
use crate::formation::FormationCoordinator;
use crate::messaging::Messenger;
use crate::metrics::MetricsCollector;
use crate::queue::instance::{JoinResult, QueueInstance};
use crate::types::{
    ChannelId, FormationId, OutboundEvent, PlayerId, QueueUpdated, QueuedPlayer, SNAPSHOT_SIZE,
};
use crate::utils::current_timestamp;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueManagerStats {
    /// Total successful joins
    pub players_joined: u64,
    /// Total voluntary leaves
    pub players_left: u64,
    /// Total queues that filled and started a formation
    pub formations_started: u64,
    /// Total admin clears
    pub queues_cleared: u64,
    /// Channels with at least one waiting player
    pub active_queues: usize,
    /// Players currently waiting
    pub players_waiting: usize,
}

#[derive(Debug)]
pub enum JoinOutcome {
    Queued { position: usize },
    FormationStarted { formation_id: FormationId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOutcome {
    pub players_removed: usize,
    pub formations_cancelled: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<ChannelId, QueueInstance>,
    /// Which channel each waiting player is queued in
    players: HashMap<PlayerId, ChannelId>,
}

pub struct QueueManager {
    state: RwLock<QueueState>,
    coordinator: Arc<FormationCoordinator>,
    messenger: Arc<dyn Messenger>,
    stats: RwLock<QueueManagerStats>,
    metrics_collector: Option<Arc<MetricsCollector>>,
}

fn lock_error(what: &str) -> SixMansError {
    SixMansError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
}

impl QueueManager {
    pub fn new(coordinator: Arc<FormationCoordinator>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            state: RwLock::new(QueueState::default()),
            coordinator,
            messenger,
            stats: RwLock::new(QueueManagerStats::default()),
            metrics_collector: None,
        }
    }

    pub fn with_metrics(mut self, metrics_collector: Arc<MetricsCollector>) -> Self {
        self.metrics_collector = Some(metrics_collector);
        self
    }

    pub fn coordinator(&self) -> &Arc<FormationCoordinator> {
        &self.coordinator
    }

    /// Add a player to a channel's queue, starting a formation if it fills
    pub async fn join(&self, channel_id: &str, player: QueuedPlayer) -> Result<JoinOutcome> {
        let player_id = player.id.clone();

        let (outcome, waiting) = {
            let mut guard = self.state.write().map_err(|_| lock_error("queue write"))?;
            let state = &mut *guard;

            if self.coordinator.is_locked(&player_id)? {
                return Err(SixMansError::PlayerLocked { player_id }.into());
            }
            if let Some(existing) = state.players.get(&player_id) {
                return Err(SixMansError::AlreadyQueued {
                    player_id,
                    channel_id: existing.clone(),
                }
                .into());
            }

            let queue = state
                .queues
                .entry(channel_id.to_string())
                .or_insert_with(|| QueueInstance::new(channel_id));

            match queue.join(player)? {
                JoinResult::Waiting { position } => {
                    let waiting = queue.players().to_vec();
                    state.players.insert(player_id.clone(), channel_id.to_string());
                    info!(
                        "Player {} joined queue {} ({}/{})",
                        player_id, channel_id, position, SNAPSHOT_SIZE
                    );
                    (JoinOutcome::Queued { position }, waiting)
                }
                JoinResult::Full(snapshot) => {
                    let drained = snapshot.players().to_vec();
                    match self.coordinator.start_formation(snapshot) {
                        Ok((formation_id, _task)) => {
                            for p in &drained {
                                state.players.remove(&p.id);
                            }
                            state.queues.remove(channel_id);
                            info!(
                                "Queue {} is full, formation {} started",
                                channel_id, formation_id
                            );
                            (JoinOutcome::FormationStarted { formation_id }, Vec::new())
                        }
                        Err(e) => {
                            error!("Failed to start formation for {}: {}", channel_id, e);
                            let mut restored = drained;
                            restored.retain(|p| p.id != player_id);
                            if let Some(queue) = state.queues.get_mut(channel_id) {
                                queue.restore(restored);
                            }
                            return Err(e);
                        }
                    }
                }
            }
        };

        self.update_stats(|stats| {
            stats.players_joined += 1;
            if matches!(outcome, JoinOutcome::FormationStarted { .. }) {
                stats.formations_started += 1;
            }
        });
        if let Some(metrics) = &self.metrics_collector {
            metrics.record_queue_join();
        }
        self.publish_queue(channel_id, waiting).await;

        Ok(outcome)
    }

    /// Remove a waiting player. Players in an active formation stay put.
    pub async fn leave(&self, channel_id: &str, player_id: &str) -> Result<QueuedPlayer> {
        let (player, waiting) = {
            let mut guard = self.state.write().map_err(|_| lock_error("queue write"))?;
            let state = &mut *guard;

            if self.coordinator.is_locked(player_id)? {
                return Err(SixMansError::PlayerLocked {
                    player_id: player_id.to_string(),
                }
                .into());
            }

            let queue = state.queues.get_mut(channel_id).ok_or_else(|| {
                SixMansError::NotInQueue {
                    player_id: player_id.to_string(),
                    channel_id: channel_id.to_string(),
                }
            })?;
            let player = queue.leave(player_id)?;
            let waiting = queue.players().to_vec();
            if queue.is_empty() {
                state.queues.remove(channel_id);
            }
            state.players.remove(player_id);
            (player, waiting)
        };

        info!("Player {} left queue {}", player_id, channel_id);
        self.update_stats(|stats| stats.players_left += 1);
        self.publish_queue(channel_id, waiting).await;
        Ok(player)
    }

    /// Admin clear: empty the queue and cancel the channel's formations
    pub async fn clear(&self, channel_id: &str, requested_by: &str) -> Result<ClearOutcome> {
        let removed = {
            let mut guard = self.state.write().map_err(|_| lock_error("queue write"))?;
            let state = &mut *guard;
            let removed = state
                .queues
                .remove(channel_id)
                .map(|mut queue| queue.clear())
                .unwrap_or_default();
            for player in &removed {
                state.players.remove(&player.id);
            }
            removed
        };

        let cancelled = self
            .coordinator
            .cancel_channel(channel_id, &format!("queue cleared by {}", requested_by))?;

        warn!(
            "Queue {} cleared by {}: {} waiting player(s) removed, {} formation(s) cancelled",
            channel_id,
            requested_by,
            removed.len(),
            cancelled
        );
        self.update_stats(|stats| stats.queues_cleared += 1);
        self.publish_queue(channel_id, Vec::new()).await;

        Ok(ClearOutcome {
            players_removed: removed.len(),
            formations_cancelled: cancelled,
        })
    }

    /// Players currently waiting in a channel
    pub fn status(&self, channel_id: &str) -> Result<Vec<QueuedPlayer>> {
        let state = self.state.read().map_err(|_| lock_error("queue read"))?;
        Ok(state
            .queues
            .get(channel_id)
            .map(|q| q.players().to_vec())
            .unwrap_or_default())
    }

    /// Channel a player is waiting in, if any
    pub fn queued_channel(&self, player_id: &str) -> Result<Option<ChannelId>> {
        let state = self.state.read().map_err(|_| lock_error("queue read"))?;
        Ok(state.players.get(player_id).cloned())
    }

    pub fn get_stats(&self) -> Result<QueueManagerStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| lock_error("queue stats read"))?
            .clone();
        let state = self.state.read().map_err(|_| lock_error("queue read"))?;
        stats.active_queues = state.queues.len();
        stats.players_waiting = state.players.len();
        Ok(stats)
    }

    fn update_stats(&self, update: impl FnOnce(&mut QueueManagerStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to acquire queue stats lock"),
        }
    }

    async fn publish_queue(&self, channel_id: &str, players: Vec<QueuedPlayer>) {
        let event = OutboundEvent::QueueUpdated(QueueUpdated {
            channel_id: channel_id.to_string(),
            players,
            capacity: SNAPSHOT_SIZE,
            timestamp: current_timestamp(),
        });
        if let Err(e) = self.messenger.publish(event).await {
            debug!("Failed to publish queue update for {}: {}", channel_id, e);
        }
    }
}
