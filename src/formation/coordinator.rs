//! Entry point for starting formations and routing events to them

use crate::error::{Result, SixMansError};
use crate::formation::registry::{FormationHandle, FormationRegistry};
use crate::formation::task::{FormationEvent, FormationOutcome, FormationTask, FormationTimings};
use crate::matches::MatchStore;
use crate::messaging::Messenger;
use crate::metrics::MetricsCollector;
use crate::types::{FormationId, QueueSnapshot, TeamMethod};
use crate::utils;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const DEFAULT_EVENT_BUFFER: usize = 64;

pub struct FormationCoordinator {
    registry: Arc<FormationRegistry>,
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn MatchStore>,
    timings: FormationTimings,
    event_buffer: usize,
    seed: Option<u64>,
    started: AtomicU64,
    metrics_collector: Option<Arc<MetricsCollector>>,
}

impl FormationCoordinator {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn MatchStore>,
        timings: FormationTimings,
    ) -> Self {
        Self {
            registry: Arc::new(FormationRegistry::new()),
            messenger,
            store,
            timings,
            event_buffer: DEFAULT_EVENT_BUFFER,
            seed: None,
            started: AtomicU64::new(0),
            metrics_collector: None,
        }
    }

    /// Deterministic team assembly; each formation derives its own seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics_collector: Arc<MetricsCollector>) -> Self {
        self.metrics_collector = Some(metrics_collector);
        self
    }

    pub fn registry(&self) -> &Arc<FormationRegistry> {
        &self.registry
    }

    /// Number of formations started since startup
    pub fn formations_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    fn next_rng(&self) -> StdRng {
        let n = self.started.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Lock the snapshot's players and spawn the formation task
    pub fn start_formation(
        &self,
        snapshot: QueueSnapshot,
    ) -> Result<(FormationId, JoinHandle<FormationOutcome>)> {
        let id = utils::generate_formation_id();
        let (sender, receiver) = mpsc::channel(self.event_buffer);

        let handle = FormationHandle::new(
            id,
            snapshot.channel_id().to_string(),
            snapshot.player_ids(),
            sender,
        )
        .with_started_at(snapshot.captured_at());
        self.registry.register(handle)?;

        if let Some(metrics) = &self.metrics_collector {
            metrics.record_formation_started();
        }
        info!(
            "Starting formation {} for channel {}",
            id,
            snapshot.channel_id()
        );

        let task = FormationTask::new(
            id,
            Arc::new(snapshot),
            receiver,
            self.messenger.clone(),
            self.store.clone(),
            self.registry.clone(),
            self.timings,
            self.next_rng(),
        )
        .with_metrics(self.metrics_collector.clone());

        Ok((id, tokio::spawn(task.run())))
    }

    /// Forward a vote. Returns false when the formation no longer exists.
    pub async fn cast_vote(
        &self,
        formation_id: FormationId,
        player_id: &str,
        choice: TeamMethod,
    ) -> Result<bool> {
        let Some(sender) = self.registry.sender_for(&formation_id)? else {
            debug!(
                "Vote from {} for unknown formation {}",
                player_id, formation_id
            );
            return Ok(false);
        };

        Ok(sender
            .send(FormationEvent::Vote {
                player_id: player_id.to_string(),
                choice,
            })
            .await
            .is_ok())
    }

    /// Route a DM reply to the formation its author is locked into
    pub async fn submit_pick_reply(&self, player_id: &str, content: &str) -> Result<bool> {
        let Some(formation_id) = self.registry.formation_for_player(player_id)? else {
            debug!("Pick reply from {} who is not in a formation", player_id);
            return Ok(false);
        };
        let Some(sender) = self.registry.sender_for(&formation_id)? else {
            return Ok(false);
        };

        Ok(sender
            .send(FormationEvent::PickReply {
                player_id: player_id.to_string(),
                content: content.to_string(),
            })
            .await
            .is_ok())
    }

    /// Cancel one formation. It will never persist a match after this.
    pub fn cancel_formation(&self, formation_id: FormationId, reason: &str) -> Result<()> {
        let handle = self
            .registry
            .cancel(&formation_id)?
            .ok_or_else(|| SixMansError::FormationNotFound {
                formation_id: formation_id.to_string(),
            })?;
        Self::notify_cancel(&handle, reason);
        Ok(())
    }

    /// Cancel every formation started from a channel
    pub fn cancel_channel(&self, channel_id: &str, reason: &str) -> Result<usize> {
        let handles = self.registry.cancel_channel(channel_id)?;
        for handle in &handles {
            Self::notify_cancel(handle, reason);
        }
        if !handles.is_empty() {
            info!(
                "Cancelled {} formation(s) in channel {}: {}",
                handles.len(),
                channel_id,
                reason
            );
        }
        Ok(handles.len())
    }

    fn notify_cancel(handle: &FormationHandle, reason: &str) {
        // A full or closed queue is fine: the task can no longer finalize
        if let Err(e) = handle.sender().try_send(FormationEvent::Cancel {
            reason: reason.to_string(),
        }) {
            debug!(
                "Could not deliver cancel to formation {}: {}",
                handle.id, e
            );
        }
    }

    pub fn is_locked(&self, player_id: &str) -> Result<bool> {
        self.registry.is_locked(player_id)
    }
}
