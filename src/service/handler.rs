//! Routes inbound gateway messages to the queue, formations and reporter

use crate::amqp::handlers::MessageHandler;
use crate::error::{Result, SixMansError};
use crate::queue::JoinOutcome;
use crate::service::app::ServiceContext;
use crate::types::{
    CommandRejected, InboundMessage, OutboundEvent, PlayerRank, QueueStatus, QueuedPlayer,
    SNAPSHOT_SIZE,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Production message handler backed by the service context
pub struct InboundRouter {
    context: Arc<ServiceContext>,
}

impl InboundRouter {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    async fn dispatch(&self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::QueueJoin {
                channel_id,
                player_id,
                player_name,
            } => {
                let outcome = self
                    .context
                    .queue_manager()
                    .join(&channel_id, QueuedPlayer::new(player_id, player_name))
                    .await?;
                if let JoinOutcome::FormationStarted { formation_id } = outcome {
                    info!(
                        "Queue {} filled, formation {} started",
                        channel_id, formation_id
                    );
                }
            }
            InboundMessage::QueueLeave {
                channel_id,
                player_id,
            } => {
                self.context
                    .queue_manager()
                    .leave(&channel_id, &player_id)
                    .await?;
            }
            InboundMessage::QueueClear {
                channel_id,
                requested_by,
            } => {
                self.context
                    .queue_manager()
                    .clear(&channel_id, &requested_by)
                    .await?;
            }
            InboundMessage::VoteCast {
                formation_id,
                player_id,
                choice,
            } => {
                let delivered = self
                    .context
                    .coordinator()
                    .cast_vote(formation_id, &player_id, choice)
                    .await?;
                if !delivered {
                    debug!(
                        "Dropped {} vote from {}: formation {} is gone",
                        choice, player_id, formation_id
                    );
                }
            }
            InboundMessage::PickReply { player_id, content } => {
                let delivered = self
                    .context
                    .coordinator()
                    .submit_pick_reply(&player_id, &content)
                    .await?;
                if !delivered {
                    debug!("Ignored DM from {}: not in a formation", player_id);
                }
            }
            InboundMessage::MatchReport {
                match_id,
                player_id,
                outcome,
            } => {
                self.context
                    .reporter()
                    .report(&match_id, &player_id, outcome)
                    .await?;
            }
            InboundMessage::QueueStatus {
                channel_id,
                player_id,
            } => {
                let players = self.context.queue_manager().status(&channel_id)?;
                let active_formations = self
                    .context
                    .coordinator()
                    .registry()
                    .channel_summaries(&channel_id)?;
                self.reply(OutboundEvent::QueueStatus(QueueStatus {
                    channel_id,
                    requested_by: player_id,
                    players,
                    capacity: SNAPSHOT_SIZE,
                    active_formations,
                    timestamp: current_timestamp(),
                }))
                .await?;
            }
            InboundMessage::RankLookup {
                channel_id,
                player_id,
                target_id,
            } => {
                let reporter = self.context.reporter();
                let target = target_id.unwrap_or_else(|| player_id.clone());
                let standing = reporter.standing(&target)?;
                let ranked_players = reporter.ranked_players()?;
                let (stats, rank) = match standing {
                    Some((stats, rank)) => (Some(stats), Some(rank)),
                    None => (None, None),
                };
                self.reply(OutboundEvent::PlayerRank(PlayerRank {
                    channel_id,
                    requested_by: player_id,
                    player_id: target,
                    stats,
                    rank,
                    ranked_players,
                    timestamp: current_timestamp(),
                }))
                .await?;
            }
        }

        Ok(())
    }

    async fn reply(&self, event: OutboundEvent) -> Result<()> {
        self.context.messenger().publish(event).await
    }

    /// Tell the player why their command had no effect
    async fn reject(&self, kind: &str, message: &InboundMessage, error: &anyhow::Error) {
        let reason = match error.downcast_ref::<SixMansError>() {
            Some(domain) => domain.to_string(),
            None => "Something went wrong, please try again".to_string(),
        };
        let event = OutboundEvent::CommandRejected(CommandRejected {
            recipient: message.player_id().to_string(),
            channel_id: message.channel_id().map(str::to_string),
            kind: kind.to_string(),
            reason,
            timestamp: current_timestamp(),
        });

        if let Err(e) = self.context.messenger().publish(event).await {
            warn!(
                "Failed to tell {} why {} was rejected: {}",
                message.player_id(),
                kind,
                e
            );
        }
    }
}

#[async_trait]
impl MessageHandler for InboundRouter {
    async fn handle_inbound(&self, message: InboundMessage) -> Result<()> {
        let kind = message.kind();
        let player_id = message.player_id().to_string();
        let metrics = self.context.metrics_collector();
        let timer = metrics.start_timer();

        let result = self.dispatch(message.clone()).await;
        if let Err(e) = &result {
            self.reject(kind, &message, e).await;
        }
        let elapsed = timer.stop();
        metrics.record_amqp_message(kind, result.is_ok());

        match &result {
            Ok(()) => debug!(
                "Handled {} from {} in {:.2}ms",
                kind,
                player_id,
                elapsed.as_secs_f64() * 1000.0
            ),
            Err(e) => warn!(
                "Rejected {} from {} after {:.2}ms: {}",
                kind,
                player_id,
                elapsed.as_secs_f64() * 1000.0,
                e
            ),
        }

        result
    }

    async fn handle_error(&self, error: SixMansError, message_data: &[u8]) {
        match &error {
            SixMansError::InvalidMessage { .. } => {
                let preview_len = message_data.len().min(100);
                let preview = String::from_utf8_lossy(&message_data[..preview_len]);
                error!("Dropping malformed message ({}): {:?}", error, preview);
            }
            _ => debug!(
                "Message of {} bytes not applied: {}",
                message_data.len(),
                error
            ),
        }
    }
}
