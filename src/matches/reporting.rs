//! Match result reporting and MMR updates

use crate::error::{Result, SixMansError};
use crate::matches::mmr::MmrRule;
use crate::matches::store::{MatchStatus, MatchStore, PlayerStats};
use crate::messaging::Messenger;
use crate::metrics::MetricsCollector;
use crate::types::{MatchOutcome, MatchReported, MmrChange, OutboundEvent, TeamSide};
use crate::utils;
use std::sync::Arc;
use tracing::{error, info};

/// Applies `/report <match_id> win|loss` requests
pub struct MatchReporter {
    store: Arc<dyn MatchStore>,
    messenger: Arc<dyn Messenger>,
    rule: MmrRule,
    metrics_collector: Option<Arc<MetricsCollector>>,
}

impl MatchReporter {
    pub fn new(store: Arc<dyn MatchStore>, messenger: Arc<dyn Messenger>, rule: MmrRule) -> Self {
        Self {
            store,
            messenger,
            rule,
            metrics_collector: None,
        }
    }

    pub fn with_metrics(mut self, metrics_collector: Arc<MetricsCollector>) -> Self {
        self.metrics_collector = Some(metrics_collector);
        self
    }

    /// Record a result. `outcome` is relative to the reporter's own team.
    pub async fn report(
        &self,
        match_id: &str,
        player_id: &str,
        outcome: MatchOutcome,
    ) -> Result<MatchReported> {
        let match_id = match_id.trim().to_lowercase();

        let record = self
            .store
            .get_match(&match_id)?
            .ok_or_else(|| SixMansError::MatchNotFound {
                match_id: match_id.clone(),
            })?;

        let side = record
            .side_of(player_id)
            .ok_or_else(|| SixMansError::NotAParticipant {
                player_id: player_id.to_string(),
                match_id: match_id.clone(),
            })?;

        if record.status == MatchStatus::Completed {
            return Err(SixMansError::MatchAlreadyReported { match_id }.into());
        }

        let winner = match outcome {
            MatchOutcome::Win => side,
            MatchOutcome::Loss => side.opponent(),
        };
        let completed = self.store.complete_match(&match_id, winner, player_id)?;

        let mut updates: Vec<PlayerStats> = Vec::with_capacity(6);
        let mut mmr_changes = Vec::with_capacity(6);
        for (team_side, players) in [
            (TeamSide::A, &completed.team_a),
            (TeamSide::B, &completed.team_b),
        ] {
            for player in players {
                let mut stats = match self.store.get_player(&player.id)? {
                    Some(stats) => stats,
                    None => self.rule.new_player(&player.id, &player.name),
                };
                // Keep the most recent display name
                stats.name = player.name.clone();
                let old_mmr = stats.mmr;
                self.rule.apply(&mut stats, team_side == winner);
                mmr_changes.push(MmrChange {
                    player_id: player.id.clone(),
                    old_mmr,
                    new_mmr: stats.mmr,
                });
                updates.push(stats);
            }
        }
        self.store.store_players(updates)?;

        info!(
            "Match {} reported by {}: team {:?} won",
            match_id, player_id, winner
        );
        if let Some(metrics) = &self.metrics_collector {
            metrics.record_match_reported();
        }

        let event = MatchReported {
            match_id,
            channel_id: completed.channel_id.clone(),
            winner,
            reported_by: player_id.to_string(),
            mmr_changes,
            timestamp: utils::current_timestamp(),
        };
        if let Err(e) = self
            .messenger
            .publish(OutboundEvent::MatchReported(event.clone()))
            .await
        {
            error!("Failed to announce result of {}: {}", event.match_id, e);
        }

        Ok(event)
    }

    /// Top players by MMR
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<PlayerStats>> {
        self.store.leaderboard(limit)
    }

    /// A player's stats and 1-based leaderboard position, if they have any
    /// reported matches
    pub fn standing(&self, player_id: &str) -> Result<Option<(PlayerStats, usize)>> {
        let ranked = self.store.player_count()?;
        let board = self.store.leaderboard(ranked)?;
        Ok(board
            .into_iter()
            .enumerate()
            .find(|(_, p)| p.id == player_id)
            .map(|(i, p)| (p, i + 1)))
    }

    pub fn ranked_players(&self) -> Result<usize> {
        self.store.player_count()
    }
}
