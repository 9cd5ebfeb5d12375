//! Per-formation task
//!
//! Each queue-full event gets one task that owns the vote and the draft
//! for that snapshot. Everything from outside (votes, DM replies, cancel
//! requests) arrives through a single mpsc receiver, so session state is
//! only ever touched from here. Timers live inside the task and disappear
//! with it.

use crate::config::AppConfig;
use crate::draft::{format_pool, parse_pick_reply, CaptainDraftState, CaptainSlot, PickResult};
use crate::error::Result;
use crate::formation::assembler::TeamAssembler;
use crate::formation::registry::{FormationPhase, FormationRegistry};
use crate::matches::{persist_new_match, MatchRecord, MatchStore, NewMatch};
use crate::messaging::Messenger;
use crate::metrics::MetricsCollector;
use crate::types::*;
use crate::utils;
use crate::voting::{VoteOutcome, VotingSession};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Inbound events routed to one formation
#[derive(Debug, Clone)]
pub enum FormationEvent {
    Vote {
        player_id: PlayerId,
        choice: TeamMethod,
    },
    PickReply {
        player_id: PlayerId,
        content: String,
    },
    Cancel {
        reason: String,
    },
}

/// How a formation ended
#[derive(Debug)]
pub enum FormationOutcome {
    Finalized(MatchRecord),
    Cancelled { reason: String },
    Failed { reason: String },
}

/// Timing knobs for votes and drafts
#[derive(Debug, Clone, Copy)]
pub struct FormationTimings {
    pub vote_window: Duration,
    pub pick_timeout: Duration,
    pub match_id_attempts: u32,
}

impl Default for FormationTimings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FormationTimings {
    fn from(config: &AppConfig) -> Self {
        Self {
            vote_window: config.vote_window(),
            pick_timeout: config.pick_timeout(),
            match_id_attempts: config.formation.match_id_attempts,
        }
    }
}

enum Wake {
    Event(FormationEvent),
    Closed,
    Deadline,
}

enum Step<T> {
    Continue(T),
    Cancelled(String),
}

pub struct FormationTask {
    id: FormationId,
    snapshot: Arc<QueueSnapshot>,
    events: mpsc::Receiver<FormationEvent>,
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn MatchStore>,
    registry: Arc<FormationRegistry>,
    timings: FormationTimings,
    rng: StdRng,
    metrics_collector: Option<Arc<MetricsCollector>>,
}

impl FormationTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: FormationId,
        snapshot: Arc<QueueSnapshot>,
        events: mpsc::Receiver<FormationEvent>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn MatchStore>,
        registry: Arc<FormationRegistry>,
        timings: FormationTimings,
        rng: StdRng,
    ) -> Self {
        Self {
            id,
            snapshot,
            events,
            messenger,
            store,
            registry,
            timings,
            rng,
            metrics_collector: None,
        }
    }

    pub fn with_metrics(mut self, metrics_collector: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics_collector = metrics_collector;
        self
    }

    /// Drive the formation to completion
    pub async fn run(mut self) -> FormationOutcome {
        let started = Instant::now();
        info!(
            "Formation {} started in channel {} with {} players",
            self.id,
            self.snapshot.channel_id(),
            self.snapshot.players().len()
        );

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Formation {} failed: {}", self.id, e);
                if let Err(release_err) = self.registry.cancel(&self.id) {
                    error!("Failed to release formation {}: {}", self.id, release_err);
                }
                self.announce_cancelled("team formation failed").await;
                FormationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if let Some(metrics) = &self.metrics_collector {
            metrics.record_formation_finished(&outcome, started.elapsed());
        }
        outcome
    }

    async fn drive(&mut self) -> Result<FormationOutcome> {
        let method = match self.run_vote().await? {
            Step::Continue(method) => method,
            Step::Cancelled(reason) => return Ok(self.cancelled(reason).await),
        };

        let (teams, captains) = match method {
            TeamMethod::Random => (
                TeamAssembler::random_teams(&self.snapshot, &mut self.rng)?,
                None,
            ),
            TeamMethod::Captains => {
                self.registry.set_phase(&self.id, FormationPhase::Drafting)?;
                let state = TeamAssembler::select_captains(&self.snapshot, &mut self.rng)?;
                let captains = (
                    state.captain(CaptainSlot::One).id.clone(),
                    state.captain(CaptainSlot::Two).id.clone(),
                );
                info!(
                    "Formation {}: captains are {} and {}",
                    self.id, captains.0, captains.1
                );
                self.publish(OutboundEvent::CaptainsSelected(CaptainsSelected {
                    formation_id: self.id,
                    channel_id: self.snapshot.channel_id().to_string(),
                    captain_one: state.captain(CaptainSlot::One).clone(),
                    captain_two: state.captain(CaptainSlot::Two).clone(),
                    pool: state.pool().to_vec(),
                    timestamp: utils::current_timestamp(),
                }))
                .await;

                match self.run_draft(state).await? {
                    Step::Continue(state) => (state.into_assignment(&self.snapshot)?, Some(captains)),
                    Step::Cancelled(reason) => return Ok(self.cancelled(reason).await),
                }
            }
        };

        self.finalize(teams, method, captains).await
    }

    async fn next_wake(&mut self, deadline: Instant) -> Wake {
        tokio::select! {
            biased;
            event = self.events.recv() => match event {
                Some(event) => Wake::Event(event),
                None => Wake::Closed,
            },
            _ = sleep_until(deadline) => Wake::Deadline,
        }
    }

    async fn run_vote(&mut self) -> Result<Step<TeamMethod>> {
        let mut session = VotingSession::start(self.snapshot.clone(), self.timings.vote_window);
        let deadline = session.deadline();

        self.publish(OutboundEvent::VoteStarted(VoteStarted {
            formation_id: self.id,
            channel_id: self.snapshot.channel_id().to_string(),
            players: self.snapshot.players().to_vec(),
            options: vec![TeamMethod::Random, TeamMethod::Captains],
            window_seconds: self.timings.vote_window.as_secs(),
            timestamp: utils::current_timestamp(),
        }))
        .await;

        let timed_out = loop {
            match self.next_wake(deadline).await {
                Wake::Event(FormationEvent::Vote { player_id, choice }) => {
                    match session.record_vote(&player_id, choice) {
                        VoteOutcome::Recorded | VoteOutcome::Changed { .. } => {
                            debug!("Formation {}: {} voted {}", self.id, player_id, choice);
                            if let Some(metrics) = &self.metrics_collector {
                                metrics.record_vote(choice);
                            }
                            let counts = session.counts();
                            self.publish(OutboundEvent::VoteTally(VoteTally {
                                formation_id: self.id,
                                channel_id: self.snapshot.channel_id().to_string(),
                                random_votes: counts.random,
                                captains_votes: counts.captains,
                                votes_received: counts.voted(),
                                votes_needed: SNAPSHOT_SIZE,
                                timestamp: utils::current_timestamp(),
                            }))
                            .await;
                        }
                        VoteOutcome::Unchanged | VoteOutcome::Ignored(_) => continue,
                    }
                    if session.all_voted() {
                        break false;
                    }
                }
                Wake::Event(FormationEvent::PickReply { player_id, .. }) => {
                    debug!(
                        "Formation {}: ignoring pick reply from {} during vote",
                        self.id, player_id
                    );
                }
                Wake::Event(FormationEvent::Cancel { reason }) => {
                    return Ok(Step::Cancelled(reason));
                }
                Wake::Closed => {
                    return Ok(Step::Cancelled("formation event channel closed".to_string()));
                }
                Wake::Deadline => {
                    session.expire();
                    break true;
                }
            }
        };

        let counts = session.counts();
        let method = session.resolve();
        if timed_out {
            info!(
                "Formation {}: vote window closed with {}/{} votes, using {}",
                self.id,
                counts.voted(),
                SNAPSHOT_SIZE,
                method
            );
        } else {
            info!("Formation {}: all players voted, using {}", self.id, method);
        }
        if let Some(metrics) = &self.metrics_collector {
            metrics.record_method_decided(method, timed_out);
        }

        self.publish(OutboundEvent::VoteResolved(VoteResolved {
            formation_id: self.id,
            channel_id: self.snapshot.channel_id().to_string(),
            method,
            random_votes: counts.random,
            captains_votes: counts.captains,
            timed_out,
            timestamp: utils::current_timestamp(),
        }))
        .await;

        Ok(Step::Continue(method))
    }

    async fn run_draft(
        &mut self,
        mut state: CaptainDraftState,
    ) -> Result<Step<CaptainDraftState>> {
        while let Some(slot) = state.current_slot() {
            let captain = state.captain(slot).clone();
            let owed = state.picks_owed();
            self.request_pick(&state, slot, owed).await;

            // Rejected replies do not extend the turn
            let deadline = utils::deadline_after(self.timings.pick_timeout);
            loop {
                match self.next_wake(deadline).await {
                    Wake::Event(FormationEvent::PickReply { player_id, content }) => {
                        if player_id != captain.id {
                            debug!(
                                "Formation {}: ignoring reply from {}, waiting on {}",
                                self.id, player_id, captain.id
                            );
                            continue;
                        }

                        match parse_pick_reply(&content, state.pool(), owed) {
                            Ok(picks) => {
                                for pick in picks {
                                    let result = state.pick(&pick)?;
                                    self.announce_pick(&state, result, PickSource::Captain)
                                        .await;
                                }
                                break;
                            }
                            Err(reason) => {
                                debug!(
                                    "Formation {}: rejected reply '{}' from {}: {}",
                                    self.id, content, player_id, reason
                                );
                                self.publish(OutboundEvent::PickRejected(PickRejected {
                                    formation_id: self.id,
                                    recipient: captain.id.clone(),
                                    reason: reason.to_string(),
                                    timestamp: utils::current_timestamp(),
                                }))
                                .await;
                                self.request_pick(&state, slot, owed).await;
                            }
                        }
                    }
                    Wake::Event(FormationEvent::Vote { player_id, .. }) => {
                        debug!(
                            "Formation {}: ignoring late vote from {}",
                            self.id, player_id
                        );
                    }
                    Wake::Event(FormationEvent::Cancel { reason }) => {
                        return Ok(Step::Cancelled(reason));
                    }
                    Wake::Closed => {
                        return Ok(Step::Cancelled(
                            "formation event channel closed".to_string(),
                        ));
                    }
                    Wake::Deadline => {
                        let result = state.auto_pick()?;
                        warn!(
                            "Formation {}: captain {} timed out, auto-picked {}",
                            self.id, captain.id, result.picked.id
                        );
                        self.publish(OutboundEvent::PickTimedOut(PickTimedOut {
                            formation_id: self.id,
                            recipient: captain.id.clone(),
                            auto_picked: result.picked.clone(),
                            timestamp: utils::current_timestamp(),
                        }))
                        .await;
                        self.announce_pick(&state, result, PickSource::Timeout)
                            .await;
                        break;
                    }
                }
            }
        }

        Ok(Step::Continue(state))
    }

    async fn request_pick(&self, state: &CaptainDraftState, slot: CaptainSlot, owed: usize) {
        let captain = state.captain(slot);
        let event = OutboundEvent::PickRequested(PickRequested {
            formation_id: self.id,
            recipient: captain.id.clone(),
            captain_number: slot.number(),
            picks_owed: owed,
            pool: state.pool().to_vec(),
            pool_listing: format_pool(state.pool()),
            timeout_seconds: self.timings.pick_timeout.as_secs(),
            timestamp: utils::current_timestamp(),
        });

        if let Err(e) = self.messenger.publish(event).await {
            warn!(
                "Formation {}: captain {} is unreachable ({}), turn will fall back to auto-pick",
                self.id, captain.id, e
            );
        }
    }

    async fn announce_pick(
        &self,
        state: &CaptainDraftState,
        result: PickResult,
        source: PickSource,
    ) {
        if let Some(metrics) = &self.metrics_collector {
            metrics.record_pick(source);
        }
        self.publish(OutboundEvent::PickMade(PickMade {
            formation_id: self.id,
            channel_id: self.snapshot.channel_id().to_string(),
            captain_id: state.captain(result.slot).id.clone(),
            picked: result.picked,
            source,
            timestamp: utils::current_timestamp(),
        }))
        .await;

        if let Some((slot, player)) = result.last_player {
            if let Some(metrics) = &self.metrics_collector {
                metrics.record_pick(PickSource::LastPlayer);
            }
            self.publish(OutboundEvent::PickMade(PickMade {
                formation_id: self.id,
                channel_id: self.snapshot.channel_id().to_string(),
                captain_id: state.captain(slot).id.clone(),
                picked: player,
                source: PickSource::LastPlayer,
                timestamp: utils::current_timestamp(),
            }))
            .await;
        }
    }

    async fn finalize(
        &mut self,
        teams: TeamAssignment,
        method: TeamMethod,
        captains: Option<(PlayerId, PlayerId)>,
    ) -> Result<FormationOutcome> {
        self.registry
            .set_phase(&self.id, FormationPhase::Finalizing)?;
        if !self.registry.finish(&self.id)? {
            return Ok(self
                .cancelled("cancelled before teams were finalized".to_string())
                .await);
        }

        let record = persist_new_match(
            self.store.as_ref(),
            NewMatch {
                formation_id: self.id,
                channel_id: self.snapshot.channel_id().to_string(),
                teams,
                method,
                captains: captains.clone(),
            },
            self.timings.match_id_attempts,
        )?;

        info!(
            "Formation {} finalized as match {} ({})",
            self.id, record.match_id, method
        );
        self.publish(OutboundEvent::TeamsFinalized(TeamsFinalized {
            formation_id: self.id,
            channel_id: record.channel_id.clone(),
            match_id: record.match_id.clone(),
            method,
            team_a: record.team_a.clone(),
            team_b: record.team_b.clone(),
            captains,
            timestamp: utils::current_timestamp(),
        }))
        .await;

        Ok(FormationOutcome::Finalized(record))
    }

    async fn cancelled(&self, reason: String) -> FormationOutcome {
        info!("Formation {} cancelled: {}", self.id, reason);
        if let Err(e) = self.registry.cancel(&self.id) {
            error!("Failed to release formation {}: {}", self.id, e);
        }
        self.announce_cancelled(&reason).await;
        FormationOutcome::Cancelled { reason }
    }

    async fn announce_cancelled(&self, reason: &str) {
        self.publish(OutboundEvent::FormationCancelled(FormationCancelled {
            formation_id: self.id,
            channel_id: self.snapshot.channel_id().to_string(),
            reason: reason.to_string(),
            timestamp: utils::current_timestamp(),
        }))
        .await;
    }

    /// Messenger failures are logged and never abort the formation
    async fn publish(&self, event: OutboundEvent) {
        let kind = event.kind();
        if let Err(e) = self.messenger.publish(event).await {
            warn!("Formation {}: failed to publish {}: {}", self.id, kind, e);
        }
    }
}
