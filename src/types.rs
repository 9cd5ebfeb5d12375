//! Common types used throughout the six mans service

use crate::error::{Result, SixMansError};
use crate::formation::FormationSummary;
use crate::matches::PlayerStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Discord user id of a player
pub type PlayerId = String;

/// Discord channel id hosting a queue
pub type ChannelId = String;

/// Unique identifier for one team formation (one queue-full event)
pub type FormationId = Uuid;

/// Short identifier players type when reporting a match
pub type MatchId = String;

/// Number of players needed for a match
pub const SNAPSHOT_SIZE: usize = 6;

/// Number of players on each team
pub const TEAM_SIZE: usize = 3;

/// A player waiting in (or drained from) a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPlayer {
    pub id: PlayerId,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

impl QueuedPlayer {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            joined_at: Utc::now(),
        }
    }
}

/// Team-assignment method chosen by the vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamMethod {
    Random,
    Captains,
}

impl std::fmt::Display for TeamMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamMethod::Random => write!(f, "random"),
            TeamMethod::Captains => write!(f, "captains"),
        }
    }
}

/// One of the two teams in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSide {
    A,
    B,
}

impl TeamSide {
    pub fn opponent(self) -> Self {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }
}

/// The frozen set of six players that triggered a team formation.
///
/// There is no mutating API; once captured the snapshot is shared behind an
/// `Arc` by the vote, the assembler and the draft. Deserialized snapshots
/// go through the same validation as captured ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawQueueSnapshot")]
pub struct QueueSnapshot {
    channel_id: ChannelId,
    players: Vec<QueuedPlayer>,
    captured_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawQueueSnapshot {
    channel_id: ChannelId,
    players: Vec<QueuedPlayer>,
    captured_at: DateTime<Utc>,
}

impl TryFrom<RawQueueSnapshot> for QueueSnapshot {
    type Error = anyhow::Error;

    fn try_from(raw: RawQueueSnapshot) -> Result<Self> {
        validate_snapshot_players(&raw.players)?;
        Ok(Self {
            channel_id: raw.channel_id,
            players: raw.players,
            captured_at: raw.captured_at,
        })
    }
}

fn validate_snapshot_players(players: &[QueuedPlayer]) -> Result<()> {
    if players.len() != SNAPSHOT_SIZE {
        return Err(SixMansError::InvalidSnapshot {
            reason: format!("expected {} players, got {}", SNAPSHOT_SIZE, players.len()),
        }
        .into());
    }

    let mut seen = HashSet::new();
    for player in players {
        if !seen.insert(player.id.as_str()) {
            return Err(SixMansError::InvalidSnapshot {
                reason: format!("player {} appears more than once", player.id),
            }
            .into());
        }
    }

    Ok(())
}

impl QueueSnapshot {
    /// Capture a snapshot, validating size and distinctness
    pub fn new(channel_id: impl Into<ChannelId>, players: Vec<QueuedPlayer>) -> Result<Self> {
        validate_snapshot_players(&players)?;

        Ok(Self {
            channel_id: channel_id.into(),
            players,
            captured_at: Utc::now(),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn players(&self) -> &[QueuedPlayer] {
        &self.players
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }
}

/// Two disjoint teams of three covering a snapshot exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTeamAssignment")]
pub struct TeamAssignment {
    team_a: Vec<QueuedPlayer>,
    team_b: Vec<QueuedPlayer>,
}

#[derive(Deserialize)]
struct RawTeamAssignment {
    team_a: Vec<QueuedPlayer>,
    team_b: Vec<QueuedPlayer>,
}

// Without a snapshot to check against, a deserialized assignment must still
// be two disjoint teams of three
impl TryFrom<RawTeamAssignment> for TeamAssignment {
    type Error = anyhow::Error;

    fn try_from(raw: RawTeamAssignment) -> Result<Self> {
        validate_teams(&raw.team_a, &raw.team_b, |_| true)?;
        Ok(Self {
            team_a: raw.team_a,
            team_b: raw.team_b,
        })
    }
}

fn validate_teams<F>(team_a: &[QueuedPlayer], team_b: &[QueuedPlayer], eligible: F) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    if team_a.len() != TEAM_SIZE || team_b.len() != TEAM_SIZE {
        return Err(SixMansError::InvalidTeamAssignment {
            reason: format!(
                "teams must have {} players each, got {} and {}",
                TEAM_SIZE,
                team_a.len(),
                team_b.len()
            ),
        }
        .into());
    }

    let mut seen = HashSet::new();
    for player in team_a.iter().chain(team_b.iter()) {
        if !eligible(&player.id) {
            return Err(SixMansError::InvalidTeamAssignment {
                reason: format!("player {} is not part of the snapshot", player.id),
            }
            .into());
        }
        if !seen.insert(player.id.as_str()) {
            return Err(SixMansError::InvalidTeamAssignment {
                reason: format!("player {} is on both teams", player.id),
            }
            .into());
        }
    }

    Ok(())
}

impl TeamAssignment {
    /// Build an assignment, checking it partitions `snapshot` into 3 + 3
    pub fn new(
        snapshot: &QueueSnapshot,
        team_a: Vec<QueuedPlayer>,
        team_b: Vec<QueuedPlayer>,
    ) -> Result<Self> {
        validate_teams(&team_a, &team_b, |id| snapshot.contains(id))?;
        Ok(Self { team_a, team_b })
    }

    pub fn team_a(&self) -> &[QueuedPlayer] {
        &self.team_a
    }

    pub fn team_b(&self) -> &[QueuedPlayer] {
        &self.team_b
    }

    pub fn team(&self, side: TeamSide) -> &[QueuedPlayer] {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }

    /// Which side a player ended up on
    pub fn side_of(&self, player_id: &str) -> Option<TeamSide> {
        if self.team_a.iter().any(|p| p.id == player_id) {
            Some(TeamSide::A)
        } else if self.team_b.iter().any(|p| p.id == player_id) {
            Some(TeamSide::B)
        } else {
            None
        }
    }
}

/// Result a player reports for their own team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Win,
    Loss,
}

/// MMR movement for one player after a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmrChange {
    pub player_id: PlayerId,
    pub old_mmr: i64,
    pub new_mmr: i64,
}

/// Inbound messages relayed by the Discord gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    QueueJoin {
        channel_id: ChannelId,
        player_id: PlayerId,
        player_name: String,
    },
    QueueLeave {
        channel_id: ChannelId,
        player_id: PlayerId,
    },
    QueueClear {
        channel_id: ChannelId,
        requested_by: PlayerId,
    },
    VoteCast {
        formation_id: FormationId,
        player_id: PlayerId,
        choice: TeamMethod,
    },
    PickReply {
        player_id: PlayerId,
        content: String,
    },
    MatchReport {
        match_id: MatchId,
        player_id: PlayerId,
        outcome: MatchOutcome,
    },
    QueueStatus {
        channel_id: ChannelId,
        player_id: PlayerId,
    },
    /// `/rank`, for the caller or for `target_id`
    RankLookup {
        channel_id: ChannelId,
        player_id: PlayerId,
        #[serde(default)]
        target_id: Option<PlayerId>,
    },
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::QueueJoin { .. } => "queue_join",
            InboundMessage::QueueLeave { .. } => "queue_leave",
            InboundMessage::QueueClear { .. } => "queue_clear",
            InboundMessage::VoteCast { .. } => "vote_cast",
            InboundMessage::PickReply { .. } => "pick_reply",
            InboundMessage::MatchReport { .. } => "match_report",
            InboundMessage::QueueStatus { .. } => "queue_status",
            InboundMessage::RankLookup { .. } => "rank_lookup",
        }
    }

    /// Channel the interaction came from; DM replies have none
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            InboundMessage::QueueJoin { channel_id, .. }
            | InboundMessage::QueueLeave { channel_id, .. }
            | InboundMessage::QueueClear { channel_id, .. }
            | InboundMessage::QueueStatus { channel_id, .. }
            | InboundMessage::RankLookup { channel_id, .. } => Some(channel_id),
            InboundMessage::VoteCast { .. }
            | InboundMessage::PickReply { .. }
            | InboundMessage::MatchReport { .. } => None,
        }
    }

    /// Player who triggered the interaction
    pub fn player_id(&self) -> &str {
        match self {
            InboundMessage::QueueJoin { player_id, .. }
            | InboundMessage::QueueLeave { player_id, .. }
            | InboundMessage::VoteCast { player_id, .. }
            | InboundMessage::PickReply { player_id, .. }
            | InboundMessage::MatchReport { player_id, .. }
            | InboundMessage::QueueStatus { player_id, .. }
            | InboundMessage::RankLookup { player_id, .. } => player_id,
            InboundMessage::QueueClear { requested_by, .. } => requested_by,
        }
    }
}

/// Public vote prompt with the two selectable options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteStarted {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub players: Vec<QueuedPlayer>,
    pub options: Vec<TeamMethod>,
    pub window_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Running vote counts, published after each accepted vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteTally {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub random_votes: usize,
    pub captains_votes: usize,
    pub votes_received: usize,
    pub votes_needed: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResolved {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub method: TeamMethod,
    pub random_votes: usize,
    pub captains_votes: usize,
    pub timed_out: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptainsSelected {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub captain_one: QueuedPlayer,
    pub captain_two: QueuedPlayer,
    pub pool: Vec<QueuedPlayer>,
    pub timestamp: DateTime<Utc>,
}

/// Private prompt asking a captain for their pick(s)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRequested {
    pub formation_id: FormationId,
    pub recipient: PlayerId,
    pub captain_number: u8,
    pub picks_owed: usize,
    pub pool: Vec<QueuedPlayer>,
    /// Numbered listing the reply's list numbers refer to
    pub pool_listing: String,
    pub timeout_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Private notice that a reply did not name valid pool members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRejected {
    pub formation_id: FormationId,
    pub recipient: PlayerId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// How a drafted player was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSource {
    Captain,
    Timeout,
    LastPlayer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickMade {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub captain_id: PlayerId,
    pub picked: QueuedPlayer,
    pub source: PickSource,
    pub timestamp: DateTime<Utc>,
}

/// Private notice to a captain whose pick window lapsed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickTimedOut {
    pub formation_id: FormationId,
    pub recipient: PlayerId,
    pub auto_picked: QueuedPlayer,
    pub timestamp: DateTime<Utc>,
}

/// Public announcement of both rosters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamsFinalized {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub match_id: MatchId,
    pub method: TeamMethod,
    pub team_a: Vec<QueuedPlayer>,
    pub team_b: Vec<QueuedPlayer>,
    pub captains: Option<(PlayerId, PlayerId)>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormationCancelled {
    pub formation_id: FormationId,
    pub channel_id: ChannelId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueUpdated {
    pub channel_id: ChannelId,
    pub players: Vec<QueuedPlayer>,
    pub capacity: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReported {
    pub match_id: MatchId,
    pub channel_id: ChannelId,
    pub winner: TeamSide,
    pub reported_by: PlayerId,
    pub mmr_changes: Vec<MmrChange>,
    pub timestamp: DateTime<Utc>,
}

/// Reply to a queue status request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub channel_id: ChannelId,
    pub requested_by: PlayerId,
    pub players: Vec<QueuedPlayer>,
    pub capacity: usize,
    pub active_formations: Vec<FormationSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Reply to a rank lookup. `stats` is empty for players with no reported
/// matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRank {
    pub channel_id: ChannelId,
    pub requested_by: PlayerId,
    pub player_id: PlayerId,
    pub stats: Option<PlayerStats>,
    pub rank: Option<usize>,
    pub ranked_players: usize,
    pub timestamp: DateTime<Utc>,
}

/// Private notice explaining why a command had no effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRejected {
    pub recipient: PlayerId,
    pub channel_id: Option<ChannelId>,
    pub kind: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    VoteStarted(VoteStarted),
    VoteTally(VoteTally),
    VoteResolved(VoteResolved),
    CaptainsSelected(CaptainsSelected),
    PickRequested(PickRequested),
    PickRejected(PickRejected),
    PickMade(PickMade),
    PickTimedOut(PickTimedOut),
    TeamsFinalized(TeamsFinalized),
    FormationCancelled(FormationCancelled),
    QueueUpdated(QueueUpdated),
    MatchReported(MatchReported),
    QueueStatus(QueueStatus),
    PlayerRank(PlayerRank),
    CommandRejected(CommandRejected),
}

impl OutboundEvent {
    /// Variant name, used for logging and test assertions
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::VoteStarted(_) => "VoteStarted",
            OutboundEvent::VoteTally(_) => "VoteTally",
            OutboundEvent::VoteResolved(_) => "VoteResolved",
            OutboundEvent::CaptainsSelected(_) => "CaptainsSelected",
            OutboundEvent::PickRequested(_) => "PickRequested",
            OutboundEvent::PickRejected(_) => "PickRejected",
            OutboundEvent::PickMade(_) => "PickMade",
            OutboundEvent::PickTimedOut(_) => "PickTimedOut",
            OutboundEvent::TeamsFinalized(_) => "TeamsFinalized",
            OutboundEvent::FormationCancelled(_) => "FormationCancelled",
            OutboundEvent::QueueUpdated(_) => "QueueUpdated",
            OutboundEvent::MatchReported(_) => "MatchReported",
            OutboundEvent::QueueStatus(_) => "QueueStatus",
            OutboundEvent::PlayerRank(_) => "PlayerRank",
            OutboundEvent::CommandRejected(_) => "CommandRejected",
        }
    }

    /// Whether the event goes to a single player's DMs rather than a channel
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            OutboundEvent::PickRequested(_)
                | OutboundEvent::PickRejected(_)
                | OutboundEvent::PickTimedOut(_)
                | OutboundEvent::CommandRejected(_)
        )
    }
}
