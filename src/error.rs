//! Error types for the six mans service
//!
//! Domain failures are expressed as `SixMansError` variants and propagated
//! through the crate-wide anyhow `Result` alias.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific queue, formation and match scenarios
#[derive(Debug, thiserror::Error)]
pub enum SixMansError {
    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Invalid inbound message: {reason}")]
    InvalidMessage { reason: String },

    #[error("No queue exists for channel {channel_id}")]
    QueueNotFound { channel_id: String },

    #[error("Player {player_id} is already queued in channel {channel_id}")]
    AlreadyQueued {
        player_id: String,
        channel_id: String,
    },

    #[error("Player {player_id} is locked in an active team selection")]
    PlayerLocked { player_id: String },

    #[error("Player {player_id} is not in the queue for channel {channel_id}")]
    NotInQueue {
        player_id: String,
        channel_id: String,
    },

    #[error("Invalid queue snapshot: {reason}")]
    InvalidSnapshot { reason: String },

    #[error("Invalid team assignment: {reason}")]
    InvalidTeamAssignment { reason: String },

    #[error("Formation not found: {formation_id}")]
    FormationNotFound { formation_id: String },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Match {match_id} has already been reported")]
    MatchAlreadyReported { match_id: String },

    #[error("Player {player_id} did not play in match {match_id}")]
    NotAParticipant { player_id: String, match_id: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
