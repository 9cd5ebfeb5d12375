//! AMQP message definitions and serialization

use crate::error::{Result, SixMansError};
use crate::types::*;

/// Queue the Discord gateway publishes interactions to
pub const INBOUND_QUEUE: &str = "sixmans.inbound";

/// Topic exchange for everything the gateway should render
pub const EVENTS_EXCHANGE: &str = "sixmans.events";

/// Routing key prefix for events shown in a channel
pub const CHANNEL_ROUTING_PREFIX: &str = "channel";

/// Routing key prefix for events sent as direct messages
pub const DIRECT_ROUTING_PREFIX: &str = "direct";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            SixMansError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            SixMansError::InvalidMessage {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize and validate an inbound gateway message
    pub fn deserialize_inbound(bytes: &[u8]) -> Result<InboundMessage> {
        let message: InboundMessage =
            serde_json::from_slice(bytes).map_err(|e| SixMansError::InvalidMessage {
                reason: format!("Failed to deserialize inbound message: {}", e),
            })?;

        Self::validate_inbound(&message)?;
        Ok(message)
    }

    /// Reject messages with empty identifiers
    pub fn validate_inbound(message: &InboundMessage) -> Result<()> {
        if let InboundMessage::MatchReport { match_id, .. } = message {
            if match_id.trim().is_empty() {
                return Err(SixMansError::InvalidMessage {
                    reason: "Match ID cannot be empty".to_string(),
                }
                .into());
            }
        }
        let player_id = message.player_id();
        let channel_id = message.channel_id();

        if player_id.is_empty() {
            return Err(SixMansError::InvalidMessage {
                reason: "Player ID cannot be empty".to_string(),
            }
            .into());
        }
        if channel_id.is_some_and(|c| c.is_empty()) {
            return Err(SixMansError::InvalidMessage {
                reason: "Channel ID cannot be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Routing key for an outbound event, e.g. `channel.vote_started` or
    /// `direct.pick_requested`
    pub fn get_routing_key(event: &OutboundEvent) -> String {
        let prefix = if event.is_private() {
            DIRECT_ROUTING_PREFIX
        } else {
            CHANNEL_ROUTING_PREFIX
        };
        format!("{}.{}", prefix, to_snake_case(event.kind()))
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_deserialize_inbound() {
        let bytes = br#"{"type":"QueueJoin","channel_id":"42","player_id":"7","player_name":"Seven"}"#;
        match MessageUtils::deserialize_inbound(bytes).unwrap() {
            InboundMessage::QueueJoin { player_name, .. } => assert_eq!(player_name, "Seven"),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_rank_lookup_target_is_optional() {
        let bytes = br#"{"type":"RankLookup","channel_id":"42","player_id":"7"}"#;
        match MessageUtils::deserialize_inbound(bytes).unwrap() {
            InboundMessage::RankLookup { target_id, .. } => assert_eq!(target_id, None),
            other => panic!("unexpected message {:?}", other),
        }

        let bytes =
            br#"{"type":"RankLookup","channel_id":"42","player_id":"7","target_id":"8"}"#;
        match MessageUtils::deserialize_inbound(bytes).unwrap() {
            InboundMessage::RankLookup { target_id, .. } => {
                assert_eq!(target_id.as_deref(), Some("8"))
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_ids() {
        let bytes = br#"{"type":"QueueLeave","channel_id":"","player_id":"7"}"#;
        assert!(MessageUtils::deserialize_inbound(bytes).is_err());

        let bytes = br#"{"type":"PickReply","player_id":"","content":"1"}"#;
        assert!(MessageUtils::deserialize_inbound(bytes).is_err());

        let bytes = br#"{"type":"QueueStatus","channel_id":"","player_id":"7"}"#;
        assert!(MessageUtils::deserialize_inbound(bytes).is_err());

        assert!(MessageUtils::deserialize_inbound(b"not json").is_err());
    }

    #[test]
    fn test_routing_keys() {
        let public = OutboundEvent::TeamsFinalized(TeamsFinalized {
            formation_id: Uuid::new_v4(),
            channel_id: "42".to_string(),
            match_id: "abc123".to_string(),
            method: TeamMethod::Random,
            team_a: vec![],
            team_b: vec![],
            captains: None,
            timestamp: Utc::now(),
        });
        assert_eq!(
            MessageUtils::get_routing_key(&public),
            "channel.teams_finalized"
        );

        let private = OutboundEvent::PickTimedOut(PickTimedOut {
            formation_id: Uuid::new_v4(),
            recipient: "7".to_string(),
            auto_picked: QueuedPlayer::new("8", "Eight"),
            timestamp: Utc::now(),
        });
        assert_eq!(
            MessageUtils::get_routing_key(&private),
            "direct.pick_timed_out"
        );

        let rejected = OutboundEvent::CommandRejected(CommandRejected {
            recipient: "7".to_string(),
            channel_id: Some("42".to_string()),
            kind: "queue_join".to_string(),
            reason: "already queued".to_string(),
            timestamp: Utc::now(),
        });
        assert_eq!(
            MessageUtils::get_routing_key(&rejected),
            "direct.command_rejected"
        );
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = MessageEnvelope::new(
            InboundMessage::PickReply {
                player_id: "7".to_string(),
                content: "1 3".to_string(),
            },
            "direct.pick_reply".to_string(),
        );
        let decoded: MessageEnvelope<InboundMessage> =
            MessageEnvelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.correlation_id, envelope.correlation_id);
    }
}
