//! Outbound messaging surface
//!
//! Formation tasks, the queue and the reporter talk to players only through
//! the `Messenger` trait. Production wires in the AMQP publisher; tests use
//! `RecordingMessenger`.

use crate::error::{Result, SixMansError};
use crate::types::{OutboundEvent, PlayerId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Trait for delivering outbound events to Discord
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Publish one event. Private events fail if the recipient cannot be
    /// reached.
    async fn publish(&self, event: OutboundEvent) -> Result<()>;
}

/// Recipient of a private event
pub fn recipient(event: &OutboundEvent) -> Option<&PlayerId> {
    match event {
        OutboundEvent::PickRequested(e) => Some(&e.recipient),
        OutboundEvent::PickRejected(e) => Some(&e.recipient),
        OutboundEvent::PickTimedOut(e) => Some(&e.recipient),
        OutboundEvent::CommandRejected(e) => Some(&e.recipient),
        _ => None,
    }
}

/// Messenger that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    events: Mutex<Vec<OutboundEvent>>,
    unreachable: Mutex<HashSet<PlayerId>>,
    notify: Notify,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make private deliveries to `player_id` fail, like closed DMs
    pub fn set_unreachable(&self, player_id: &str) {
        if let Ok(mut unreachable) = self.unreachable.lock() {
            unreachable.insert(player_id.to_string());
        }
    }

    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Event kinds in publish order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.kind()).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.kind() == kind).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// Wait until at least `count` events of `kind` have been published
    pub async fn wait_for(&self, kind: &str, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.count(kind) >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn publish(&self, event: OutboundEvent) -> Result<()> {
        if let Some(to) = recipient(&event) {
            let blocked = self
                .unreachable
                .lock()
                .map(|set| set.contains(to))
                .unwrap_or(false);
            if blocked {
                return Err(SixMansError::InternalError {
                    message: format!("cannot deliver private message to {}", to),
                }
                .into());
            }
        }

        self.events
            .lock()
            .map_err(|_| SixMansError::InternalError {
                message: "Failed to acquire recorded events lock".to_string(),
            })?
            .push(event);
        self.notify.notify_waiters();
        Ok(())
    }
}
