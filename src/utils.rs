//! Utility functions for the six mans service

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Length of the match ids players type into `/report`
pub const MATCH_ID_LEN: usize = 6;

/// Generate a new unique formation ID
pub fn generate_formation_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a short match ID (first six hex characters of a UUID)
pub fn generate_match_id() -> String {
    Uuid::new_v4().simple().to_string()[..MATCH_ID_LEN].to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Deadline `window` from now, saturating to one day out instead of
/// overflowing on absurd windows
pub fn deadline_after(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(window)
        .unwrap_or_else(|| now + Duration::from_secs(86_400))
}

/// Strip Discord mention markup (`<@123>` or `<@!123>`) down to the user id
pub fn parse_mention(token: &str) -> Option<&str> {
    let inner = token.strip_prefix("<@")?.strip_suffix('>')?;
    let inner = inner.strip_prefix('!').unwrap_or(inner);
    if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
        Some(inner)
    } else {
        None
    }
}
