//! Parsing of captain pick replies
//!
//! A reply names pool members by list number (as shown in the prompt),
//! Discord id, mention or display name. Several names may be given when the
//! captain owes several picks, separated by spaces or commas.

use crate::types::{PlayerId, QueuedPlayer};
use crate::utils::parse_mention;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickReplyError {
    #[error("Reply did not name anyone")]
    Empty,

    #[error("'{token}' is not an available player")]
    UnknownPlayer { token: String },

    #[error("You owe {owed} pick(s) but named {given}")]
    TooManyPicks { given: usize, owed: usize },

    #[error("{name} was named more than once")]
    Duplicate { name: String },
}

/// Resolve a reply against the pool shown in the prompt.
///
/// Any invalid token rejects the whole reply.
pub fn parse_pick_reply(
    content: &str,
    pool: &[QueuedPlayer],
    owed: usize,
) -> Result<Vec<PlayerId>, PickReplyError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(PickReplyError::Empty);
    }

    // Display names may contain spaces
    if let Some(player) = find_by_name(content, pool) {
        return Ok(vec![player.id.clone()]);
    }

    let tokens: Vec<&str> = content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(PickReplyError::Empty);
    }
    if tokens.len() > owed {
        return Err(PickReplyError::TooManyPicks {
            given: tokens.len(),
            owed,
        });
    }

    let mut picks: Vec<PlayerId> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let player = resolve_token(token, pool).ok_or_else(|| PickReplyError::UnknownPlayer {
            token: token.to_string(),
        })?;
        if picks.contains(&player.id) {
            return Err(PickReplyError::Duplicate {
                name: player.name.clone(),
            });
        }
        picks.push(player.id.clone());
    }

    Ok(picks)
}

fn resolve_token<'a>(token: &str, pool: &'a [QueuedPlayer]) -> Option<&'a QueuedPlayer> {
    if let Some(player) = pool.iter().find(|p| p.id == token) {
        return Some(player);
    }
    if let Ok(number) = token.parse::<usize>() {
        if (1..=pool.len()).contains(&number) {
            return pool.get(number - 1);
        }
    }
    if let Some(id) = parse_mention(token) {
        return pool.iter().find(|p| p.id == id);
    }
    find_by_name(token, pool)
}

fn find_by_name<'a>(name: &str, pool: &'a [QueuedPlayer]) -> Option<&'a QueuedPlayer> {
    pool.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Numbered pool listing used in pick prompts
pub fn format_pool(pool: &[QueuedPlayer]) -> String {
    pool.iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.name))
        .collect::<Vec<_>>()
        .join("\n")
}
