//! Turn-based captain draft state

use crate::error::{Result, SixMansError};
use crate::types::{QueueSnapshot, QueuedPlayer, TeamAssignment, TEAM_SIZE};
use std::collections::HashSet;

/// Players left to draft once both captains are chosen
pub const POOL_SIZE: usize = 4;

/// Which captain is on the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptainSlot {
    One,
    Two,
}

impl CaptainSlot {
    pub fn number(self) -> u8 {
        match self {
            CaptainSlot::One => 1,
            CaptainSlot::Two => 2,
        }
    }
}

/// Captain one picks once, then captain two twice. The remaining player
/// goes to captain one.
pub const PICK_ORDER: [CaptainSlot; 3] = [CaptainSlot::One, CaptainSlot::Two, CaptainSlot::Two];

/// What a single pick did to the draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickResult {
    pub slot: CaptainSlot,
    pub picked: QueuedPlayer,
    /// Filled when the pick left one player, who is placed automatically
    pub last_player: Option<(CaptainSlot, QueuedPlayer)>,
}

#[derive(Debug, Clone)]
pub struct CaptainDraftState {
    captain_one: QueuedPlayer,
    captain_two: QueuedPlayer,
    pool: Vec<QueuedPlayer>,
    team_one: Vec<QueuedPlayer>,
    team_two: Vec<QueuedPlayer>,
    turn: usize,
}

impl CaptainDraftState {
    pub fn new(
        captain_one: QueuedPlayer,
        captain_two: QueuedPlayer,
        pool: Vec<QueuedPlayer>,
    ) -> Result<Self> {
        if pool.len() != POOL_SIZE {
            return Err(SixMansError::InvalidTeamAssignment {
                reason: format!("draft pool must hold {} players, got {}", POOL_SIZE, pool.len()),
            }
            .into());
        }

        let mut seen = HashSet::new();
        for player in std::iter::once(&captain_one)
            .chain(std::iter::once(&captain_two))
            .chain(pool.iter())
        {
            if !seen.insert(player.id.as_str()) {
                return Err(SixMansError::InvalidTeamAssignment {
                    reason: format!("player {} appears twice in the draft", player.id),
                }
                .into());
            }
        }

        Ok(Self {
            team_one: vec![captain_one.clone()],
            team_two: vec![captain_two.clone()],
            captain_one,
            captain_two,
            pool,
            turn: 0,
        })
    }

    pub fn captain(&self, slot: CaptainSlot) -> &QueuedPlayer {
        match slot {
            CaptainSlot::One => &self.captain_one,
            CaptainSlot::Two => &self.captain_two,
        }
    }

    pub fn pool(&self) -> &[QueuedPlayer] {
        &self.pool
    }

    pub fn team(&self, slot: CaptainSlot) -> &[QueuedPlayer] {
        match slot {
            CaptainSlot::One => &self.team_one,
            CaptainSlot::Two => &self.team_two,
        }
    }

    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn is_complete(&self) -> bool {
        self.pool.is_empty()
    }

    /// The captain whose turn it is, if the draft is still running
    pub fn current_slot(&self) -> Option<CaptainSlot> {
        if self.is_complete() {
            return None;
        }
        PICK_ORDER.get(self.turn).copied()
    }

    pub fn current_captain(&self) -> Option<&QueuedPlayer> {
        self.current_slot().map(|slot| self.captain(slot))
    }

    pub fn is_active_captain(&self, player_id: &str) -> bool {
        self.current_captain().is_some_and(|c| c.id == player_id)
    }

    /// Consecutive picks the current captain owes, starting at this turn
    pub fn picks_owed(&self) -> usize {
        match self.current_slot() {
            Some(slot) => PICK_ORDER[self.turn..]
                .iter()
                .take_while(|s| **s == slot)
                .count()
                .min(self.pool.len()),
            None => 0,
        }
    }

    /// Move `player_id` from the pool onto the current captain's team
    pub fn pick(&mut self, player_id: &str) -> Result<PickResult> {
        let slot = self
            .current_slot()
            .ok_or_else(|| SixMansError::InternalError {
                message: "draft is already complete".to_string(),
            })?;

        let index = self
            .pool
            .iter()
            .position(|p| p.id == player_id)
            .ok_or_else(|| SixMansError::InvalidTeamAssignment {
                reason: format!("player {} is not in the draft pool", player_id),
            })?;

        let picked = self.pool.remove(index);
        self.team_mut(slot).push(picked.clone());
        self.turn += 1;

        let last_player = if self.pool.len() == 1 {
            let last = self.pool.remove(0);
            let slot = if self.team_one.len() < TEAM_SIZE {
                CaptainSlot::One
            } else {
                CaptainSlot::Two
            };
            self.team_mut(slot).push(last.clone());
            Some((slot, last))
        } else {
            None
        };

        Ok(PickResult {
            slot,
            picked,
            last_player,
        })
    }

    /// Timeout fallback: take the first remaining pool member
    pub fn auto_pick(&mut self) -> Result<PickResult> {
        let first = self
            .pool
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| SixMansError::InternalError {
                message: "draft pool is empty".to_string(),
            })?;
        self.pick(&first)
    }

    /// Captain one's team becomes team A
    pub fn into_assignment(self, snapshot: &QueueSnapshot) -> Result<TeamAssignment> {
        if !self.is_complete() {
            return Err(SixMansError::InvalidTeamAssignment {
                reason: format!("{} players are still undrafted", self.pool.len()),
            }
            .into());
        }
        TeamAssignment::new(snapshot, self.team_one, self.team_two)
    }

    fn team_mut(&mut self, slot: CaptainSlot) -> &mut Vec<QueuedPlayer> {
        match slot {
            CaptainSlot::One => &mut self.team_one,
            CaptainSlot::Two => &mut self.team_two,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<QueuedPlayer> {
        ["c1", "c2", "p1", "p2", "p3", "p4"]
            .iter()
            .map(|id| QueuedPlayer::new(*id, id.to_uppercase()))
            .collect()
    }

    fn draft() -> (QueueSnapshot, CaptainDraftState) {
        let list = players();
        let snapshot = QueueSnapshot::new("chan", list.clone()).unwrap();
        let state =
            CaptainDraftState::new(list[0].clone(), list[1].clone(), list[2..].to_vec()).unwrap();
        (snapshot, state)
    }

    fn ids(players: &[QueuedPlayer]) -> Vec<&str> {
        players.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_pick_order_and_last_player() {
        let (snapshot, mut state) = draft();

        assert_eq!(state.current_slot(), Some(CaptainSlot::One));
        assert_eq!(state.picks_owed(), 1);
        let first = state.pick("p1").unwrap();
        assert_eq!(first.slot, CaptainSlot::One);
        assert!(first.last_player.is_none());

        assert_eq!(state.current_slot(), Some(CaptainSlot::Two));
        assert_eq!(state.picks_owed(), 2);
        state.pick("p2").unwrap();
        assert_eq!(state.picks_owed(), 1);
        let third = state.pick("p3").unwrap();

        let (slot, last) = third.last_player.unwrap();
        assert_eq!(slot, CaptainSlot::One);
        assert_eq!(last.id, "p4");
        assert!(state.is_complete());
        assert_eq!(state.current_slot(), None);

        assert_eq!(ids(state.team(CaptainSlot::One)), vec!["c1", "p1", "p4"]);
        assert_eq!(ids(state.team(CaptainSlot::Two)), vec!["c2", "p2", "p3"]);

        let teams = state.into_assignment(&snapshot).unwrap();
        assert_eq!(teams.team_a().len(), 3);
        assert_eq!(teams.team_b().len(), 3);
    }

    #[test]
    fn test_pick_outside_pool_rejected() {
        let (_, mut state) = draft();
        assert!(state.pick("c2").is_err());
        assert!(state.pick("nobody").is_err());
        assert_eq!(state.turn(), 0);
        assert_eq!(state.pool().len(), 4);
    }

    #[test]
    fn test_auto_pick_takes_first_remaining() {
        let (_, mut state) = draft();
        state.pick("p2").unwrap();
        let result = state.auto_pick().unwrap();
        assert_eq!(result.picked.id, "p1");
        assert_eq!(result.slot, CaptainSlot::Two);
    }

    #[test]
    fn test_incomplete_draft_cannot_finalize() {
        let (snapshot, mut state) = draft();
        state.pick("p1").unwrap();
        assert!(state.into_assignment(&snapshot).is_err());
    }

    #[test]
    fn test_invalid_pool_rejected() {
        let list = players();
        assert!(
            CaptainDraftState::new(list[0].clone(), list[1].clone(), list[2..5].to_vec()).is_err()
        );
        assert!(CaptainDraftState::new(
            list[0].clone(),
            list[0].clone(),
            list[2..].to_vec()
        )
        .is_err());
    }

    #[test]
    fn test_active_captain() {
        let (_, mut state) = draft();
        assert!(state.is_active_captain("c1"));
        assert!(!state.is_active_captain("c2"));
        state.pick("p1").unwrap();
        assert!(state.is_active_captain("c2"));
        assert!(!state.is_active_captain("p2"));
    }
}
