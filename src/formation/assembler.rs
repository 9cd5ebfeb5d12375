//! Team assembly from a queue snapshot
//!
//! The assembler does not talk to anyone; it only turns a snapshot plus a
//! random source into teams (random method) or into an opening draft state
//! (captains method). The caller supplies the RNG so tests can seed it.

use crate::draft::CaptainDraftState;
use crate::error::Result;
use crate::types::{QueueSnapshot, QueuedPlayer, TeamAssignment, TEAM_SIZE};
use rand::seq::SliceRandom;
use rand::Rng;

pub struct TeamAssembler;

impl TeamAssembler {
    /// Uniform random split: shuffle, first three to team A, rest to team B
    pub fn random_teams<R: Rng + ?Sized>(
        snapshot: &QueueSnapshot,
        rng: &mut R,
    ) -> Result<TeamAssignment> {
        let mut players: Vec<QueuedPlayer> = snapshot.players().to_vec();
        players.shuffle(rng);
        let team_b = players.split_off(TEAM_SIZE);
        TeamAssignment::new(snapshot, players, team_b)
    }

    /// Pick two distinct captains uniformly; the other four form the pool
    /// in snapshot order
    pub fn select_captains<R: Rng + ?Sized>(
        snapshot: &QueueSnapshot,
        rng: &mut R,
    ) -> Result<CaptainDraftState> {
        let players = snapshot.players();
        let chosen = rand::seq::index::sample(rng, players.len(), 2);
        let first = chosen.index(0);
        let second = chosen.index(1);

        let pool = players
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != first && *i != second)
            .map(|(_, p)| p.clone())
            .collect();

        CaptainDraftState::new(players[first].clone(), players[second].clone(), pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::CaptainSlot;
    use crate::types::TeamSide;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn snapshot_from(ids: &[String]) -> QueueSnapshot {
        let players = ids
            .iter()
            .map(|id| QueuedPlayer::new(id.clone(), format!("name-{}", id)))
            .collect();
        QueueSnapshot::new("chan", players).unwrap()
    }

    fn default_snapshot() -> QueueSnapshot {
        let ids: Vec<String> = (1..=6).map(|i| format!("p{}", i)).collect();
        snapshot_from(&ids)
    }

    proptest! {
        #[test]
        fn random_teams_partition_the_snapshot(
            ids in prop::collection::hash_set("[0-9]{5,18}", 6),
            seed in any::<u64>(),
        ) {
            let ids: Vec<String> = ids.into_iter().collect();
            let snapshot = snapshot_from(&ids);
            let mut rng = StdRng::seed_from_u64(seed);
            let teams = TeamAssembler::random_teams(&snapshot, &mut rng).unwrap();

            prop_assert_eq!(teams.team_a().len(), 3);
            prop_assert_eq!(teams.team_b().len(), 3);

            let union: HashSet<&str> = teams
                .team_a()
                .iter()
                .chain(teams.team_b())
                .map(|p| p.id.as_str())
                .collect();
            let expected: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
            prop_assert_eq!(union, expected);
        }

        #[test]
        fn captains_are_distinct_members(seed in any::<u64>()) {
            let snapshot = default_snapshot();
            let mut rng = StdRng::seed_from_u64(seed);
            let state = TeamAssembler::select_captains(&snapshot, &mut rng).unwrap();

            let one = &state.captain(CaptainSlot::One).id;
            let two = &state.captain(CaptainSlot::Two).id;
            prop_assert_ne!(one, two);
            prop_assert!(snapshot.contains(one));
            prop_assert!(snapshot.contains(two));
            prop_assert_eq!(state.pool().len(), 4);
            prop_assert!(state.pool().iter().all(|p| &p.id != one && &p.id != two));
        }
    }

    #[test]
    fn test_random_split_is_unbiased() {
        let snapshot = default_snapshot();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let trials = 10_000;
        let mut on_team_a = [0usize; 6];

        for _ in 0..trials {
            let teams = TeamAssembler::random_teams(&snapshot, &mut rng).unwrap();
            for (i, player) in snapshot.players().iter().enumerate() {
                if teams.side_of(&player.id) == Some(TeamSide::A) {
                    on_team_a[i] += 1;
                }
            }
        }

        for (i, count) in on_team_a.iter().enumerate() {
            let p = *count as f64 / trials as f64;
            assert!(
                (0.46..=0.54).contains(&p),
                "player {} landed on team A with p = {}",
                i + 1,
                p
            );
        }
    }

    #[test]
    fn test_captain_selection_covers_everyone() {
        let snapshot = default_snapshot();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let state = TeamAssembler::select_captains(&snapshot, &mut rng).unwrap();
            seen.insert(state.captain(CaptainSlot::One).id.clone());
            seen.insert(state.captain(CaptainSlot::Two).id.clone());
        }
        assert_eq!(seen.len(), 6);
    }
}
