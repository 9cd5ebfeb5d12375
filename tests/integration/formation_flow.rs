//! Vote and draft flows driven through the coordinator on a paused clock

use crate::fixtures::{ids, snapshot, TestSystem};
use futures::future::join_all;
use six_mans::formation::FormationOutcome;
use six_mans::types::*;
use std::time::Duration;
use tokio::time::Instant;

use six_mans::types::TeamMethod::{Captains as C, Random as R};

fn sorted(mut ids: Vec<PlayerId>) -> Vec<PlayerId> {
    ids.sort();
    ids
}

fn vote_resolved(system: &TestSystem) -> VoteResolved {
    system
        .messenger
        .events()
        .into_iter()
        .find_map(|event| match event {
            OutboundEvent::VoteResolved(e) => Some(e),
            _ => None,
        })
        .expect("vote resolved")
}

#[tokio::test(start_paused = true)]
async fn test_tied_vote_resolves_to_random() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    system.vote_all(formation_id, &[R, C, R, C, R, C]).await;

    let record = match task.await.unwrap() {
        FormationOutcome::Finalized(record) => record,
        other => panic!("expected finalized formation, got {:?}", other),
    };

    assert_eq!(record.method, TeamMethod::Random);
    assert_eq!(record.team_a.len(), TEAM_SIZE);
    assert_eq!(record.team_b.len(), TEAM_SIZE);
    assert!(record.captains.is_none());

    let resolved = vote_resolved(&system);
    assert_eq!(resolved.method, TeamMethod::Random);
    assert_eq!((resolved.random_votes, resolved.captains_votes), (3, 3));
    assert!(!resolved.timed_out);

    assert_eq!(system.messenger.count("CaptainsSelected"), 0);
    assert_eq!(system.messenger.count("TeamsFinalized"), 1);
    assert_eq!(system.match_count(), 1);
    assert!(!system.coordinator.is_locked("u1").unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_captains_majority_decides_on_sixth_vote() {
    let system = TestSystem::new();
    let started = Instant::now();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    system.vote_all(formation_id, &[C, C, R, C, R, C]).await;
    system.messenger.wait_for("VoteResolved", 1).await;

    // Decided before the window closed
    assert!(started.elapsed() < Duration::from_secs(60));

    // Late vote changes are ignored once the method is decided
    system
        .coordinator
        .cast_vote(formation_id, "u1", R)
        .await
        .unwrap();

    let outcome = task.await.unwrap();
    let resolved = vote_resolved(&system);
    assert_eq!(resolved.method, TeamMethod::Captains);
    assert_eq!((resolved.random_votes, resolved.captains_votes), (2, 4));
    assert_eq!(system.messenger.count("VoteTally"), 6);
    assert_eq!(system.messenger.count("VoteResolved"), 1);

    match outcome {
        FormationOutcome::Finalized(record) => assert_eq!(record.method, TeamMethod::Captains),
        other => panic!("expected finalized formation, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_vote_window_expiry_uses_counted_votes() {
    let system = TestSystem::new();
    let started = Instant::now();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    system.vote_all(formation_id, &[R]).await;

    let outcome = task.await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(60));

    let resolved = vote_resolved(&system);
    assert!(resolved.timed_out);
    assert_eq!(resolved.method, TeamMethod::Random);
    assert!(matches!(outcome, FormationOutcome::Finalized(_)));
}

#[tokio::test(start_paused = true)]
async fn test_vote_window_expiry_without_votes_is_random() {
    let system = TestSystem::new();
    let (_formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    assert!(matches!(task.await.unwrap(), FormationOutcome::Finalized(_)));

    let resolved = vote_resolved(&system);
    assert!(resolved.timed_out);
    assert_eq!(resolved.method, TeamMethod::Random);
    assert_eq!((resolved.random_votes, resolved.captains_votes), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_captain_draft_alternates_one_two_two() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();
    system.vote_all(formation_id, &[C; 6]).await;

    system.messenger.wait_for("PickRequested", 1).await;
    let selected = system.captains_selected();
    let (c1, c2, pool) = (
        selected.captain_one.clone(),
        selected.captain_two.clone(),
        selected.pool.clone(),
    );

    let first_request = &system.pick_requests()[0];
    assert_eq!(first_request.recipient, c1.id);
    assert_eq!(first_request.picks_owed, 1);
    let first_line = format!("1. {}", pool[0].name);
    assert!(first_request.pool_listing.starts_with(&first_line));
    assert_eq!(first_request.pool_listing.lines().count(), pool.len());

    // C1 takes the first listed player
    assert!(system
        .coordinator
        .submit_pick_reply(&c1.id, "1")
        .await
        .unwrap());

    system.messenger.wait_for("PickRequested", 2).await;
    let second_request = &system.pick_requests()[1];
    assert_eq!(second_request.recipient, c2.id);
    assert_eq!(second_request.picks_owed, 2);
    assert_eq!(ids(&second_request.pool), ids(&pool[1..]));
    assert!(second_request
        .pool_listing
        .starts_with(&format!("1. {}", pool[1].name)));

    // C2 takes both of their picks in one reply
    system
        .coordinator
        .submit_pick_reply(&c2.id, "1 2")
        .await
        .unwrap();

    let record = match task.await.unwrap() {
        FormationOutcome::Finalized(record) => record,
        other => panic!("expected finalized formation, got {:?}", other),
    };

    assert_eq!(
        sorted(ids(&record.team_a)),
        sorted(vec![c1.id.clone(), pool[0].id.clone(), pool[3].id.clone()])
    );
    assert_eq!(
        sorted(ids(&record.team_b)),
        sorted(vec![c2.id.clone(), pool[1].id.clone(), pool[2].id.clone()])
    );
    assert_eq!(record.captains, Some((c1.id.clone(), c2.id.clone())));

    let sources: Vec<PickSource> = system.picks().iter().map(|p| p.source).collect();
    assert_eq!(
        sources,
        vec![
            PickSource::Captain,
            PickSource::Captain,
            PickSource::Captain,
            PickSource::LastPlayer
        ]
    );
    assert_eq!(system.messenger.count("PickTimedOut"), 0);

    let finalized = system.teams_finalized().unwrap();
    assert_eq!(finalized.match_id, record.match_id);
    assert_eq!(finalized.method, TeamMethod::Captains);
}

#[tokio::test(start_paused = true)]
async fn test_turn_timeout_auto_picks_first_remaining() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();
    system.vote_all(formation_id, &[C; 6]).await;

    system.messenger.wait_for("CaptainsSelected", 1).await;
    let draft_started = Instant::now();
    let selected = system.captains_selected();

    let record = match task.await.unwrap() {
        FormationOutcome::Finalized(record) => record,
        other => panic!("expected finalized formation, got {:?}", other),
    };

    // One turn for captain one, two for captain two
    assert_eq!(system.messenger.count("PickTimedOut"), 3);
    assert!(draft_started.elapsed() >= Duration::from_secs(90));

    let picks = system.picks();
    assert_eq!(picks[0].captain_id, selected.captain_one.id);
    assert_eq!(picks[0].picked.id, selected.pool[0].id);
    assert_eq!(picks[0].source, PickSource::Timeout);
    assert_eq!(picks[1].picked.id, selected.pool[1].id);
    assert_eq!(picks[2].picked.id, selected.pool[2].id);
    assert_eq!(picks[3].source, PickSource::LastPlayer);

    assert_eq!(record.team_a.len(), TEAM_SIZE);
    assert_eq!(record.team_b.len(), TEAM_SIZE);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_reply_is_rejected_without_extending_turn() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();
    system.vote_all(formation_id, &[C; 6]).await;

    system.messenger.wait_for("PickRequested", 1).await;
    let turn_started = Instant::now();
    let c1 = system.captains_selected().captain_one;

    system
        .coordinator
        .submit_pick_reply(&c1.id, "nobody")
        .await
        .unwrap();
    system.messenger.wait_for("PickRejected", 1).await;

    // Re-prompted with the same pool
    assert_eq!(system.pick_requests().len(), 2);

    tokio::time::sleep(Duration::from_secs(20)).await;
    system
        .coordinator
        .submit_pick_reply(&c1.id, "1 2")
        .await
        .unwrap();
    system.messenger.wait_for("PickRejected", 2).await;

    system.messenger.wait_for("PickTimedOut", 1).await;
    let waited = turn_started.elapsed();
    assert!(waited >= Duration::from_secs(30));
    assert!(waited < Duration::from_secs(31));

    assert!(matches!(
        task.await.unwrap(),
        FormationOutcome::Finalized(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reply_from_waiting_captain_is_ignored() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();
    system.vote_all(formation_id, &[C; 6]).await;

    system.messenger.wait_for("PickRequested", 1).await;
    let selected = system.captains_selected();

    system
        .coordinator
        .submit_pick_reply(&selected.captain_two.id, "1")
        .await
        .unwrap();
    system
        .coordinator
        .submit_pick_reply(&selected.captain_one.id, "2")
        .await
        .unwrap();

    system.messenger.wait_for("PickRequested", 2).await;
    let first_pick = &system.picks()[0];
    assert_eq!(first_pick.captain_id, selected.captain_one.id);
    assert_eq!(first_pick.picked.id, selected.pool[1].id);
    assert_eq!(system.messenger.count("PickRejected"), 0);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_captains_fall_back_to_timeout() {
    let system = TestSystem::new();
    for id in snapshot().player_ids() {
        system.messenger.set_unreachable(&id);
    }

    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();
    system.vote_all(formation_id, &[C; 6]).await;

    let record = match task.await.unwrap() {
        FormationOutcome::Finalized(record) => record,
        other => panic!("expected finalized formation, got {:?}", other),
    };

    assert_eq!(system.pick_requests().len(), 0);
    let sources: Vec<PickSource> = system.picks().iter().map(|p| p.source).collect();
    assert_eq!(
        sources,
        vec![
            PickSource::Timeout,
            PickSource::Timeout,
            PickSource::Timeout,
            PickSource::LastPlayer
        ]
    );
    assert_eq!(record.method, TeamMethod::Captains);
    assert_eq!(system.match_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_vote_never_creates_match() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    system.vote_all(formation_id, &[C, C, R]).await;
    system
        .coordinator
        .cancel_formation(formation_id, "queue cleared by admin")
        .unwrap();

    match task.await.unwrap() {
        FormationOutcome::Cancelled { reason } => assert_eq!(reason, "queue cleared by admin"),
        other => panic!("expected cancellation, got {:?}", other),
    }

    assert_eq!(system.messenger.count("TeamsFinalized"), 0);
    assert_eq!(system.messenger.count("VoteResolved"), 0);
    assert_eq!(system.messenger.count("FormationCancelled"), 1);
    assert_eq!(system.match_count(), 0);
    assert!(!system.coordinator.is_locked("u1").unwrap());

    // The formation is gone for later votes
    assert!(!system
        .coordinator
        .cast_vote(formation_id, "u4", C)
        .await
        .unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_draft_never_creates_match() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();
    system.vote_all(formation_id, &[C; 6]).await;
    system.messenger.wait_for("PickRequested", 1).await;

    system
        .coordinator
        .cancel_formation(formation_id, "admin")
        .unwrap();

    assert!(matches!(
        task.await.unwrap(),
        FormationOutcome::Cancelled { .. }
    ));
    assert!(system.teams_finalized().is_none());
    assert_eq!(system.match_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_votes_are_all_counted() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    let votes = (1..=6).map(|i| {
        let coordinator = system.coordinator.clone();
        async move {
            coordinator
                .cast_vote(formation_id, &format!("u{}", i), TeamMethod::Random)
                .await
        }
    });
    let delivered = join_all(votes).await;
    assert!(delivered.into_iter().all(|r| r.unwrap()));

    assert!(matches!(
        task.await.unwrap(),
        FormationOutcome::Finalized(_)
    ));
    let resolved = vote_resolved(&system);
    assert_eq!(resolved.random_votes, 6);
    assert!(!resolved.timed_out);
}

#[tokio::test(start_paused = true)]
async fn test_outsider_votes_do_not_count() {
    let system = TestSystem::new();
    let (formation_id, task) = system.coordinator.start_formation(snapshot()).unwrap();

    system
        .coordinator
        .cast_vote(formation_id, "u99", TeamMethod::Captains)
        .await
        .unwrap();
    system.vote_all(formation_id, &[R; 6]).await;

    assert!(matches!(
        task.await.unwrap(),
        FormationOutcome::Finalized(_)
    ));
    let resolved = vote_resolved(&system);
    assert_eq!(resolved.captains_votes, 0);
    assert_eq!(system.messenger.count("VoteTally"), 6);
}
