//! Queue to match to leaderboard, through the queue manager and reporter

use crate::fixtures::{player, TestSystem, CHANNEL};
use six_mans::error::SixMansError;
use six_mans::queue::JoinOutcome;
use six_mans::types::*;

/// Fill the channel queue and return the formation it started
async fn fill_queue(system: &TestSystem) -> FormationId {
    for n in 1..SNAPSHOT_SIZE {
        match system.queue.join(CHANNEL, player(n)).await.unwrap() {
            JoinOutcome::Queued { position } => assert_eq!(position, n),
            other => panic!("queue filled early: {:?}", other),
        }
    }

    match system
        .queue
        .join(CHANNEL, player(SNAPSHOT_SIZE))
        .await
        .unwrap()
    {
        JoinOutcome::FormationStarted { formation_id } => formation_id,
        other => panic!("sixth join should start a formation: {:?}", other),
    }
}

fn error_of(err: &anyhow::Error) -> &SixMansError {
    err.downcast_ref::<SixMansError>()
        .expect("domain error")
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_to_reported_match() {
    let system = TestSystem::new();
    let formation_id = fill_queue(&system).await;

    // The queue drained into the formation
    assert!(system.queue.status(CHANNEL).unwrap().is_empty());
    assert!(system.coordinator.is_locked("u1").unwrap());

    system.vote_all(formation_id, &[TeamMethod::Random; 6]).await;
    system.messenger.wait_for("TeamsFinalized", 1).await;

    let finalized = system.teams_finalized().unwrap();
    assert_eq!(finalized.channel_id, CHANNEL);
    assert!(!system.coordinator.is_locked("u1").unwrap());

    let reporter_id = finalized.team_a[0].id.clone();
    let reported = system
        .reporter
        .report(
            &finalized.match_id.to_uppercase(),
            &reporter_id,
            MatchOutcome::Win,
        )
        .await
        .unwrap();

    assert_eq!(reported.winner, TeamSide::A);
    assert_eq!(reported.mmr_changes.len(), SNAPSHOT_SIZE);
    for change in &reported.mmr_changes {
        let on_a = finalized.team_a.iter().any(|p| p.id == change.player_id);
        let expected = if on_a { 1015 } else { 988 };
        assert_eq!(change.old_mmr, 1000);
        assert_eq!(change.new_mmr, expected);
    }
    assert_eq!(system.messenger.count("MatchReported"), 1);

    let leaderboard = system.reporter.leaderboard(3).unwrap();
    assert_eq!(leaderboard.len(), 3);
    assert!(leaderboard.iter().all(|p| p.mmr == 1015 && p.wins == 1));
    let mut top_ids: Vec<_> = leaderboard.iter().map(|p| p.id.clone()).collect();
    top_ids.sort();
    let mut team_a_ids: Vec<_> = finalized.team_a.iter().map(|p| p.id.clone()).collect();
    team_a_ids.sort();
    assert_eq!(top_ids, team_a_ids);

    // A match is reported once
    let err = system
        .reporter
        .report(&finalized.match_id, &finalized.team_b[0].id, MatchOutcome::Win)
        .await
        .unwrap_err();
    assert!(matches!(
        error_of(&err),
        SixMansError::MatchAlreadyReported { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_loss_report_credits_other_team() {
    let system = TestSystem::new();
    let formation_id = fill_queue(&system).await;
    system.vote_all(formation_id, &[TeamMethod::Random; 6]).await;
    system.messenger.wait_for("TeamsFinalized", 1).await;
    let finalized = system.teams_finalized().unwrap();

    let reported = system
        .reporter
        .report(
            &finalized.match_id,
            &finalized.team_a[1].id,
            MatchOutcome::Loss,
        )
        .await
        .unwrap();
    assert_eq!(reported.winner, TeamSide::B);

    let outsider = system
        .reporter
        .report(&finalized.match_id, "u99", MatchOutcome::Win)
        .await
        .unwrap_err();
    assert!(matches!(
        error_of(&outsider),
        SixMansError::NotAParticipant { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_locked_players_cannot_requeue() {
    let system = TestSystem::new();
    let _formation_id = fill_queue(&system).await;

    let err = system
        .queue
        .join("other-channel", player(1))
        .await
        .unwrap_err();
    assert!(matches!(error_of(&err), SixMansError::PlayerLocked { .. }));

    let err = system.queue.leave(CHANNEL, "u2").await.unwrap_err();
    assert!(matches!(error_of(&err), SixMansError::PlayerLocked { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_player_waits_in_one_queue_only() {
    let system = TestSystem::new();
    system.queue.join(CHANNEL, player(1)).await.unwrap();

    let err = system
        .queue
        .join("other-channel", player(1))
        .await
        .unwrap_err();
    assert!(matches!(error_of(&err), SixMansError::AlreadyQueued { .. }));

    system.queue.leave(CHANNEL, "u1").await.unwrap();
    system.queue.join("other-channel", player(1)).await.unwrap();
    assert_eq!(
        system.queue.queued_channel("u1").unwrap().as_deref(),
        Some("other-channel")
    );
}

#[tokio::test(start_paused = true)]
async fn test_admin_clear_cancels_draft() {
    let system = TestSystem::new();
    let formation_id = fill_queue(&system).await;
    system.vote_all(formation_id, &[TeamMethod::Captains; 6]).await;
    system.messenger.wait_for("PickRequested", 1).await;

    // Someone else starts waiting in the same channel
    system.queue.join(CHANNEL, player(7)).await.unwrap();

    let cleared = system.queue.clear(CHANNEL, "admin").await.unwrap();
    assert_eq!(cleared.players_removed, 1);
    assert_eq!(cleared.formations_cancelled, 1);

    system.messenger.wait_for("FormationCancelled", 1).await;
    assert!(system.teams_finalized().is_none());
    assert_eq!(system.match_count(), 0);
    assert!(!system.coordinator.is_locked("u1").unwrap());
    assert!(system.queue.status(CHANNEL).unwrap().is_empty());

    let stats = system.queue.get_stats().unwrap();
    assert_eq!(stats.formations_started, 1);
    assert_eq!(stats.queues_cleared, 1);
    assert_eq!(stats.players_waiting, 0);
}
