//! Integration tests for statistics initialization and submission.

mod common;

use bracket_engine::bracket::{BracketError, MatchCorrection, MatchStatus, TournamentStatus};
use bracket_engine::stats::{PlayerStatSubmission, StatLine};
use chrono::Utc;
use common::{GAME_ID, TOURNAMENT_ID, find, play_out, roster_of, setup};

fn line(player_id: i64, kills: i32, deaths: i32, assists: i32) -> PlayerStatSubmission {
    PlayerStatSubmission {
        player_id,
        kills,
        deaths,
        assists,
    }
}

#[tokio::test]
async fn test_generation_initializes_zero_rows() {
    let (_store, manager) = setup(4);
    let round = manager.generate_first_round(TOURNAMENT_ID).await.unwrap();

    let details = manager.get_match_details(round[0].id).await.unwrap();
    assert_eq!(details.first_team_statistics.len(), 3);
    assert_eq!(details.second_team_statistics.len(), 3);
    assert!(
        details
            .first_team_statistics
            .iter()
            .all(|row| row.kills == 0 && row.deaths == 0 && row.assists == 0)
    );

    let first_player = roster_of(round[0].first_team.unwrap())[0];
    let stats = manager
        .get_player_statistics(first_player, GAME_ID)
        .await
        .unwrap();
    assert_eq!(stats.matches_played, 1);
}

#[tokio::test]
async fn test_matches_played_follows_progress() {
    let (_store, manager) = setup(8);
    manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let bracket = play_out(&manager).await;
    let champion = bracket.champion.unwrap();

    // The champion played every round, a first-round loser only one
    let stats = manager
        .get_player_statistics(roster_of(champion)[0], GAME_ID)
        .await
        .unwrap();
    assert_eq!(stats.matches_played, 3);

    let m1 = find(&manager, 1, 1).await.unwrap();
    let loser = m1.second_team.unwrap();
    let stats = manager
        .get_player_statistics(roster_of(loser)[0], GAME_ID)
        .await
        .unwrap();
    assert_eq!(stats.matches_played, 1);
}

#[tokio::test]
async fn test_submission_requires_started_match() {
    let (_store, manager) = setup(2);
    let round = manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let player = roster_of(round[0].first_team.unwrap())[0];

    let err = manager
        .submit_match_statistics(round[0].id, &[line(player, 1, 0, 0)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BracketError::MatchNotStarted {
            status: MatchStatus::Scheduled,
            ..
        }
    ));
}

#[tokio::test]
async fn test_submission_folds_into_averages() {
    let (_store, manager) = setup(4);
    manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let m1 = find(&manager, 1, 1).await.unwrap();
    let m2 = find(&manager, 1, 2).await.unwrap();
    manager.record_result(m1.id, Some(13), Some(7)).await.unwrap();
    manager.record_result(m2.id, Some(13), Some(2)).await.unwrap();

    let player = roster_of(m1.first_team.unwrap())[0];
    manager
        .submit_match_statistics(m1.id, &[line(player, 20, 10, 4)])
        .await
        .unwrap();

    let semi = find(&manager, 2, 1).await.unwrap();
    manager.record_result(semi.id, Some(13), Some(11)).await.unwrap();
    manager
        .submit_match_statistics(semi.id, &[line(player, 10, 14, 6)])
        .await
        .unwrap();

    let stats = manager.get_player_statistics(player, GAME_ID).await.unwrap();
    assert_eq!(stats.matches_played, 2);
    assert_eq!(stats.total_kills, 30);
    assert_eq!(stats.total_deaths, 24);
    assert_eq!(stats.total_assists, 10);
    assert_eq!(stats.average_kills, 15.0);
    assert_eq!(stats.average_deaths, 12.0);
    assert_eq!(stats.average_assists, 5.0);

    // Resubmitting replaces the previous line instead of adding to it
    manager
        .submit_match_statistics(semi.id, &[line(player, 4, 14, 6)])
        .await
        .unwrap();
    let stats = manager.get_player_statistics(player, GAME_ID).await.unwrap();
    assert_eq!(stats.total_kills, 24);
    assert_eq!(stats.average_kills, 12.0);
}

#[tokio::test]
async fn test_outsider_is_rejected() {
    let (_store, manager) = setup(4);
    manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let m1 = find(&manager, 1, 1).await.unwrap();
    let m2 = find(&manager, 1, 2).await.unwrap();
    manager.record_result(m1.id, Some(1), Some(0)).await.unwrap();

    // Accepted in the tournament, but not playing in this match
    let outsider = roster_of(m2.first_team.unwrap())[0];
    let err = manager
        .submit_match_statistics(m1.id, &[line(outsider, 1, 1, 1)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BracketError::PlayerNotInMatch { player_id, .. } if player_id == outsider
    ));
}

#[tokio::test]
async fn test_statistics_accepted_after_tournament_completed() {
    let (store, manager) = setup(2);
    let round = manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    manager
        .record_result(round[0].id, Some(1), Some(0))
        .await
        .unwrap();
    store.set_tournament_status(TOURNAMENT_ID, TournamentStatus::Completed);

    let player = roster_of(round[0].second_team.unwrap())[1];
    let rows = manager
        .submit_match_statistics(round[0].id, &[line(player, 3, 5, 1)])
        .await
        .unwrap();
    assert_eq!(rows[0].kills, 3);
}

#[tokio::test]
async fn test_update_single_statistic() {
    let (_store, manager) = setup(4);
    manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let m1 = find(&manager, 1, 1).await.unwrap();
    let m2 = find(&manager, 1, 2).await.unwrap();
    manager.record_result(m1.id, Some(1), Some(0)).await.unwrap();

    let player = roster_of(m1.second_team.unwrap())[2];
    let row = manager
        .get_match_player_statistics(m1.id, player)
        .await
        .unwrap()
        .unwrap();

    let updated = manager
        .update_match_statistic(m1.id, row.id, StatLine::new(7, 2, 9))
        .await
        .unwrap();
    assert_eq!(updated.id, row.id);
    assert_eq!(updated.assists, 9);

    let stats = manager.get_player_statistics(player, GAME_ID).await.unwrap();
    assert_eq!(stats.total_kills, 7);
    assert_eq!(stats.matches_played, 1);

    let err = manager
        .update_match_statistic(m2.id, row.id, StatLine::new(1, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::StatisticMismatch { .. }));

    let err = manager
        .update_match_statistic(m1.id, row.id, StatLine::new(-1, 0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, BracketError::InvalidStatistic));
}

#[tokio::test]
async fn test_single_statistic_update_requires_started_match() {
    let (_store, manager) = setup(2);
    let round = manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let player = roster_of(round[0].first_team.unwrap())[0];
    let row = manager
        .get_match_player_statistics(round[0].id, player)
        .await
        .unwrap()
        .unwrap();

    let err = manager
        .update_match_statistic(round[0].id, row.id, StatLine::new(4, 1, 0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BracketError::MatchNotStarted {
            status: MatchStatus::Scheduled,
            ..
        }
    ));

    let stats = manager.get_player_statistics(player, GAME_ID).await.unwrap();
    assert_eq!(stats.total_kills, 0);
}

#[tokio::test]
async fn test_match_player_statistics_absent_for_outsider() {
    let (_store, manager) = setup(2);
    let round = manager.generate_first_round(TOURNAMENT_ID).await.unwrap();

    let row = manager
        .get_match_player_statistics(round[0].id, 999)
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_in_progress_correction_opens_submission() {
    let (_store, manager) = setup(2);
    let round = manager.generate_first_round(TOURNAMENT_ID).await.unwrap();
    let m = &round[0];

    manager
        .correct_result(
            m.id,
            MatchCorrection {
                start_datetime: Utc::now(),
                end_datetime: None,
                first_team_score: Some(4),
                second_team_score: Some(6),
                status: MatchStatus::InProgress,
                winning_team: None,
            },
        )
        .await
        .unwrap();

    let player = roster_of(m.first_team.unwrap())[0];
    let rows = manager
        .submit_match_statistics(m.id, &[line(player, 2, 2, 2)])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(manager.get_match(m.id).await.unwrap().winning_team, None);
}
