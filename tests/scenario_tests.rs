//! End-to-end scenario tests (spec.md §8 S1/S3/S5/S6) driven entirely through
//! the `GameManager` public surface, against the in-memory collaborators.

use questroom_engine::engine::collaborators::ProfileQuestion;
use questroom_engine::engine::memory::{
    InMemoryDatabase, InMemoryProfileQuestionRepository, InMemoryQuizBuilder,
    InMemoryUserImageRepository, InMemoryUserProfileRepository, InMemoryUserRepository,
};
use questroom_engine::engine::quiz_flow::build_quiz;
use questroom_engine::engine::types::{Choice, TeamId, UserId};
use questroom_engine::engine::{Collaborators, GameManager, Phase};
use questroom_engine::error::EngineError;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    manager: Arc<GameManager>,
    images: Arc<InMemoryUserImageRepository>,
    profiles: Arc<InMemoryUserProfileRepository>,
    question_ids: Vec<Uuid>,
}

/// Wires a fresh `GameManager` against the in-memory collaborators, seeded
/// with three master questions, mirroring `main.rs::build_manager`.
fn build_harness(team_count: u32) -> Harness {
    let images = Arc::new(InMemoryUserImageRepository::new());
    let profiles = Arc::new(InMemoryUserProfileRepository::new());
    let quiz_builder = Arc::new(InMemoryQuizBuilder::new(images.clone(), profiles.clone()));

    let question_ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let questions: Vec<ProfileQuestion> = question_ids
        .iter()
        .enumerate()
        .map(|(i, id)| ProfileQuestion { question_id: *id, question_text: format!("question {i}") })
        .collect();

    let manager = GameManager::new(
        team_count,
        Collaborators {
            users: Arc::new(InMemoryUserRepository::new()),
            images: images.clone(),
            profiles: profiles.clone(),
            questions: Arc::new(InMemoryProfileQuestionRepository::new(questions)),
            quiz_builder,
            database: Arc::new(InMemoryDatabase::new()),
        },
    );

    Harness { manager: Arc::new(manager), images, profiles, question_ids }
}

/// Registers `count` users, gives each an image and a distinct answer on
/// every seeded question, joins them to the lobby, and marks them ready.
async fn seed_players(harness: &Harness, count: u32) -> Vec<UserId> {
    let mut users = Vec::new();
    for i in 0..count {
        let (user_id, _token) = harness.manager.register_user(format!("player-{i}")).await.unwrap();
        harness.images.save(user_id, Uuid::new_v4()).await.unwrap();
        for question_id in &harness.question_ids {
            harness
                .profiles
                .save(questroom_engine::engine::collaborators::ProfileAnswer {
                    user_id,
                    question_id: *question_id,
                    answer_text: format!("answer-{i}-{question_id}"),
                })
                .await
                .unwrap();
        }
        harness.manager.join_lobby(user_id).await.unwrap();
        harness.manager.set_ready(user_id, true).await.unwrap();
        users.push(user_id);
    }
    users
}

#[tokio::test]
async fn s1_happy_path_six_users_two_teams_reaches_ranked_result() {
    let harness = build_harness(2);
    harness.manager.open_lobby().await.unwrap();
    seed_players(&harness, 6).await;

    harness.manager.close_lobby().await.unwrap();
    harness.manager.notify_lobby_closed().await.unwrap();
    harness.manager.quest_start().await.unwrap();
    assert_eq!(harness.manager.phase().await, Phase::InGame);

    let teams = harness.manager.get_teams().await.unwrap();
    assert_eq!(teams.values().map(|m| m.len()).sum::<usize>(), 6);

    let program = harness.manager.build_quiz_program().await.unwrap();
    assert!(program.len() >= 3, "program should cover every member at least once");

    for entry in program.iter().take(3) {
        let answering_team: TeamId =
            *teams.keys().find(|&&t| t != entry.team_id).expect("a second team exists");
        let answering_members = teams.get(&answering_team).unwrap().clone();
        let target_team_members = teams.get(&entry.team_id).unwrap().clone();

        let (quiz, correct) =
            build_quiz(&*harness.manager.quiz_builder(), entry, &target_team_members, 15)
                .await
                .unwrap();
        harness.manager.broadcast(entry.target, quiz, correct.clone()).await.unwrap();

        let manager = harness.manager.clone();
        let mut handles = Vec::new();
        for member in answering_members {
            let manager = manager.clone();
            let chosen = correct.clone();
            handles.push(tokio::spawn(async move {
                manager.answer(answering_team, member, chosen).await
            }));
        }

        let (team_results, per_team_counts) =
            tokio::time::timeout(Duration::from_secs(6), harness.manager.collect_answer())
                .await
                .expect("collection should finish well under its 5s bound")
                .unwrap();
        assert_eq!(team_results.get(&answering_team).map(|c| c.choice_id), Some(correct.choice_id));

        harness.manager.update_team_stats(&team_results).await.unwrap();
        harness.manager.distribute_answer(&team_results, &per_team_counts).await.unwrap();

        for handle in handles {
            let (bundle, result) = handle.await.unwrap().unwrap();
            assert_eq!(bundle.team_answer.choice_id, correct.choice_id);
            assert!(result.is_correct);
            assert_eq!(result.answer.choice_id, correct.choice_id);
        }
    }

    harness.manager.end_quest().await.unwrap();
    assert_eq!(harness.manager.phase().await, Phase::Result);

    let stats = harness.manager.get_all_stats().await.unwrap();
    assert_eq!(stats.personal.len(), 6, "every seated user should have a stats entry");
    assert_eq!(stats.team.len(), 2, "both teams should have a stats entry");
    for stat in stats.personal.values() {
        assert!((1..=6).contains(&stat.order));
        assert!((0.0..=1.0).contains(&stat.correct_rate));
    }
    for stat in stats.team.values() {
        assert!((1..=2).contains(&stat.order));
    }
}

#[tokio::test]
async fn s3_silent_team_absent_from_collection_but_present_in_stats_at_zero() {
    let harness = build_harness(2);
    harness.manager.open_lobby().await.unwrap();
    seed_players(&harness, 6).await;

    harness.manager.close_lobby().await.unwrap();
    harness.manager.quest_start().await.unwrap();

    let teams = harness.manager.get_teams().await.unwrap();
    let program = harness.manager.build_quiz_program().await.unwrap();
    let entry = program.first().unwrap();
    let silent_team: TeamId = *teams.keys().find(|&&t| t != entry.team_id).unwrap();
    let target_team_members = teams.get(&entry.team_id).unwrap().clone();

    let (quiz, correct) = build_quiz(&*harness.manager.quiz_builder(), entry, &target_team_members, 15)
        .await
        .unwrap();
    harness.manager.broadcast(entry.target, quiz, correct).await.unwrap();

    // Nobody answers: CollectAnswer must still return after its hard 5s bound.
    let start = tokio::time::Instant::now();
    let (team_results, _counts) = harness.manager.collect_answer().await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert!(!team_results.contains_key(&silent_team), "silent team must be absent from the result map");

    harness.manager.update_team_stats(&team_results).await.unwrap();
    harness.manager.end_quest().await.unwrap();

    let stats = harness.manager.get_all_stats().await.unwrap();
    let silent_stats = stats.team.get(&silent_team).expect("silent team still appears in GetAllStats");
    assert_eq!(silent_stats.correct_rate, 0.0);
}

#[tokio::test]
async fn s5_wrong_phase_guard() {
    let harness = build_harness(2);

    // JoinLobby before OpenLobby.
    let err = harness.manager.join_lobby(UserId::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::WrongPhase { current: Phase::Initialized }));

    harness.manager.open_lobby().await.unwrap();
    let users = seed_players(&harness, 6).await;

    // Answer during Accepting.
    let err = harness
        .manager
        .answer(1, users[0], Choice { target: users[0], choice_id: 1, choice_text: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::WrongPhase { current: Phase::Accepting }));

    harness.manager.close_lobby().await.unwrap();
    harness.manager.quest_start().await.unwrap();
    harness.manager.end_quest().await.unwrap();

    // TakeHint after EndQuest.
    let err = harness.manager.take_hint(users[0], "hi".into()).await.unwrap_err();
    assert!(matches!(err, EngineError::WrongPhase { current: Phase::Result }));
}

#[tokio::test]
async fn s6_reconnect_closes_the_first_quiz_stream() {
    let harness = build_harness(2);
    harness.manager.open_lobby().await.unwrap();
    let users = seed_players(&harness, 6).await;
    harness.manager.close_lobby().await.unwrap();
    harness.manager.quest_start().await.unwrap();

    let user = users[0];
    let (mut first_rx, _ctx1) = harness.manager.enter_quest_room(user).await.unwrap();
    let (mut second_rx, _ctx2) = harness.manager.enter_quest_room(user).await.unwrap();

    let program = harness.manager.build_quiz_program().await.unwrap();
    let entry = program.iter().find(|e| e.target == user).expect("user is someone's target");
    let teams = harness.manager.get_teams().await.unwrap();
    let members = teams.get(&entry.team_id).unwrap().clone();
    let (quiz, correct) =
        build_quiz(&*harness.manager.quiz_builder(), entry, &members, 15).await.unwrap();
    harness.manager.broadcast(user, quiz, correct).await.unwrap();

    assert!(first_rx.recv().await.is_none(), "the first stream should be closed on reconnect");
    assert!(second_rx.recv().await.is_some(), "the second stream should receive the broadcast");
}
