//! Barrier-based concurrent stress tests for `QuestRoom`, grounded in the
//! teacher's `Arc<Barrier>` connection-manager tests: many tasks hit
//! `connect`/`answer`/`broadcast` at the same instant to exercise the
//! `DashMap`/channel synchronization under real contention.

use questroom_engine::engine::quest_room::QuestRoom;
use questroom_engine::engine::types::{Choice, Quiz, UserId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

fn sample_quiz(_target: UserId, team_id: u32) -> Quiz {
    Quiz {
        image_id: UserId::new_v4(),
        team_id,
        question_id: UserId::new_v4(),
        question_text: "who is this?".into(),
        choices: Default::default(),
        remained_time: 15,
    }
}

fn choice(target: UserId, id: u32) -> Choice {
    Choice { target, choice_id: id, choice_text: format!("option-{id}") }
}

/// Many guests call `connect` concurrently for distinct users; every sink
/// must end up independently addressable with no cross-talk.
#[tokio::test]
async fn concurrent_connects_never_cross_wire_sinks() {
    let room = Arc::new(QuestRoom::new());
    const N: usize = 64;
    let users: Vec<UserId> = (0..N).map(|_| UserId::new_v4()).collect();
    let barrier = Arc::new(Barrier::new(N));

    let mut handles = Vec::new();
    for &user in &users {
        let room = room.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait();
            room.connect(user)
        }));
    }

    let mut receivers = Vec::new();
    for handle in handles {
        let (rx, _ctx) = handle.await.unwrap();
        receivers.push(rx);
    }

    room.broadcast(users[0], sample_quiz(users[0], 1), choice(users[0], 1)).await;

    let mut delivered = 0;
    for mut rx in receivers {
        if tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.is_ok() {
            delivered += 1;
        }
    }
    assert_eq!(delivered, N, "every connected sink should receive the broadcast");
}

/// All of one team's members call `answer` at the same instant; the
/// collector must tally every vote exactly once with no lost or duplicated
/// entries, and every caller must unblock with the same bundle.
#[tokio::test]
async fn concurrent_answers_from_one_team_are_all_tallied() {
    let room = Arc::new(QuestRoom::new());
    const MEMBERS: usize = 8;
    let users: Vec<UserId> = (0..MEMBERS).map(|_| UserId::new_v4()).collect();
    room.split_teams(&users, 1).await;
    room.prepare_for_game().await;

    let teams = room.teams().await;
    let team_id = *teams.keys().next().unwrap();
    let members = teams.get(&team_id).unwrap().clone();

    let barrier = Arc::new(Barrier::new(members.len()));
    let votes_for_id_1 = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for (i, member) in members.iter().copied().enumerate() {
        let room = room.clone();
        let barrier = barrier.clone();
        let votes_for_id_1 = votes_for_id_1.clone();
        // Split the team evenly between two answers so the collector has
        // real tallying to do.
        let picked = if i % 2 == 0 { 1 } else { 2 };
        if picked == 1 {
            votes_for_id_1.fetch_add(1, Ordering::SeqCst);
        }
        handles.push(tokio::spawn(async move {
            barrier.wait();
            room.answer(team_id, member, choice(member, picked)).await
        }));
    }

    let (results, counts) = room.collect_answers().await;
    let team_counts = counts.get(&team_id).cloned().unwrap_or_default();
    let expected_ones = votes_for_id_1.load(Ordering::SeqCst) as u32;
    assert_eq!(team_counts.get(&1).copied().unwrap_or(0), expected_ones);
    assert_eq!(
        team_counts.get(&2).copied().unwrap_or(0),
        MEMBERS as u32 - expected_ones
    );

    let winning_choice = results.get(&team_id).cloned();
    room.update_team_stats(&results).await;
    let mut per_team_counts = std::collections::HashMap::new();
    per_team_counts.insert(team_id, team_counts);
    room.distribute_answers(&results, &per_team_counts).await;

    for handle in handles {
        let bundle = handle.await.unwrap().unwrap();
        assert_eq!(Some(bundle.team_answer.choice_id), winning_choice.as_ref().map(|c| c.choice_id));
    }
}

/// Repeated `connect` calls for the same user from concurrent tasks must
/// leave exactly one live sink, never a leaked or double-closed channel.
#[tokio::test]
async fn concurrent_reconnects_for_the_same_user_leave_one_live_sink() {
    let room = Arc::new(QuestRoom::new());
    let user = UserId::new_v4();
    const ATTEMPTS: usize = 16;
    let barrier = Arc::new(Barrier::new(ATTEMPTS));

    let mut handles = Vec::new();
    for _ in 0..ATTEMPTS {
        let room = room.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait();
            room.connect(user)
        }));
    }

    let mut receivers = Vec::new();
    for handle in handles {
        let (rx, _ctx) = handle.await.unwrap();
        receivers.push(rx);
    }

    room.broadcast(user, sample_quiz(user, 1), choice(user, 1)).await;

    let mut live = 0;
    for mut rx in receivers {
        if tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.ok().flatten().is_some() {
            live += 1;
        }
    }
    assert_eq!(live, 1, "only the most recently connected sink should still be live");
}
