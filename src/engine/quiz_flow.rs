//! C4 — QuizFlow: the admin-side driver loop (spec.md §4.4).
//!
//! Walks teams×users, builds each quiz via the Quiz Builder collaborator,
//! drives the per-question 1Hz tick loop, and lets an admin-submitted hint
//! extend the remaining time. Grounded in the original
//! `admin_start_quest_usecase.go`'s tick/select loop and in
//! `src/server/room_service.rs`'s driver-method-with-tracing-span shape.

use crate::engine::collaborators::QuizBuilder;
use crate::engine::quest_room::QuestRoom;
use crate::engine::types::{Choice, MemberList, Quiz, QuestionId, TeamId, UserId};
use crate::error::{EngineError, EngineResult};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const INITIAL_REMAINING_TIME: i32 = 15;
const HINT_TIME_BONUS: i32 = 10;
const MAX_FAILED_TICK_COUNT: u32 = 3;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// One `(target, question)` pairing the program walks in order.
#[derive(Clone)]
pub struct QuizProgramEntry {
    pub team_id: TeamId,
    pub target: UserId,
    pub question_id: QuestionId,
    pub question_text: String,
}

/// Builds the shuffled teams×users×questions walk order (spec.md §4.4
/// "Input"). Questions are drawn from `question_pool`, topped up by
/// re-shuffling the pool if members exceed questions.
pub fn build_program(
    teams: &HashMap<TeamId, MemberList>,
    question_pool: &[(QuestionId, String)],
) -> Vec<QuizProgramEntry> {
    let mut team_ids: Vec<TeamId> = teams.keys().copied().collect();
    team_ids.shuffle(&mut rand::rng());

    let mut program = Vec::new();
    for team_id in team_ids {
        let mut members = teams.get(&team_id).cloned().unwrap_or_default();
        members.shuffle(&mut rand::rng());

        let mut pool = question_pool.to_vec();
        pool.shuffle(&mut rand::rng());
        let mut pool_iter = pool.into_iter().cycle();

        for target in members {
            let Some((question_id, question_text)) = pool_iter.next() else {
                continue;
            };
            program.push(QuizProgramEntry { team_id, target, question_id, question_text });
        }
    }

    program
}

/// `onTick` callback outcome: `Ok` continues the loop, `Err` counts toward
/// `MaxFailedCount` before the loop surfaces the failure.
pub type TickCallback =
    Arc<dyn Fn(&Quiz, &str) -> Result<(), anyhow::Error> + Send + Sync>;

/// `failedCallback` — invoked once the loop gives up, converting the
/// error into the transport's cancellation vocabulary (SPEC_FULL.md §A.9).
pub type FailedCallback = Arc<dyn Fn(EngineError) + Send + Sync>;

/// Builds one `Quiz` for `entry` via the Quiz Builder collaborator
/// (spec.md §4.4 step 1): fetch image/candidates, dedup, shuffle, cap at 4,
/// guaranteeing the correct answer survives the cap.
pub async fn build_quiz(
    builder: &dyn QuizBuilder,
    entry: &QuizProgramEntry,
    team_members: &[UserId],
    remaining_time: i32,
) -> EngineResult<(Quiz, Choice)> {
    let built = builder
        .build(entry.target, entry.question_id, team_members)
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))?;

    let mut texts = built.candidate_texts;
    if !texts.iter().any(|t| t == &built.correct_text) {
        texts.push(built.correct_text.clone());
    }

    if texts.len() > crate::engine::types::MAX_CHOICE_COUNT {
        texts.truncate(crate::engine::types::MAX_CHOICE_COUNT);
        if !texts.iter().any(|t| t == &built.correct_text) {
            texts[0] = built.correct_text.clone();
            texts.shuffle(&mut rand::rng());
        }
    }

    let mut choices = arrayvec::ArrayVec::new();
    let mut correct = None;
    for (i, text) in texts.into_iter().enumerate() {
        let choice_id = i as u32 + 1;
        let is_correct = text == built.correct_text;
        let choice = Choice { target: entry.target, choice_id, choice_text: text };
        if is_correct {
            correct = Some(choice.clone());
        }
        let _ = choices.try_push(choice);
    }

    let correct = correct.ok_or_else(|| {
        EngineError::Internal("quiz builder never produced the correct choice".into())
    })?;

    let quiz = Quiz {
        image_id: built.image_id,
        team_id: entry.team_id,
        question_id: entry.question_id,
        question_text: entry.question_text.clone(),
        choices,
        remained_time: remaining_time,
    };

    Ok((quiz, correct))
}

/// Drives one quiz's tick loop (spec.md §4.4 steps 2-5). Returns once the
/// admin sends `NextQuiz()`, the quest-room is cancelled, or the outer
/// `network_cancelled` future resolves (the per-request network
/// cancellation surface of SPEC_FULL.md §A.5).
pub async fn run_quiz_iteration(
    room: &QuestRoom,
    target: UserId,
    quiz_template: Quiz,
    correct: Choice,
    on_tick: &TickCallback,
    failed_callback: &FailedCallback,
) {
    let (mut hint_rx, mut next_rx) = room.begin_quiz_signals().await;

    let mut remaining_time = INITIAL_REMAINING_TIME;
    let mut hint = String::new();
    let mut failed_count: u32 = 0;
    let cancel_ctx = room.cancellation_context();

    loop {
        let mut quiz = quiz_template.clone();
        quiz.remained_time = remaining_time;
        room.broadcast(target, quiz.clone(), correct.clone()).await;

        match on_tick(&quiz, &hint) {
            Ok(()) => failed_count = 0,
            Err(e) => {
                failed_count += 1;
                tracing::warn!(error = %e, failed_count, "quiz_flow: onTick callback failed");
                if failed_count > MAX_FAILED_TICK_COUNT {
                    failed_callback(EngineError::Internal(e.to_string()));
                    return;
                }
            }
        }

        remaining_time -= 1;

        tokio::select! {
            _ = next_rx.recv() => return,
            _ = cancel_ctx.cancelled() => {
                failed_callback(EngineError::Cancelled);
                return;
            }
            maybe_hint = hint_rx.recv() => {
                if let Some(h) = maybe_hint {
                    hint = h;
                    if remaining_time > 0 {
                        remaining_time += HINT_TIME_BONUS;
                    }
                }
            }
            _ = tokio::time::sleep(TICK_INTERVAL) => {}
        }
    }
}
