//! Core data types shared by every engine component (spec.md §3).

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque, globally-unique identifier for a participant.
pub type UserId = Uuid;

/// Opaque identifier for a quiz question in the master question set.
pub type QuestionId = Uuid;

/// Opaque identifier for a user's profile image.
pub type ImageId = Uuid;

/// 1-based team identifier. Valid team ids are `[1, TeamCount]`.
///
/// The reference implementation this engine is modeled on keyed its
/// internal team map by `0..TeamCount` while assigning members at
/// `1..=TeamCount`, an off-by-one later members could never look up.
/// This crate keys consistently by `1..=TeamCount` everywhere instead.
pub type TeamId = u32;

/// Typical number of members on one team; used to size stack-allocated
/// member lists without heap allocation in the common case.
pub const TYPICAL_TEAM_SIZE: usize = 8;

/// Stack-allocated list of team members, spilling to the heap only for
/// unusually large teams.
pub type MemberList = SmallVec<[UserId; TYPICAL_TEAM_SIZE]>;

/// Maximum number of choices ever shown for one quiz.
pub const MAX_CHOICE_COUNT: usize = 4;

/// One answer option attributable to a target user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// The user this answer option is about.
    pub target: UserId,
    pub choice_id: u32,
    pub choice_text: String,
}

/// One posed question: a target user, a question, up to four choices, and
/// a countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub image_id: ImageId,
    pub team_id: TeamId,
    pub question_id: QuestionId,
    pub question_text: String,
    pub choices: ArrayVec<Choice, MAX_CHOICE_COUNT>,
    pub remained_time: i32,
}

/// A team's aggregated answer plus the per-option vote tally, delivered to
/// every member of that team after `CollectAnswer`/`DistributeAnswer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerBundle {
    pub team_answer: Choice,
    pub answer_counts: HashMap<u32, u32>,
}

/// One guest's outcome for a single quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub answer: Choice,
    pub is_correct: bool,
}

/// Correct rate and stable ranking for one entity (user or team).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// In `[0.0, 1.0]`.
    pub correct_rate: f32,
    /// 1-based; ties share the lower rank (see `engine::stats`).
    pub order: u32,
}

/// Per-user enriched result DTO (SPEC_FULL.md §C.4), grounded in the
/// original `end_quest_usecase.go`'s `UserStatsDTO`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatsDto {
    pub user_id: UserId,
    pub correct_rate: f32,
    pub order: u32,
    pub team_id: TeamId,
}

/// Per-team enriched result DTO (SPEC_FULL.md §C.4), grounded in the
/// original `end_quest_usecase.go`'s `TeamStatsDTO`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamStatsDto {
    pub team_id: TeamId,
    pub correct_rate: f32,
    pub order: u32,
    pub member_count: usize,
}

/// Placeholder question text returned by `RegisterProfile` once a user has
/// answered every master question, mirroring the original
/// `regist_profile_usecase.go`'s `NoMoreQuestionText` sentinel (SPEC_FULL.md
/// §C.1): not an answer value, but the "nothing left to ask" prompt shown
/// in place of a next question.
pub const NO_MORE_QUESTIONS_TEXT: &str =
    "That's every question — thanks for answering. Hang tight until the game starts.";

/// `RegisterProfile`'s response (SPEC_FULL.md §C.1): either the next
/// master question to prompt the user with, or the terminal
/// `NO_MORE_QUESTIONS_TEXT` once the master set is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileQuestionOutcome {
    pub next_question_id: Option<QuestionId>,
    pub next_question_text: String,
    pub no_more_questions: bool,
}

/// Coarse, display-facing bucketing of a correct rate (SPEC_FULL.md §C.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultState {
    Flawless,
    Strong,
    Mixed,
    Weak,
}

/// Default result-state mapper, thresholds chosen to give four roughly
/// even display tiers.
pub fn default_result_state_mapper(correct_rate: f32) -> ResultState {
    if correct_rate >= 0.9 {
        ResultState::Flawless
    } else if correct_rate >= 0.6 {
        ResultState::Strong
    } else if correct_rate >= 0.3 {
        ResultState::Mixed
    } else {
        ResultState::Weak
    }
}
