//! Collaborator interfaces the engine calls out to but never owns
//! (spec.md §6 / SPEC_FULL.md §A.6, §C.1, §C.6).
//!
//! The engine touches persistence and quiz construction exclusively through
//! these traits; no engine module opens a socket or a database file
//! directly. Grounded in `src/database/mod.rs`'s `async_trait` database
//! contract shape — the repositories here play the same collaborator role
//! the teacher's `Database` trait plays for its write-serialized store.

use crate::engine::types::{ImageId, QuestionId, TeamId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;

/// A user record as the engine's collaborators see it. Fields beyond
/// `user_id`/`name` are opaque to the engine; it never reads them.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub name: String,
    pub access_token: String,
    pub team_id: Option<TeamId>,
    pub rejected: bool,
    pub version: u64,
}

/// One candidate answer a user submitted for a profile question.
#[derive(Debug, Clone)]
pub struct ProfileAnswer {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub answer_text: String,
}

/// A master-data question.
#[derive(Debug, Clone)]
pub struct ProfileQuestion {
    pub question_id: QuestionId,
    pub question_text: String,
}

/// `RepositoryError` composes into `EngineError::Internal` via `#[source]`
/// (SPEC_FULL.md §B.1) rather than the engine modeling every persistence
/// failure mode itself.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("version conflict saving {user_id}: expected {expected}, found {found}")]
    VersionConflict { user_id: UserId, expected: u64, found: u64 },
    #[error("no record found for {0}")]
    NotFound(UserId),
    #[error("write queue full, retry within the bound")]
    QueueFull,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// `UserRepository` — persistence with optimistic version checks,
/// cache-through design (SPEC_FULL.md §A.6).
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, user: UserRecord) -> RepoResult<()>;
    async fn save_bulk(&self, users: Vec<UserRecord>) -> RepoResult<()>;
    async fn fetch_by_user_id(&self, user_id: UserId) -> RepoResult<UserRecord>;
    async fn fetch_by_user_ids(&self, user_ids: &[UserId]) -> RepoResult<Vec<UserRecord>>;
    async fn fetch_by_team_id(&self, team_id: TeamId) -> RepoResult<Vec<UserRecord>>;
}

/// `UserImageRepository`.
#[async_trait]
pub trait UserImageRepository: Send + Sync {
    async fn save(&self, user_id: UserId, image_id: ImageId) -> RepoResult<()>;
    async fn fetch_by_user_id(&self, user_id: UserId) -> RepoResult<ImageId>;
}

/// `UserProfileRepository`.
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    async fn save(&self, answer: ProfileAnswer) -> RepoResult<()>;
    async fn fetch_by_question_with_user_group(
        &self,
        question_id: QuestionId,
        user_ids: &[UserId],
    ) -> RepoResult<Vec<ProfileAnswer>>;
}

/// `ProfileQuestionRepository` — read-only master data.
#[async_trait]
pub trait ProfileQuestionRepository: Send + Sync {
    async fn fetch_by_question_id(&self, question_id: QuestionId) -> RepoResult<ProfileQuestion>;
    async fn fetch_all_questions(&self) -> RepoResult<Vec<ProfileQuestion>>;
}

/// Built quiz material handed back to `QuizFlow` ahead of choice-id
/// assignment (spec.md §4.4 step 1).
pub struct BuiltQuiz {
    pub image_id: ImageId,
    pub candidate_texts: Vec<String>,
    pub correct_text: String,
}

/// Quiz Builder collaborator (spec.md §1, §4.4): the only way the engine's
/// driver loop reaches into persistence for quiz material.
#[async_trait]
pub trait QuizBuilder: Send + Sync {
    async fn build(
        &self,
        target: UserId,
        question_id: QuestionId,
        team_members: &[UserId],
    ) -> RepoResult<BuiltQuiz>;
}

/// One write issued against the write-serialized database front
/// (SPEC_FULL.md §A.6). Opaque to the engine beyond shape; only
/// `engine::memory`'s stand-in and a real persistence crate act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub table: &'static str,
    pub method: WriteMethod,
    pub params: HashMap<&'static str, String>,
}

/// `Database` — request-channel front for the write-serialized store. Reads
/// bypass the queue entirely per §A.6; this trait only models writes.
#[async_trait]
pub trait Database: Send + Sync {
    async fn write(&self, request: WriteRequest) -> RepoResult<()>;
}
