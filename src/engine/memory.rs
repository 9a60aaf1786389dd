//! In-memory stand-ins for the collaborator traits (SPEC_FULL.md §C.6).
//!
//! Test/demo scaffolding only — not a persistence subsystem. Grounded in
//! `src/database/mod.rs`'s `InMemoryDatabase` (`DashMap`-backed store,
//! entry-API atomicity) the way the teacher backs its in-memory database.

use crate::engine::collaborators::{
    BuiltQuiz, Database, ProfileAnswer, ProfileQuestion, ProfileQuestionRepository, QuizBuilder,
    RepoResult, RepositoryError, UserImageRepository, UserProfileRepository, UserRecord,
    UserRepository, WriteRequest,
};
use crate::engine::types::{ImageId, QuestionId, TeamId, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

/// In-memory `UserRepository` backed by a `DashMap`, mirroring the
/// cache-through shape the teacher's database layer uses.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: DashMap<UserId, UserRecord>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: UserRecord) -> RepoResult<()> {
        if let Some(existing) = self.users.get(&user.user_id) {
            if existing.version != user.version.saturating_sub(1) && existing.version != user.version {
                return Err(RepositoryError::VersionConflict {
                    user_id: user.user_id,
                    expected: existing.version,
                    found: user.version,
                });
            }
        }
        self.users.insert(user.user_id, user);
        Ok(())
    }

    async fn save_bulk(&self, users: Vec<UserRecord>) -> RepoResult<()> {
        for user in users {
            self.users.insert(user.user_id, user);
        }
        Ok(())
    }

    async fn fetch_by_user_id(&self, user_id: UserId) -> RepoResult<UserRecord> {
        self.users
            .get(&user_id)
            .map(|e| e.value().clone())
            .ok_or(RepositoryError::NotFound(user_id))
    }

    async fn fetch_by_user_ids(&self, user_ids: &[UserId]) -> RepoResult<Vec<UserRecord>> {
        Ok(user_ids.iter().filter_map(|id| self.users.get(id).map(|e| e.value().clone())).collect())
    }

    async fn fetch_by_team_id(&self, team_id: TeamId) -> RepoResult<Vec<UserRecord>> {
        Ok(self
            .users
            .iter()
            .filter(|e| e.value().team_id == Some(team_id))
            .map(|e| e.value().clone())
            .collect())
    }
}

/// In-memory `UserImageRepository`.
#[derive(Default)]
pub struct InMemoryUserImageRepository {
    images: DashMap<UserId, ImageId>,
}

impl InMemoryUserImageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserImageRepository for InMemoryUserImageRepository {
    async fn save(&self, user_id: UserId, image_id: ImageId) -> RepoResult<()> {
        self.images.insert(user_id, image_id);
        Ok(())
    }

    async fn fetch_by_user_id(&self, user_id: UserId) -> RepoResult<ImageId> {
        self.images.get(&user_id).map(|e| *e.value()).ok_or(RepositoryError::NotFound(user_id))
    }
}

/// In-memory `UserProfileRepository`.
#[derive(Default)]
pub struct InMemoryUserProfileRepository {
    answers: DashMap<(UserId, QuestionId), ProfileAnswer>,
}

impl InMemoryUserProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserProfileRepository for InMemoryUserProfileRepository {
    async fn save(&self, answer: ProfileAnswer) -> RepoResult<()> {
        self.answers.insert((answer.user_id, answer.question_id), answer);
        Ok(())
    }

    async fn fetch_by_question_with_user_group(
        &self,
        question_id: QuestionId,
        user_ids: &[UserId],
    ) -> RepoResult<Vec<ProfileAnswer>> {
        Ok(self
            .answers
            .iter()
            .filter(|e| e.key().1 == question_id && user_ids.contains(&e.key().0))
            .map(|e| e.value().clone())
            .collect())
    }
}

/// In-memory `ProfileQuestionRepository` — read-only master data, seeded at
/// construction (mirrors the Master database in SPEC_FULL.md §A.6 rejecting
/// writes: this type simply exposes none).
pub struct InMemoryProfileQuestionRepository {
    questions: Vec<ProfileQuestion>,
}

impl InMemoryProfileQuestionRepository {
    pub fn new(questions: Vec<ProfileQuestion>) -> Self {
        Self { questions }
    }
}

#[async_trait]
impl ProfileQuestionRepository for InMemoryProfileQuestionRepository {
    async fn fetch_by_question_id(&self, question_id: QuestionId) -> RepoResult<ProfileQuestion> {
        self.questions
            .iter()
            .find(|q| q.question_id == question_id)
            .cloned()
            .ok_or_else(|| RepositoryError::Other(anyhow::anyhow!("no such question {question_id}")))
    }

    async fn fetch_all_questions(&self) -> RepoResult<Vec<ProfileQuestion>> {
        Ok(self.questions.clone())
    }
}

/// In-memory `QuizBuilder`. Deduplicates and shuffles candidate answer
/// texts the way `QuizFlow` expects to receive them (spec.md §4.4 step 1
/// does the capping/correct-answer-preservation itself; this collaborator
/// only supplies the raw material).
pub struct InMemoryQuizBuilder {
    images: std::sync::Arc<InMemoryUserImageRepository>,
    profiles: std::sync::Arc<InMemoryUserProfileRepository>,
}

impl InMemoryQuizBuilder {
    pub fn new(
        images: std::sync::Arc<InMemoryUserImageRepository>,
        profiles: std::sync::Arc<InMemoryUserProfileRepository>,
    ) -> Self {
        Self { images, profiles }
    }
}

#[async_trait]
impl QuizBuilder for InMemoryQuizBuilder {
    async fn build(
        &self,
        target: UserId,
        question_id: QuestionId,
        team_members: &[UserId],
    ) -> RepoResult<BuiltQuiz> {
        let image_id = self.images.fetch_by_user_id(target).await?;
        let answers = self
            .profiles
            .fetch_by_question_with_user_group(question_id, team_members)
            .await?;

        let correct_text = answers
            .iter()
            .find(|a| a.user_id == target)
            .map(|a| a.answer_text.clone())
            .ok_or_else(|| RepositoryError::Other(anyhow::anyhow!("target {target} has no answer on record")))?;

        let mut texts: Vec<String> = answers.into_iter().map(|a| a.answer_text).collect();
        texts.sort();
        texts.dedup();
        texts.shuffle(&mut rand::rng());

        Ok(BuiltQuiz { image_id, candidate_texts: texts, correct_text })
    }
}

/// In-memory stand-in for the write-serialized `Database` front. A real
/// implementation batches/flushes on a timer (SPEC_FULL.md §A.6); this one
/// just records the call under a mutex, since no storage actually backs it.
#[derive(Default)]
pub struct InMemoryDatabase {
    writes: Mutex<Vec<WriteRequest>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn written_count(&self) -> usize {
        self.writes.lock().await.len()
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn write(&self, request: WriteRequest) -> RepoResult<()> {
        self.writes.lock().await.push(request);
        Ok(())
    }
}
