//! `GameManager` — the engine's top-level handle (spec.md §2, §9).
//!
//! Wires phase + lobby + quest room + collaborators behind one explicitly
//! constructed, explicitly injected handle, mirroring `src/server.rs`'s
//! `EnhancedGameServer::new` collaborator wiring rather than the original's
//! process-global singleton (SPEC_FULL.md §A.9: pass it explicitly to
//! drivers instead).

pub mod cancellation;
pub mod collaborators;
pub mod lobby;
pub mod memory;
pub mod phase;
pub mod quest_room;
pub mod quiz_flow;
pub mod stats;
pub mod types;

use crate::engine::cancellation::CancellationContext;
use crate::engine::collaborators::{
    Database, ProfileQuestionRepository, QuizBuilder, UserImageRepository, UserProfileRepository,
    UserRecord, UserRepository, WriteMethod, WriteRequest,
};
use crate::engine::lobby::Lobby;
pub use crate::engine::phase::Phase;
use crate::engine::quest_room::QuestRoom;
use crate::engine::quiz_flow::QuizProgramEntry;
use crate::engine::stats::{get_all_stats, get_result_stats, AllStats, ResultStats};
use crate::engine::types::{
    AnswerBundle, Choice, MemberList, Quiz, QuizResult, ResultState, TeamId, UserId,
};
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const MIN_TEAM_USER: usize = 3;
const MAX_ANSWER_LEN: usize = 30;

/// Everything the engine calls out to but never owns. Constructed once and
/// shared via `Arc` the way the teacher threads `Arc<dyn Trait>`
/// collaborators through `EnhancedGameServer`.
pub struct Collaborators {
    pub users: Arc<dyn UserRepository>,
    pub images: Arc<dyn UserImageRepository>,
    pub profiles: Arc<dyn UserProfileRepository>,
    pub questions: Arc<dyn ProfileQuestionRepository>,
    pub quiz_builder: Arc<dyn QuizBuilder>,
    pub database: Arc<dyn Database>,
}

/// The process-wide engine handle for exactly one game in flight
/// (spec.md §2). `phase` is guarded by its own lock; `Lobby`/`QuestRoom`
/// carry their own internal locking as documented in each module.
pub struct GameManager {
    phase: RwLock<Phase>,
    lobby: Lobby,
    quest_room: QuestRoom,
    team_count: u32,
    collaborators: Collaborators,
}

impl GameManager {
    pub fn new(team_count: u32, collaborators: Collaborators) -> Self {
        Self {
            phase: RwLock::new(Phase::Initialized),
            lobby: Lobby::new(),
            quest_room: QuestRoom::new(),
            team_count,
            collaborators,
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    // ---- C1: SessionState -------------------------------------------------

    /// `OpenLobby()`.
    #[tracing::instrument(skip(self))]
    pub async fn open_lobby(&self) -> EngineResult<CancellationContext> {
        let mut phase = self.phase.write().await;
        phase.require(&[Phase::Initialized, Phase::Accepting])?;
        if *phase == Phase::Initialized {
            self.lobby.reset().await;
        }
        *phase = Phase::Accepting;
        Ok(self.lobby.cancellation_context())
    }

    /// `CloseLobby()` — additionally enforces SPEC_FULL.md §C.2's
    /// all-ready gate and minimum-team-size guard before the split commits.
    #[tracing::instrument(skip(self))]
    pub async fn close_lobby(&self) -> EngineResult<HashMap<UserId, TeamId>> {
        let mut phase = self.phase.write().await;
        phase.require(&[Phase::Accepting, Phase::Closed])?;

        if *phase == Phase::Closed {
            return Ok(self.quest_room.teams().await.into_iter().flat_map(|(team, members)| {
                members.into_iter().map(move |u| (u, team))
            }).collect());
        }

        self.lobby.require_all_ready().await?;

        let users = self.lobby.users().await;
        let preferred = self.lobby.preferred_teams().await;
        let assignment =
            self.quest_room.split_teams_with_preferences(&users, self.team_count, &preferred).await;

        let teams = self.quest_room.teams().await;
        for (team_id, members) in &teams {
            if members.len() < MIN_TEAM_USER {
                return Err(EngineError::TeamTooSmall { team: *team_id, min: MIN_TEAM_USER });
            }
        }

        let records = self.fetch_records_for_bulk_save(&assignment).await?;
        self.collaborators
            .users
            .save_bulk(records)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        *phase = Phase::Closed;
        Ok(assignment)
    }

    async fn fetch_records_for_bulk_save(
        &self,
        assignment: &HashMap<UserId, TeamId>,
    ) -> EngineResult<Vec<UserRecord>> {
        let ids: Vec<UserId> = assignment.keys().copied().collect();
        let mut records = self
            .collaborators
            .users
            .fetch_by_user_ids(&ids)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        for record in &mut records {
            if let Some(team) = assignment.get(&record.user_id) {
                record.team_id = Some(*team);
            }
        }
        Ok(records)
    }

    /// `NotifyLobbyClosed()`.
    #[tracing::instrument(skip(self))]
    pub async fn notify_lobby_closed(&self) -> EngineResult<()> {
        let phase = self.phase.read().await;
        phase.require(&[Phase::Closed])?;
        self.lobby.notify_closed();
        Ok(())
    }

    /// `QuestStart()`.
    #[tracing::instrument(skip(self))]
    pub async fn quest_start(&self) -> EngineResult<()> {
        let mut phase = self.phase.write().await;
        phase.require(&[Phase::Closed, Phase::InGame])?;
        if *phase != Phase::InGame {
            self.quest_room.prepare_for_game().await;
        }
        *phase = Phase::InGame;
        Ok(())
    }

    /// `EndQuest()`.
    #[tracing::instrument(skip(self))]
    pub async fn end_quest(&self) -> EngineResult<()> {
        let mut phase = self.phase.write().await;
        phase.require(&[Phase::InGame])?;
        *phase = Phase::Result;
        Ok(())
    }

    // ---- C2: Lobby membership ---------------------------------------------

    pub async fn get_lobby_users(&self) -> EngineResult<Vec<UserId>> {
        self.phase.read().await.require(&[Phase::Accepting, Phase::Closed])?;
        Ok(self.lobby.users().await)
    }

    pub async fn join_lobby(&self, user: UserId) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::Accepting])?;
        self.lobby.join(user).await;
        Ok(())
    }

    pub async fn disconnect_lobby(&self, user: UserId) -> EngineResult<()> {
        let phase = *self.phase.read().await;
        phase.require(&[Phase::Initialized, Phase::Accepting, Phase::Closed])?;
        self.lobby.disconnect(user).await;
        Ok(())
    }

    pub async fn set_ready(&self, user: UserId, ready: bool) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::Accepting])?;
        self.lobby.set_ready(user, ready).await;
        Ok(())
    }

    /// `ChangeTeam(userId, newTeamId)` (SPEC_FULL.md §C.3) — a soft
    /// pre-split preference before `SplitTeams` commits; after `Closed` the
    /// team roster is live and reassignment is rejected outright.
    pub async fn change_team(&self, user: UserId, new_team: TeamId) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::Accepting])?;
        self.lobby.set_preferred_team(user, new_team).await;
        Ok(())
    }

    // ---- C.1: Entry / profile registration ---------------------------------

    /// `RegisterUser(name) -> (UserId, AccessToken)`.
    pub async fn register_user(&self, name: String) -> EngineResult<(UserId, String)> {
        let user_id = UserId::new_v4();
        let access_token = Uuid::new_v4().to_string();
        let record = UserRecord {
            user_id,
            name,
            access_token: access_token.clone(),
            team_id: None,
            rejected: false,
            version: 0,
        };
        self.collaborators
            .users
            .save(record)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok((user_id, access_token))
    }

    /// `RegisterProfile(userId, profileId, answer)` — saves the answer, then
    /// reports the next master question to prompt the user with (or the
    /// `NoMoreQuestionText` terminal prompt once the master set is
    /// exhausted), mirroring `regist_profile_usecase.go`'s "fetch the next
    /// sequential question, terminal text on miss" shape, adapted from its
    /// `profileId + 1` integer-sequence lookup to a position-in-master-list
    /// lookup since questions here are keyed by opaque `QuestionId`s
    /// (SPEC_FULL.md §C.1).
    pub async fn register_profile(
        &self,
        user_id: UserId,
        question_id: crate::engine::types::QuestionId,
        answer: String,
    ) -> EngineResult<crate::engine::types::ProfileQuestionOutcome> {
        use crate::engine::types::{ProfileQuestionOutcome, NO_MORE_QUESTIONS_TEXT};

        if answer.chars().count() > MAX_ANSWER_LEN {
            return Err(EngineError::PayloadTooLong { max: MAX_ANSWER_LEN });
        }
        self.collaborators
            .profiles
            .save(collaborators::ProfileAnswer { user_id, question_id, answer_text: answer })
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let questions = self
            .collaborators
            .questions
            .fetch_all_questions()
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let next = questions
            .iter()
            .position(|q| q.question_id == question_id)
            .and_then(|i| questions.get(i + 1));

        Ok(match next {
            Some(q) => ProfileQuestionOutcome {
                next_question_id: Some(q.question_id),
                next_question_text: q.question_text.clone(),
                no_more_questions: false,
            },
            None => ProfileQuestionOutcome {
                next_question_id: None,
                next_question_text: NO_MORE_QUESTIONS_TEXT.to_string(),
                no_more_questions: true,
            },
        })
    }

    /// `RejectUser(userId)` — admin-only removal plus a persisted rejection
    /// flag so the user cannot silently rejoin (SPEC_FULL.md §C.1).
    pub async fn reject_user(&self, user_id: UserId) -> EngineResult<()> {
        self.lobby.disconnect(user_id).await;
        let mut record = self
            .collaborators
            .users
            .fetch_by_user_id(user_id)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        record.rejected = true;
        record.version += 1;
        self.collaborators
            .users
            .save(record)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))
    }

    /// `Reconnect(userId, accessToken)` (SPEC_FULL.md §C.1): constant-time
    /// token compare, then re-attach via whichever phase-appropriate path
    /// applies.
    pub async fn reconnect(
        &self,
        user_id: UserId,
        access_token: &str,
    ) -> EngineResult<ReconnectOutcome> {
        let record = self
            .collaborators
            .users
            .fetch_by_user_id(user_id)
            .await
            .map_err(|_| EngineError::NotConnected(user_id))?;

        if !crate::auth::secrets_match(&record.access_token, access_token) {
            return Err(EngineError::TargetMismatch);
        }
        if record.rejected {
            return Err(EngineError::NotConnected(user_id));
        }

        let phase = *self.phase.read().await;
        match phase {
            Phase::Accepting => {
                self.lobby.join(user_id).await;
                Ok(ReconnectOutcome::RejoinedLobby)
            }
            Phase::InGame => {
                let (sink, ctx) = self.quest_room.connect(user_id);
                Ok(ReconnectOutcome::RejoinedQuestRoom(sink, ctx))
            }
            other => Err(EngineError::WrongPhase { current: other }),
        }
    }

    // ---- C3: QuestRoom surface ---------------------------------------------

    pub async fn get_teams(&self) -> EngineResult<HashMap<TeamId, MemberList>> {
        self.phase.read().await.require(&[Phase::Closed, Phase::InGame, Phase::Result])?;
        Ok(self.quest_room.teams().await)
    }

    /// `EnterQuestRoom(u) -> (ctx, quizStream)`.
    pub async fn enter_quest_room(
        &self,
        user: UserId,
    ) -> EngineResult<(tokio::sync::mpsc::Receiver<Quiz>, CancellationContext)> {
        self.phase.read().await.require(&[Phase::InGame])?;
        Ok(self.quest_room.connect(user))
    }

    /// `Answer(teamId, userId, choice)`, then `UpdatePersonalStats`. Returns
    /// the aggregated team `AnswerBundle` alongside this guest's own
    /// `QuizResult` (spec.md §3) — the original `answer_usecase.go` builds
    /// `Result{Answer, IsCorrect}` from the same two pieces of data.
    pub async fn answer(
        &self,
        team: TeamId,
        user: UserId,
        choice: Choice,
    ) -> EngineResult<(AnswerBundle, QuizResult)> {
        self.phase.read().await.require(&[Phase::InGame])?;
        let bundle = self.quest_room.answer(team, user, choice.clone()).await?;
        let result = self.quest_room.update_personal_stats(user, choice).await;
        Ok((bundle, result))
    }

    #[tracing::instrument(skip(self))]
    pub async fn collect_answer(&self) -> EngineResult<(HashMap<TeamId, Choice>, HashMap<TeamId, HashMap<u32, u32>>)> {
        self.phase.read().await.require(&[Phase::InGame])?;
        Ok(self.quest_room.collect_answers().await)
    }

    pub async fn update_team_stats(&self, team_results: &HashMap<TeamId, Choice>) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::InGame])?;
        self.quest_room.update_team_stats(team_results).await;
        Ok(())
    }

    pub async fn distribute_answer(
        &self,
        team_results: &HashMap<TeamId, Choice>,
        per_team_counts: &HashMap<TeamId, HashMap<u32, u32>>,
    ) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::InGame])?;
        self.quest_room.distribute_answers(team_results, per_team_counts).await;
        Ok(())
    }

    pub async fn take_hint(&self, user: UserId, hint: String) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::InGame])?;
        self.quest_room.take_hint(user, hint).await
    }

    pub async fn next_quiz(&self) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::InGame])?;
        self.quest_room.next_quiz().await
    }

    pub async fn broadcast(&self, target: UserId, quiz: Quiz, correct: Choice) -> EngineResult<()> {
        self.phase.read().await.require(&[Phase::InGame])?;
        self.quest_room.broadcast(target, quiz, correct).await;
        Ok(())
    }

    /// Builds the shuffled teams×users×questions walk order for `QuizFlow`
    /// (spec.md §4.4 "Input"), drawing master questions from the
    /// `ProfileQuestionRepository` collaborator.
    pub async fn build_quiz_program(&self) -> EngineResult<Vec<QuizProgramEntry>> {
        self.phase.read().await.require(&[Phase::InGame])?;
        let teams = self.quest_room.teams().await;
        let questions = self
            .collaborators
            .questions
            .fetch_all_questions()
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        let pool: Vec<_> = questions.into_iter().map(|q| (q.question_id, q.question_text)).collect();
        Ok(quiz_flow::build_program(&teams, &pool))
    }

    pub fn quiz_builder(&self) -> Arc<dyn QuizBuilder> {
        self.collaborators.quiz_builder.clone()
    }

    pub fn quest_room(&self) -> &QuestRoom {
        &self.quest_room
    }

    // ---- C5 + C.4/C.5: stats ------------------------------------------------

    pub async fn get_all_stats(&self) -> EngineResult<AllStats> {
        self.phase.read().await.require(&[Phase::Result])?;
        let teams = self.quest_room.teams().await;
        let user_team: HashMap<UserId, TeamId> =
            teams.iter().flat_map(|(t, ms)| ms.iter().map(move |u| (*u, *t))).collect();
        let team_members: HashMap<TeamId, usize> = teams.iter().map(|(t, ms)| (*t, ms.len())).collect();

        Ok(get_all_stats(
            &self.quest_room.personal_stats_snapshot(),
            &self.quest_room.team_stats_snapshot(),
            self.quest_room.quiz_count(),
            self.team_count,
            &user_team,
            &team_members,
        ))
    }

    pub async fn get_result_stats(
        &self,
        user: UserId,
        team: TeamId,
        mapper: Option<&dyn Fn(f32) -> ResultState>,
    ) -> EngineResult<ResultStats> {
        self.phase.read().await.require(&[Phase::Result])?;
        Ok(get_result_stats(
            &self.quest_room.personal_stats_snapshot(),
            &self.quest_room.team_stats_snapshot(),
            self.quest_room.quiz_count(),
            user,
            team,
            mapper,
        ))
    }

    /// Issues one write against the write-serialized database front
    /// (SPEC_FULL.md §A.6), a thin pass-through the engine uses for the
    /// bulk-persistence hook in `close_lobby`.
    pub async fn write_through(&self, table: &'static str, method: WriteMethod, params: HashMap<&'static str, String>) -> EngineResult<()> {
        self.collaborators
            .database
            .write(WriteRequest { table, method, params })
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))
    }
}

/// Outcome of `Reconnect` (SPEC_FULL.md §C.1) — which path the guest
/// re-attached through.
pub enum ReconnectOutcome {
    RejoinedLobby,
    RejoinedQuestRoom(tokio::sync::mpsc::Receiver<Quiz>, CancellationContext),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{
        InMemoryDatabase, InMemoryProfileQuestionRepository, InMemoryQuizBuilder,
        InMemoryUserImageRepository, InMemoryUserProfileRepository, InMemoryUserRepository,
    };

    fn manager(team_count: u32) -> GameManager {
        let images = Arc::new(InMemoryUserImageRepository::new());
        let profiles = Arc::new(InMemoryUserProfileRepository::new());
        let quiz_builder = Arc::new(InMemoryQuizBuilder::new(images.clone(), profiles.clone()));
        GameManager::new(
            team_count,
            Collaborators {
                users: Arc::new(InMemoryUserRepository::new()),
                images,
                profiles,
                questions: Arc::new(InMemoryProfileQuestionRepository::new(vec![])),
                quiz_builder,
                database: Arc::new(InMemoryDatabase::new()),
            },
        )
    }

    #[tokio::test]
    async fn join_lobby_before_open_lobby_is_wrong_phase() {
        let gm = manager(2);
        let err = gm.join_lobby(UserId::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::WrongPhase { .. }));
    }

    #[tokio::test]
    async fn full_phase_walk_reaches_result() {
        let gm = manager(2);
        gm.open_lobby().await.unwrap();

        let users: Vec<UserId> = (0..6).map(|_| UserId::new_v4()).collect();
        for u in &users {
            gm.collaborators
                .users
                .save(UserRecord {
                    user_id: *u,
                    name: "p".into(),
                    access_token: "t".into(),
                    team_id: None,
                    rejected: false,
                    version: 0,
                })
                .await
                .unwrap();
            gm.join_lobby(*u).await.unwrap();
            gm.set_ready(*u, true).await.unwrap();
        }

        gm.close_lobby().await.unwrap();
        assert_eq!(gm.phase().await, Phase::Closed);

        gm.notify_lobby_closed().await.unwrap();
        gm.quest_start().await.unwrap();
        assert_eq!(gm.phase().await, Phase::InGame);

        gm.end_quest().await.unwrap();
        assert_eq!(gm.phase().await, Phase::Result);

        let stats = gm.get_all_stats().await.unwrap();
        assert_eq!(stats.personal.len(), 0);
    }

    #[tokio::test]
    async fn close_lobby_rejects_when_a_user_is_not_ready() {
        let gm = manager(2);
        gm.open_lobby().await.unwrap();
        let user = UserId::new_v4();
        gm.join_lobby(user).await.unwrap();
        let err = gm.close_lobby().await.unwrap_err();
        assert!(matches!(err, EngineError::NotReady(_)));
    }

    #[tokio::test]
    async fn close_lobby_rejects_teams_below_minimum_size() {
        let gm = manager(3);
        gm.open_lobby().await.unwrap();
        for _ in 0..3 {
            let u = UserId::new_v4();
            gm.join_lobby(u).await.unwrap();
            gm.set_ready(u, true).await.unwrap();
        }
        let err = gm.close_lobby().await.unwrap_err();
        assert!(matches!(err, EngineError::TeamTooSmall { .. }));
        assert_eq!(gm.phase().await, Phase::Accepting);
    }

    #[tokio::test]
    async fn register_profile_reports_the_next_master_question() {
        let q1 = crate::engine::types::QuestionId::new_v4();
        let q2 = crate::engine::types::QuestionId::new_v4();
        let questions = vec![
            collaborators::ProfileQuestion { question_id: q1, question_text: "favorite color?".into() },
            collaborators::ProfileQuestion { question_id: q2, question_text: "favorite food?".into() },
        ];

        let images = Arc::new(crate::engine::memory::InMemoryUserImageRepository::new());
        let profiles = Arc::new(crate::engine::memory::InMemoryUserProfileRepository::new());
        let quiz_builder =
            Arc::new(crate::engine::memory::InMemoryQuizBuilder::new(images.clone(), profiles.clone()));
        let gm = GameManager::new(
            2,
            Collaborators {
                users: Arc::new(crate::engine::memory::InMemoryUserRepository::new()),
                images,
                profiles,
                questions: Arc::new(crate::engine::memory::InMemoryProfileQuestionRepository::new(
                    questions,
                )),
                quiz_builder,
                database: Arc::new(crate::engine::memory::InMemoryDatabase::new()),
            },
        );

        let user = UserId::new_v4();
        let outcome = gm.register_profile(user, q1, "blue".into()).await.unwrap();
        assert_eq!(outcome.next_question_id, Some(q2));
        assert!(!outcome.no_more_questions);

        let outcome = gm.register_profile(user, q2, "pizza".into()).await.unwrap();
        assert_eq!(outcome.next_question_id, None);
        assert!(outcome.no_more_questions);
        assert_eq!(outcome.next_question_text, crate::engine::types::NO_MORE_QUESTIONS_TEXT);
    }

    #[tokio::test]
    async fn register_profile_rejects_overlong_answer() {
        let gm = manager(2);
        let err = gm
            .register_profile(UserId::new_v4(), crate::engine::types::QuestionId::new_v4(), "x".repeat(31))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PayloadTooLong { .. }));
    }
}
