//! C3 — QuestRoom: connections, quiz fan-out, per-team answer collection,
//! hint channel, next-quiz signal, and running stats (spec.md §4.3).
//!
//! Channel ownership mirrors `src/server.rs`'s `InMemoryMessageCoordinator`:
//! each sink has exactly one creator (`connect`/`prepare_for_game`) and one
//! closer (a later `connect` for the same user, or the `QuestRoom` itself
//! going away). Broadcast fan-out borrows the non-blocking
//! `try_send`-then-`warn!` delivery policy from that same file, and the
//! `SmallVec`-backed member list mirrors `src/broadcast.rs`'s
//! `PlayerIdList`.

use crate::engine::cancellation::CancellationContext;
use crate::engine::types::{AnswerBundle, Choice, MemberList, Quiz, QuizResult, TeamId, UserId};
use crate::error::{EngineError, EngineResult};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};

const QUIZ_SINK_CAPACITY: usize = 1;
const BROADCAST_TIMEOUT: Duration = Duration::from_secs(1);
const COLLECT_TIMEOUT: Duration = Duration::from_secs(5);
const DISTRIBUTE_TIMEOUT: Duration = Duration::from_secs(1);
const HINT_TIMEOUT: Duration = Duration::from_secs(2);
const NEXT_QUIZ_TIMEOUT: Duration = Duration::from_secs(1);

struct ConnectionEntry {
    sink: mpsc::Sender<Quiz>,
}

struct TeamChannels {
    answer_tx: mpsc::Sender<Choice>,
    answer_rx: Mutex<mpsc::Receiver<Choice>>,
    capacity: usize,
}

struct CurrentQuiz {
    target: UserId,
    correct: Choice,
}

pub struct QuestRoom {
    teams: RwLock<HashMap<TeamId, MemberList>>,
    connections: DashMap<UserId, ConnectionEntry>,
    answer_inbox: RwLock<HashMap<TeamId, TeamChannels>>,
    answer_outbox: DashMap<UserId, mpsc::Sender<AnswerBundle>>,
    answer_outbox_rx: DashMap<UserId, Mutex<mpsc::Receiver<AnswerBundle>>>,
    hint_tx: RwLock<Option<mpsc::Sender<String>>>,
    next_quiz_tx: RwLock<Option<mpsc::Sender<()>>>,
    current: RwLock<Option<CurrentQuiz>>,
    quiz_count: AtomicU32,
    team_stats: DashMap<TeamId, u32>,
    personal_stats: DashMap<UserId, u32>,
    ctx: CancellationContext,
}

impl QuestRoom {
    pub fn new() -> Self {
        Self {
            teams: RwLock::new(HashMap::new()),
            connections: DashMap::new(),
            answer_inbox: RwLock::new(HashMap::new()),
            answer_outbox: DashMap::new(),
            answer_outbox_rx: DashMap::new(),
            hint_tx: RwLock::new(None),
            next_quiz_tx: RwLock::new(None),
            current: RwLock::new(None),
            quiz_count: AtomicU32::new(0),
            team_stats: DashMap::new(),
            personal_stats: DashMap::new(),
            ctx: CancellationContext::new(),
        }
    }

    pub fn cancellation_context(&self) -> CancellationContext {
        self.ctx.clone()
    }

    pub fn quiz_count(&self) -> u32 {
        self.quiz_count.load(Ordering::SeqCst)
    }

    /// `SplitTeams(users, T)` — shuffles uniformly, assigns user at index
    /// `i` to team `(i mod T) + 1`. Keyed 1..=T consistently (see
    /// `engine::types::TeamId` doc comment and `DESIGN.md`).
    pub async fn split_teams(&self, users: &[UserId], team_count: u32) -> HashMap<UserId, TeamId> {
        self.split_teams_with_preferences(users, team_count, &HashMap::new()).await
    }

    /// `SplitTeams` honoring SPEC_FULL.md §C.3's soft `ChangeTeam`
    /// preference: a user whose preferred team still has room at the
    /// ceil(N/T) cap is seated there; everyone else (and any preference
    /// that would overflow its team) falls back to the uniform shuffle.
    /// `CloseLobby` calls this variant; bare `split_teams` (used directly by
    /// most tests) is the same algorithm with no preferences supplied.
    pub async fn split_teams_with_preferences(
        &self,
        users: &[UserId],
        team_count: u32,
        preferred: &HashMap<UserId, TeamId>,
    ) -> HashMap<UserId, TeamId> {
        let capacity = (users.len() as u32).div_ceil(team_count.max(1)) as usize;

        let mut shuffled = users.to_vec();
        shuffled.shuffle(&mut rand::rng());

        let mut teams: HashMap<TeamId, MemberList> = HashMap::new();
        let mut assignment = HashMap::new();
        let mut leftover = Vec::new();

        for user in shuffled {
            match preferred.get(&user) {
                Some(&team_id) if (1..=team_count).contains(&team_id) => {
                    let members = teams.entry(team_id).or_default();
                    if members.len() < capacity {
                        members.push(user);
                        assignment.insert(user, team_id);
                        continue;
                    }
                    leftover.push(user);
                }
                _ => leftover.push(user),
            }
        }

        let mut next_team: u32 = 1;
        for user in leftover {
            loop {
                let members = teams.entry(next_team).or_default();
                if members.len() < capacity {
                    members.push(user);
                    assignment.insert(user, next_team);
                    next_team = next_team % team_count + 1;
                    break;
                }
                next_team = next_team % team_count + 1;
            }
        }

        *self.teams.write().await = teams;
        assignment
    }

    pub async fn teams(&self) -> HashMap<TeamId, MemberList> {
        self.teams.read().await.clone()
    }

    /// `QuestStart()`'s lazy channel creation — one bounded inbox per team
    /// sized to that team's membership, one bounded (size 1) outbox per
    /// member.
    pub async fn prepare_for_game(&self) {
        let teams = self.teams.read().await.clone();
        let mut inbox = self.answer_inbox.write().await;
        inbox.clear();
        for (team_id, members) in &teams {
            let capacity = members.len().max(1);
            let (tx, rx) = mpsc::channel(capacity);
            inbox.insert(
                *team_id,
                TeamChannels {
                    answer_tx: tx,
                    answer_rx: Mutex::new(rx),
                    capacity,
                },
            );
        }

        self.answer_outbox.clear();
        self.answer_outbox_rx.clear();
        for members in teams.values() {
            for user in members {
                let (tx, rx) = mpsc::channel(1);
                self.answer_outbox.insert(*user, tx);
                self.answer_outbox_rx.insert(*user, Mutex::new(rx));
            }
        }

        self.quiz_count.store(0, Ordering::SeqCst);
        self.team_stats.clear();
        self.personal_stats.clear();
    }

    /// `Connect(u)` — replaces any existing sink for `u`, closing the old
    /// one (dropping its sender closes the paired receiver on the guest's
    /// side, which is exactly the "first stream closes" behavior of S6).
    pub fn connect(&self, user: UserId) -> (mpsc::Receiver<Quiz>, CancellationContext) {
        let (tx, rx) = mpsc::channel(QUIZ_SINK_CAPACITY);
        self.connections.insert(user, ConnectionEntry { sink: tx });
        (rx, self.ctx.clone())
    }

    /// `Broadcast(target, quiz, correct)` — non-blocking per-recipient
    /// delivery; a slow or absent recipient is dropped, never blocking the
    /// admin loop for more than `BROADCAST_TIMEOUT` total (spec.md §4.3.3:
    /// "Broadcast MUST NOT block the admin loop on any single guest"). Fans
    /// out every recipient's bounded send concurrently, mirroring the
    /// original `PublishQuiz`'s one-goroutine-per-connection fan-out, so N
    /// slow guests cost ~1s total rather than ~N seconds.
    pub async fn broadcast(&self, target: UserId, quiz: Quiz, correct: Choice) {
        *self.current.write().await = Some(CurrentQuiz { target, correct });

        let sends = self.connections.iter().map(|entry| {
            let user = *entry.key();
            let sink = entry.value().sink.clone();
            let quiz = quiz.clone();
            async move {
                match tokio::time::timeout(BROADCAST_TIMEOUT, sink.send(quiz)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        tracing::warn!(%user, "broadcast: recipient sink closed, dropping");
                    }
                    Err(_) => {
                        tracing::warn!(%user, "broadcast: recipient slow, dropping this tick");
                    }
                }
            }
        });

        futures_util::future::join_all(sends).await;
    }

    fn current_target(&self, current: &Option<CurrentQuiz>) -> Option<UserId> {
        current.as_ref().map(|c| c.target)
    }

    /// `Answer(teamId, userId, choice)`.
    pub async fn answer(
        &self,
        team: TeamId,
        user: UserId,
        choice: Choice,
    ) -> EngineResult<AnswerBundle> {
        {
            let inbox = self.answer_inbox.read().await;
            let channels = inbox
                .get(&team)
                .ok_or_else(|| EngineError::Internal(format!("no answer inbox for team {team}")))?;
            channels
                .answer_tx
                .send(choice)
                .await
                .map_err(|_| EngineError::Cancelled)?;
        }

        let rx_entry = self
            .answer_outbox_rx
            .get(&user)
            .ok_or(EngineError::NotConnected(user))?;
        let mut rx = rx_entry.lock().await;
        rx.recv().await.ok_or(EngineError::Cancelled)
    }

    /// `UpdatePersonalStats(userId, choice)`. Returns the `QuizResult`
    /// (spec.md §3) for this submission so the caller can surface
    /// correctness back to the guest, the way `answer_usecase.go` builds
    /// `Result{Answer, IsCorrect}` from `Answer`'s returned `currentAnswer`.
    pub async fn update_personal_stats(&self, user: UserId, choice: Choice) -> QuizResult {
        let current = self.current.read().await;
        let is_correct = current.as_ref().is_some_and(|c| c.correct.choice_id == choice.choice_id);
        if is_correct {
            *self.personal_stats.entry(user).or_insert(0) += 1;
        }
        QuizResult { answer: choice, is_correct }
    }

    /// `CollectAnswer()` — concurrent, per-team, hard-bounded collection
    /// with plurality resolution and uniform-random tie-break.
    pub async fn collect_answers(
        &self,
    ) -> (HashMap<TeamId, Choice>, HashMap<TeamId, HashMap<u32, u32>>) {
        let team_ids: Vec<TeamId> = { self.teams.read().await.keys().copied().collect() };

        let mut team_results = HashMap::new();
        let mut per_team_counts = HashMap::new();

        let futures = team_ids.into_iter().map(|team_id| self.collect_one_team(team_id));
        let results = futures_util::future::join_all(futures).await;

        for (team_id, maybe_choice, counts) in results {
            per_team_counts.insert(team_id, counts);
            if let Some(choice) = maybe_choice {
                team_results.insert(team_id, choice);
            }
        }

        (team_results, per_team_counts)
    }

    async fn collect_one_team(
        &self,
        team_id: TeamId,
    ) -> (TeamId, Option<Choice>, HashMap<u32, u32>) {
        let capacity = {
            let inbox = self.answer_inbox.read().await;
            match inbox.get(&team_id) {
                Some(channels) => channels.capacity,
                None => return (team_id, None, HashMap::new()),
            }
        };

        let mut collected: Vec<Choice> = Vec::with_capacity(capacity);
        let deadline = tokio::time::Instant::now() + COLLECT_TIMEOUT;

        while collected.len() < capacity {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            let inbox = self.answer_inbox.read().await;
            let channels = match inbox.get(&team_id) {
                Some(c) => c,
                None => break,
            };
            let mut rx = channels.answer_rx.lock().await;

            tokio::select! {
                _ = self.ctx.cancelled() => break,
                _ = tokio::time::sleep(remaining) => break,
                maybe_choice = rx.recv() => {
                    match maybe_choice {
                        Some(choice) => collected.push(choice),
                        None => break,
                    }
                }
            }
        }

        let counts = tally(&collected);
        let winner = plurality_winner(&counts);
        let team_answer = winner.and_then(|winning_id| {
            collected.iter().find(|c| c.choice_id == winning_id).cloned()
        });

        (team_id, team_answer, counts)
    }

    /// `UpdateTeamStats(teamResults)`. Seeds every known team/member with a
    /// zero count on the first completed quiz so a team that never answers
    /// still surfaces with `CorrectRate 0` in `GetAllStats` instead of being
    /// absent from the map entirely (spec.md §8 S3).
    pub async fn update_team_stats(&self, team_results: &HashMap<TeamId, Choice>) {
        self.quiz_count.fetch_add(1, Ordering::SeqCst);
        let teams = self.teams.read().await;
        for team_id in teams.keys() {
            self.team_stats.entry(*team_id).or_insert(0);
        }
        for members in teams.values() {
            for user in members {
                self.personal_stats.entry(*user).or_insert(0);
            }
        }
        drop(teams);

        let current = self.current.read().await;
        let Some(current) = current.as_ref() else {
            return;
        };
        for (team_id, choice) in team_results {
            if choice.choice_id == current.correct.choice_id {
                *self.team_stats.entry(*team_id).or_insert(0) += 1;
            }
        }
    }

    /// `DistributeAnswer(teamResults, perTeamCounts)`.
    pub async fn distribute_answers(
        &self,
        team_results: &HashMap<TeamId, Choice>,
        per_team_counts: &HashMap<TeamId, HashMap<u32, u32>>,
    ) {
        let teams = self.teams.read().await.clone();
        for (team_id, members) in &teams {
            let Some(team_answer) = team_results.get(team_id) else {
                continue;
            };
            let counts = per_team_counts.get(team_id).cloned().unwrap_or_default();
            let bundle = AnswerBundle {
                team_answer: team_answer.clone(),
                answer_counts: counts,
            };

            for user in members {
                let Some(tx) = self.answer_outbox.get(user).map(|e| e.value().clone()) else {
                    continue;
                };
                let bundle = bundle.clone();
                match tokio::time::timeout(DISTRIBUTE_TIMEOUT, tx.send(bundle)).await {
                    Ok(Ok(())) => {}
                    _ => tracing::warn!(%user, "distribute_answers: drop, recipient gone"),
                }
            }
        }
    }

    /// Creates a fresh rendezvous pair for the hint channel and the
    /// next-quiz signal ahead of one quiz iteration. Called by `QuizFlow`.
    pub async fn begin_quiz_signals(&self) -> (mpsc::Receiver<String>, mpsc::Receiver<()>) {
        let (hint_tx, hint_rx) = mpsc::channel(1);
        let (next_tx, next_rx) = mpsc::channel(1);
        *self.hint_tx.write().await = Some(hint_tx);
        *self.next_quiz_tx.write().await = Some(next_tx);
        (hint_rx, next_rx)
    }

    /// `TakeHint(u, hint)`.
    pub async fn take_hint(&self, user: UserId, hint: String) -> EngineResult<()> {
        if hint.chars().count() > 30 {
            return Err(EngineError::PayloadTooLong { max: 30 });
        }

        let target = { self.current_target(&*self.current.read().await) };
        if target != Some(user) {
            return Err(EngineError::TargetMismatch);
        }

        let tx = {
            self.hint_tx
                .read()
                .await
                .clone()
                .ok_or_else(|| EngineError::Internal("no hint channel for current quiz".into()))?
        };

        tokio::time::timeout(HINT_TIMEOUT, tx.send(hint))
            .await
            .map_err(|_| EngineError::Timeout("hint delivery"))?
            .map_err(|_| EngineError::Cancelled)
    }

    /// `NextQuiz()`.
    pub async fn next_quiz(&self) -> EngineResult<()> {
        let tx = {
            self.next_quiz_tx
                .read()
                .await
                .clone()
                .ok_or_else(|| EngineError::Internal("no next-quiz channel registered".into()))?
        };

        tokio::time::timeout(NEXT_QUIZ_TIMEOUT, tx.send(()))
            .await
            .map_err(|_| EngineError::Timeout("next-quiz signal"))?
            .map_err(|_| EngineError::Cancelled)
    }

    pub fn team_stats_snapshot(&self) -> HashMap<TeamId, u32> {
        self.team_stats.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    pub fn personal_stats_snapshot(&self) -> HashMap<UserId, u32> {
        self.personal_stats.iter().map(|e| (*e.key(), *e.value())).collect()
    }
}

impl Default for QuestRoom {
    fn default() -> Self {
        Self::new()
    }
}

fn tally(choices: &[Choice]) -> HashMap<u32, u32> {
    let mut counts = HashMap::new();
    for choice in choices {
        *counts.entry(choice.choice_id).or_insert(0) += 1;
    }
    counts
}

/// Plurality winner with uniform-random tie-break among the ids sharing
/// the max count (spec.md §4.3.5, step 2-3). Zero-count ids never win.
fn plurality_winner(counts: &HashMap<u32, u32>) -> Option<u32> {
    let max_count = counts.values().copied().max()?;
    if max_count == 0 {
        return None;
    }

    let mut winners: Vec<u32> = counts
        .iter()
        .filter(|(_, &count)| count == max_count)
        .map(|(&id, _)| id)
        .collect();
    winners.sort_unstable();
    winners.shuffle(&mut rand::rng());
    winners.into_iter().next()
}
