//! C2 — Lobby: the pre-game holding area (spec.md §4.2), plus the
//! CloseLobby preconditions and readiness tracking from SPEC_FULL.md §C.2.

use crate::engine::cancellation::CancellationContext;
use crate::engine::types::{TeamId, UserId};
use crate::error::{EngineError, EngineResult};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Tracks joined users, their readiness, and an optional soft team
/// preference (SPEC_FULL.md §C.3) ahead of `SplitTeams`.
pub struct Lobby {
    users: RwLock<Vec<UserId>>,
    ready: RwLock<HashSet<UserId>>,
    preferred_team: RwLock<HashMap<UserId, TeamId>>,
    ctx: CancellationContext,
}

impl Lobby {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            ready: RwLock::new(HashSet::new()),
            preferred_team: RwLock::new(HashMap::new()),
            ctx: CancellationContext::new(),
        }
    }

    /// Replaces the lobby's cancellation context with a fresh one — called
    /// when a new lobby opens after a previous game's teardown, so
    /// readiness and the cancellation signal do not leak across games.
    pub async fn reset(&self) {
        self.users.write().await.clear();
        self.ready.write().await.clear();
        self.preferred_team.write().await.clear();
    }

    pub fn cancellation_context(&self) -> CancellationContext {
        self.ctx.clone()
    }

    pub fn notify_closed(&self) {
        self.ctx.cancel();
    }

    /// `Join(u)` — appends `u` if not already present. Re-join is
    /// undefined per spec.md §4.2; the caller is expected to prevent it.
    pub async fn join(&self, user: UserId) {
        let mut users = self.users.write().await;
        if !users.contains(&user) {
            users.push(user);
        }
    }

    /// `Disconnect(u)` — removes `u`, preserving the order of others.
    pub async fn disconnect(&self, user: UserId) {
        let mut users = self.users.write().await;
        users.retain(|u| *u != user);
        self.ready.write().await.remove(&user);
        self.preferred_team.write().await.remove(&user);
    }

    /// `GetLobbyUsers()` — a defensive copy.
    pub async fn users(&self) -> Vec<UserId> {
        self.users.read().await.clone()
    }

    pub async fn set_ready(&self, user: UserId, ready: bool) {
        let mut set = self.ready.write().await;
        if ready {
            set.insert(user);
        } else {
            set.remove(&user);
        }
    }

    pub async fn set_preferred_team(&self, user: UserId, team: TeamId) {
        self.preferred_team.write().await.insert(user, team);
    }

    pub async fn preferred_teams(&self) -> HashMap<UserId, TeamId> {
        self.preferred_team.read().await.clone()
    }

    /// Returns `Ok(())` iff every joined user has flagged itself ready.
    /// Grounded in the original `close_entry_usecase.go`'s all-ready gate
    /// (SPEC_FULL.md §C.2).
    pub async fn require_all_ready(&self) -> EngineResult<()> {
        let users = self.users.read().await;
        let ready = self.ready.read().await;
        for user in users.iter() {
            if !ready.contains(user) {
                return Err(EngineError::NotReady(*user));
            }
        }
        Ok(())
    }
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new()
    }
}
