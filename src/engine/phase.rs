//! C1 — SessionState: the phase enum and legal transitions (spec.md §4.1).

use crate::error::{EngineError, EngineResult};

/// The engine's current mode.
///
/// Transitions are monotonic: `Initialized -> Accepting -> Closed ->
/// InGame -> Result`, with `Accepting -> Accepting` and `Closed -> Closed`
/// tolerated as idempotent re-calls of `OpenLobby`/`CloseLobby`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initialized,
    Accepting,
    Closed,
    InGame,
    Result,
}

impl Phase {
    /// Checks `self` is one of `allowed`, returning `WrongPhase` otherwise.
    pub fn require(self, allowed: &[Phase]) -> EngineResult<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(EngineError::WrongPhase { current: self })
        }
    }
}
