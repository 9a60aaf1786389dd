use thiserror::Error;

/// Errors surfaced by the `GameManager` and its subsystems.
///
/// `NotReady` and `TeamTooSmall` are additions beyond the core seven kinds:
/// they guard the `CloseLobby` preconditions described in `SPEC_FULL.md`
/// §C.2 and are kept distinct from `WrongPhase` so callers can tell "you
/// called this in the wrong phase" apart from "the phase is right but the
/// lobby isn't ready to close yet".
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("operation not legal in phase {current:?}")]
    WrongPhase { current: crate::engine::Phase },

    #[error("user {0} has no active connection")]
    NotConnected(crate::engine::types::UserId),

    #[error("hint submitted by a user other than the current target")]
    TargetMismatch,

    #[error("hint exceeds the maximum length of {max} codepoints")]
    PayloadTooLong { max: usize },

    #[error("operation timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    Internal(String),

    /// Not one of the core seven — see SPEC_FULL.md §C.2. `CloseLobby`
    /// rejects with this when a joined user has not flagged itself ready.
    #[error("user {0} is not ready")]
    NotReady(crate::engine::types::UserId),

    /// SPEC_FULL.md §C.2 / §C.3 — a team would drop below the configured
    /// minimum size.
    #[error("team {team} would have fewer than {min} members")]
    TeamTooSmall { team: crate::engine::types::TeamId, min: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;
