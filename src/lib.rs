#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Quest Room Engine
//!
//! The state machine and concurrency core for a real-time multiplayer quiz
//! game: lobby formation, team assignment, per-question broadcast/collect
//! rounds, hints, and stats — in-memory, with no transport or database
//! surface of its own (those are non-goals; see `engine::collaborators`
//! for the seams a real deployment would plug into).

/// Admin token check and constant-time secret comparison.
pub mod auth;

/// Layered configuration (defaults, file, env var overrides).
pub mod config;

/// The game state machine: lobby, teams, quiz rounds, stats.
pub mod engine;

/// Domain error types.
pub mod error;

/// Structured logging configuration.
pub mod logging;

/// Ambient metrics (tick-broadcast latency, collection duration).
pub mod metrics;
