//! Root `EngineConfig` (SPEC_FULL.md §B.3), the engine's actual knobs
//! scaled down from the teacher's `config/types.rs` root `Config` the same
//! way `config/server.rs` once held `ServerConfig`.

use super::defaults::{
    default_access_path_len, default_admin_token, default_broadcast_timeout_secs,
    default_collect_timeout_secs, default_distribute_timeout_secs, default_hint_timeout_secs,
    default_hint_time_bonus, default_initial_remaining_time, default_max_choice_count,
    default_max_failed_tick_count, default_max_hint_len, default_min_team_size,
    default_next_quiz_timeout_secs, default_player_count, default_question_window_secs,
    default_require_admin_auth, default_team_count,
};
use super::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// The engine's runtime knobs (SPEC_FULL.md §B.3). Every field has a
/// `#[serde(default = ...)]` backed by `config::defaults`, mirroring the
/// teacher's `ServerConfig`/`Config` pattern.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// `N` — total players (SPEC_FULL.md §A.6).
    #[serde(default = "default_player_count")]
    pub player_count: u32,
    /// `T` — team count.
    #[serde(default = "default_team_count")]
    pub team_count: u32,
    /// Initial per-question countdown before any hint bonus, seconds.
    #[serde(default = "default_question_window_secs")]
    pub question_window_secs: u64,
    #[serde(default = "default_hint_timeout_secs")]
    pub hint_timeout_secs: u64,
    #[serde(default = "default_collect_timeout_secs")]
    pub collect_timeout_secs: u64,
    #[serde(default = "default_broadcast_timeout_secs")]
    pub broadcast_timeout_secs: u64,
    #[serde(default = "default_next_quiz_timeout_secs")]
    pub next_quiz_timeout_secs: u64,
    #[serde(default = "default_distribute_timeout_secs")]
    pub distribute_timeout_secs: u64,
    /// Hint payload cap, in codepoints.
    #[serde(default = "default_max_hint_len")]
    pub max_hint_len: usize,
    /// `MaxFailedCount` — consecutive `onTick` failures tolerated before
    /// `failedCallback` fires.
    #[serde(default = "default_max_failed_tick_count")]
    pub max_failed_tick_count: u32,
    /// `MinTeamUser` — `CloseLobby` rejects a split leaving any team below
    /// this size (SPEC_FULL.md §C.2).
    #[serde(default = "default_min_team_size")]
    pub min_team_size: usize,
    #[serde(default = "default_max_choice_count")]
    pub max_choice_count: usize,
    #[serde(default = "default_initial_remaining_time")]
    pub initial_remaining_time: i32,
    #[serde(default = "default_hint_time_bonus")]
    pub hint_time_bonus: i32,
    /// Length of the random base64url admin/guest access-path prefix
    /// (SPEC_FULL.md §A.6) — generated by the transport, not this crate;
    /// kept here so `main.rs` can illustrate it end to end.
    #[serde(default = "default_access_path_len")]
    pub access_path_len: usize,
    /// Whether admin-surface calls require `admin_token` to match
    /// (resolves the admin-check open question, SPEC_FULL.md §A.9/§B.3).
    #[serde(default = "default_require_admin_auth")]
    pub require_admin_auth: bool,
    /// Shared admin secret, compared constant-time by `auth::require_admin`.
    #[serde(default = "default_admin_token")]
    pub admin_token: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            player_count: default_player_count(),
            team_count: default_team_count(),
            question_window_secs: default_question_window_secs(),
            hint_timeout_secs: default_hint_timeout_secs(),
            collect_timeout_secs: default_collect_timeout_secs(),
            broadcast_timeout_secs: default_broadcast_timeout_secs(),
            next_quiz_timeout_secs: default_next_quiz_timeout_secs(),
            distribute_timeout_secs: default_distribute_timeout_secs(),
            max_hint_len: default_max_hint_len(),
            max_failed_tick_count: default_max_failed_tick_count(),
            min_team_size: default_min_team_size(),
            max_choice_count: default_max_choice_count(),
            initial_remaining_time: default_initial_remaining_time(),
            hint_time_bonus: default_hint_time_bonus(),
            access_path_len: default_access_path_len(),
            require_admin_auth: default_require_admin_auth(),
            admin_token: default_admin_token(),
            logging: LoggingConfig::default(),
        }
    }
}
