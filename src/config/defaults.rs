//! Default value functions for `EngineConfig` fields (SPEC_FULL.md §B.3).
//!
//! One small `const`/plain-fn default per field, the way the teacher's
//! `config/defaults.rs` backs every `#[serde(default = "...")]` attribute.

use super::logging::LogFormat;

pub const fn default_player_count() -> u32 {
    6
}

pub const fn default_team_count() -> u32 {
    2
}

pub const fn default_question_window_secs() -> u64 {
    15
}

pub const fn default_hint_timeout_secs() -> u64 {
    2
}

pub const fn default_collect_timeout_secs() -> u64 {
    5
}

pub const fn default_broadcast_timeout_secs() -> u64 {
    1
}

pub const fn default_next_quiz_timeout_secs() -> u64 {
    1
}

pub const fn default_distribute_timeout_secs() -> u64 {
    1
}

pub const fn default_max_hint_len() -> usize {
    30
}

pub const fn default_max_failed_tick_count() -> u32 {
    3
}

pub const fn default_min_team_size() -> usize {
    3
}

pub const fn default_max_choice_count() -> usize {
    4
}

pub const fn default_initial_remaining_time() -> i32 {
    15
}

pub const fn default_hint_time_bonus() -> i32 {
    10
}

pub const fn default_access_path_len() -> usize {
    6
}

pub const fn default_require_admin_auth() -> bool {
    true
}

pub fn default_admin_token() -> String {
    String::new()
}

// =============================================================================
// Logging defaults (reused by the nested `LoggingConfig`)
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "questroom-engine.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
