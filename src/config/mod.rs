//! Configuration module for the quest room engine.
//!
//! Provides layered configuration with support for:
//! - JSON configuration files
//! - Environment variable overrides (`QUESTROOM__FIELD`, `QUESTROOM__LOGGING__LEVEL`, ...)
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`types`]: Root `EngineConfig` struct
//! - [`logging`]: Logging configuration
//! - [`loader`]: Configuration loading functions
//! - [`validation`]: Configuration validation functions
//! - [`defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use types::EngineConfig;
pub use validation::{is_production_mode, validate};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults_match_spec() {
        let config = EngineConfig::default();

        assert_eq!(config.player_count, 6);
        assert_eq!(config.team_count, 2);
        assert_eq!(config.question_window_secs, 15);
        assert_eq!(config.hint_timeout_secs, 2);
        assert_eq!(config.collect_timeout_secs, 5);
        assert_eq!(config.max_hint_len, 30);
        assert_eq!(config.min_team_size, 3);
        assert_eq!(config.max_choice_count, 4);
        assert_eq!(config.hint_time_bonus, 10);

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "questroom-engine.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn engine_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.player_count, deserialized.player_count);
        assert_eq!(config.team_count, deserialized.team_count);
        assert_eq!(config.max_choice_count, deserialized.max_choice_count);
    }

    #[test]
    fn log_level_display_matches_as_str() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}
