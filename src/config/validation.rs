//! Configuration validation (SPEC_FULL.md §B.3).
//!
//! Grounded in the teacher's `config/validation.rs` pattern: a single
//! `validate()` function that rejects nonsensical knobs outright, plus the
//! production-mode probe used to decide how loudly to warn.

use super::EngineConfig;

/// Rejects `team_count < 2`, `player_count` too small to seat
/// `min_team_size * team_count` players, and (directly resolving the
/// admin-check open question, SPEC_FULL.md §A.9) an empty `admin_token`
/// when `require_admin_auth` is set.
pub fn validate(config: &EngineConfig) -> anyhow::Result<()> {
    if config.team_count < 2 {
        anyhow::bail!("team_count must be at least 2, got {}", config.team_count);
    }

    let min_players = config.min_team_size as u32 * config.team_count;
    if config.player_count < min_players {
        anyhow::bail!(
            "player_count ({}) is too small for {} teams of at least {} members each (needs >= {})",
            config.player_count,
            config.team_count,
            config.min_team_size,
            min_players
        );
    }

    if config.require_admin_auth && config.admin_token.trim().is_empty() {
        anyhow::bail!(
            "require_admin_auth is true but admin_token is empty; set QUESTROOM__ADMIN_TOKEN"
        );
    }

    if config.max_choice_count == 0 {
        anyhow::bail!("max_choice_count must be at least 1");
    }

    if config.access_path_len < 4 {
        anyhow::bail!("access_path_len must be at least 4, got {}", config.access_path_len);
    }

    Ok(())
}

/// Detects production mode via `QUESTROOM__ENVIRONMENT` or the generic
/// `PRODUCTION`/`PROD` environment variables, the way the teacher's
/// `is_production_mode` does.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("QUESTROOM__ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }

    env::var("QUESTROOM_PRODUCTION").is_ok() || env::var("PRODUCTION").is_ok() || env::var("PROD").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_with_a_token_validates() {
        let mut cfg = EngineConfig::default();
        cfg.admin_token = "secret".into();
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn rejects_single_team() {
        let mut cfg = EngineConfig::default();
        cfg.team_count = 1;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_too_few_players_for_team_shape() {
        let mut cfg = EngineConfig::default();
        cfg.player_count = 2;
        cfg.team_count = 2;
        cfg.min_team_size = 3;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_empty_admin_token_when_required() {
        let mut cfg = EngineConfig::default();
        cfg.require_admin_auth = true;
        cfg.admin_token = String::new();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn admin_token_not_required_when_auth_disabled() {
        let mut cfg = EngineConfig::default();
        cfg.require_admin_auth = false;
        cfg.admin_token = String::new();
        assert!(validate(&cfg).is_ok());
    }
}
