//! C5 — StatsCalculator: correct rate and stable ordering for users and
//! teams (spec.md §4.5), plus the enriched result DTOs and result-state
//! mapper from SPEC_FULL.md §C.4/§C.5.

use crate::engine::types::{
    default_result_state_mapper, ResultState, Stats, TeamId, TeamStatsDto, UserId, UserStatsDto,
};
use std::collections::HashMap;

/// First-match rank: the 1-based position of `value`'s first occurrence in
/// `sorted_desc`. Ties share the lower rank and no rank is skipped — the
/// reference semantics documented in spec.md §4.5 and tested at §8 #5.
fn first_match_order(value: u32, sorted_desc: &[u32]) -> u32 {
    1 + sorted_desc.iter().position(|&v| v == value).unwrap_or(0) as u32
}

/// Computes `Stats` (correct rate + first-match order) for every key in
/// `counts`, given the total number of completed quizzes.
fn compute_stats<K: Eq + std::hash::Hash + Copy>(
    counts: &HashMap<K, u32>,
    quiz_count: u32,
) -> HashMap<K, Stats> {
    let mut sorted_desc: Vec<u32> = counts.values().copied().collect();
    sorted_desc.sort_unstable_by(|a, b| b.cmp(a));

    counts
        .iter()
        .map(|(key, &count)| {
            let correct_rate = if quiz_count == 0 { 0.0 } else { count as f32 / quiz_count as f32 };
            let order = first_match_order(count, &sorted_desc);
            (*key, Stats { correct_rate, order })
        })
        .collect()
}

/// All-user and all-team stats for `GetAllStats()`, plus the overall
/// correct rate and the enriched DTOs from SPEC_FULL.md §C.4.
pub struct AllStats {
    pub personal: HashMap<UserId, Stats>,
    pub team: HashMap<TeamId, Stats>,
    pub overall_correct_rate: f32,
    pub user_dtos: Vec<UserStatsDto>,
    pub team_dtos: Vec<TeamStatsDto>,
}

/// `GetAllStats()` (spec.md §4.5). `team_members`/`user_team` let the
/// enriched DTOs report membership without the calculator owning any
/// engine state itself.
pub fn get_all_stats(
    personal_stats: &HashMap<UserId, u32>,
    team_stats: &HashMap<TeamId, u32>,
    quiz_count: u32,
    team_count: u32,
    user_team: &HashMap<UserId, TeamId>,
    team_members: &HashMap<TeamId, usize>,
) -> AllStats {
    let personal = compute_stats(personal_stats, quiz_count);
    let team = compute_stats(team_stats, quiz_count);

    let overall_correct_rate = if quiz_count == 0 || team_count == 0 {
        0.0
    } else {
        let sum: u32 = team_stats.values().sum();
        sum as f32 / (quiz_count as f32 * team_count as f32)
    };

    let user_dtos = personal
        .iter()
        .map(|(user_id, stats)| UserStatsDto {
            user_id: *user_id,
            correct_rate: stats.correct_rate,
            order: stats.order,
            team_id: user_team.get(user_id).copied().unwrap_or(0),
        })
        .collect();

    let team_dtos = team
        .iter()
        .map(|(team_id, stats)| TeamStatsDto {
            team_id: *team_id,
            correct_rate: stats.correct_rate,
            order: stats.order,
            member_count: team_members.get(team_id).copied().unwrap_or(0),
        })
        .collect();

    AllStats { personal, team, overall_correct_rate, user_dtos, team_dtos }
}

/// `GetResultStats(u, t)` — same computation, scoped to one user and one
/// team, plus the SPEC_FULL.md §C.5 result-state bucketing.
pub struct ResultStats {
    pub user: Stats,
    pub user_state: ResultState,
    pub team: Stats,
    pub team_state: ResultState,
}

/// `mapper` defaults to `default_result_state_mapper` when `None`, matching
/// the original `get_result_usecase.go`'s injectable `resultStateMapper`
/// (SPEC_FULL.md §C.5).
pub fn get_result_stats(
    personal_stats: &HashMap<UserId, u32>,
    team_stats: &HashMap<TeamId, u32>,
    quiz_count: u32,
    user: UserId,
    team: TeamId,
    mapper: Option<&dyn Fn(f32) -> ResultState>,
) -> ResultStats {
    let personal = compute_stats(personal_stats, quiz_count);
    let team_computed = compute_stats(team_stats, quiz_count);

    let user_stats = personal.get(&user).copied().unwrap_or(Stats { correct_rate: 0.0, order: 1 });
    let team_stats_out = team_computed.get(&team).copied().unwrap_or(Stats { correct_rate: 0.0, order: 1 });

    let map = |rate: f32| match mapper {
        Some(f) => f(rate),
        None => default_result_state_mapper(rate),
    };

    ResultStats {
        user: user_stats,
        user_state: map(user_stats.correct_rate),
        team: team_stats_out,
        team_state: map(team_stats_out.correct_rate),
    }
}
