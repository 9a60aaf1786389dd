#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use questroom_engine::config;
use questroom_engine::engine::collaborators::{ProfileQuestion, UserImageRepository};
use questroom_engine::engine::memory::{
    InMemoryDatabase, InMemoryProfileQuestionRepository, InMemoryQuizBuilder,
    InMemoryUserImageRepository, InMemoryUserProfileRepository, InMemoryUserRepository,
};
use questroom_engine::engine::{Collaborators, GameManager};
use questroom_engine::logging;
use questroom_engine::metrics::EngineMetrics;
use std::sync::Arc;

/// The quest room engine -- state machine and concurrency core for a
/// real-time multiplayer quiz game.
#[derive(Parser, Debug)]
#[command(name = "questroom-engine")]
#[command(about = "The state machine and concurrency core for a real-time multiplayer quiz game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the engine.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Players: {}", cfg.player_count);
                println!("  Teams: {}", cfg.team_count);
                println!("  Min team size: {}", cfg.min_team_size);
                println!("  Question window: {}s", cfg.question_window_secs);
                println!("  Admin auth required: {}", cfg.require_admin_auth);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    tracing::info!(
        players = cfg.player_count,
        teams = cfg.team_count,
        "Starting quest room engine"
    );

    let (manager, images) = build_manager(&cfg);
    let manager = Arc::new(manager);
    let metrics = Arc::new(EngineMetrics::new());

    run_illustrative_game(&manager, &images, &metrics, cfg.player_count).await?;

    let snapshot = metrics.snapshot();
    tracing::info!(
        broadcast_p99_us = snapshot.broadcast_latency_us.p99,
        collection_p99_us = snapshot.collection_duration_us.p99,
        "Engine metrics snapshot"
    );

    Ok(())
}

/// Wires the engine's collaborators against the in-memory stand-ins
/// (`engine::memory`), seeded with a handful of profile questions so the
/// illustrative game loop below has something to quiz on.
fn build_manager(
    cfg: &config::EngineConfig,
) -> (GameManager, Arc<InMemoryUserImageRepository>) {
    let images = Arc::new(InMemoryUserImageRepository::new());
    let profiles = Arc::new(InMemoryUserProfileRepository::new());
    let quiz_builder = Arc::new(InMemoryQuizBuilder::new(images.clone(), profiles.clone()));

    let questions = vec![
        ProfileQuestion {
            question_id: uuid::Uuid::new_v4(),
            question_text: "Favorite season?".to_string(),
        },
        ProfileQuestion {
            question_id: uuid::Uuid::new_v4(),
            question_text: "Favorite food?".to_string(),
        },
    ];

    let collaborators = Collaborators {
        users: Arc::new(InMemoryUserRepository::new()),
        images: images.clone(),
        profiles,
        questions: Arc::new(InMemoryProfileQuestionRepository::new(questions)),
        quiz_builder,
        database: Arc::new(InMemoryDatabase::new()),
    };

    (GameManager::new(cfg.team_count, collaborators), images)
}

/// Drives one end-to-end pass through the state machine against the
/// in-memory collaborators so the binary is runnable standalone for
/// manual testing: register players, fill the lobby, close it, enter the
/// quest room, run a single quiz tick, then collect the closing stats.
async fn run_illustrative_game(
    manager: &Arc<GameManager>,
    images: &Arc<InMemoryUserImageRepository>,
    metrics: &Arc<EngineMetrics>,
    player_count: u32,
) -> anyhow::Result<()> {
    manager.open_lobby().await?;

    let mut users = Vec::new();
    for i in 0..player_count {
        let (user_id, _access_token) = manager.register_user(format!("player-{i}")).await?;
        images.save(user_id, uuid::Uuid::new_v4()).await?;
        manager.join_lobby(user_id).await?;
        manager.set_ready(user_id, true).await?;
        users.push(user_id);
    }

    let assignments = manager.close_lobby().await?;
    tracing::info!(assigned_users = assignments.len(), "Lobby closed, teams assigned");

    manager.quest_start().await?;

    let program = manager.build_quiz_program().await?;
    if let Some(entry) = program.first() {
        let teams = manager.get_teams().await?;
        let team_members = teams.get(&entry.team_id).cloned().unwrap_or_default();

        for (i, member) in team_members.iter().enumerate() {
            manager
                .register_profile(*member, entry.question_id, format!("answer-{i}"))
                .await?;
        }

        let started = std::time::Instant::now();
        let (quiz, correct) = questroom_engine::engine::quiz_flow::build_quiz(
            &*manager.quiz_builder(),
            entry,
            &team_members,
            15,
        )
        .await?;
        metrics.record_broadcast_latency(started.elapsed());

        manager.broadcast(entry.target, quiz, correct).await?;

        let started = std::time::Instant::now();
        let (team_results, per_team_counts) = manager.collect_answer().await?;
        metrics.record_collection_duration(started.elapsed());

        manager.update_team_stats(&team_results).await?;
        manager.distribute_answer(&team_results, &per_team_counts).await?;
    }

    manager.end_quest().await?;
    let stats = manager.get_all_stats().await?;
    tracing::info!(
        overall_correct_rate = stats.overall_correct_rate,
        "Quest finished"
    );

    Ok(())
}
