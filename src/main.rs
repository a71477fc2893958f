//! Trivia Clash Server
//!
//! Binary entry point: logging, configuration, graceful shutdown.

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trivia_clash::{
    VERSION,
    core::region::RegionGraph,
    game::round::MatchConfig,
    network::{Coordinator, GameServer, ServerConfig},
    question::{GeminiConfig, GeminiQuestionSource, QuestionBackend, QuestionPool},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Trivia Clash Server v{}", VERSION);

    let server_config = ServerConfig::from_env();
    let match_config = MatchConfig::from_env();
    info!(
        "Ruleset {:?}, {}s per question, {}s between rounds, {} rounds",
        match_config.ruleset,
        match_config.round_timeout.as_secs(),
        match_config.inter_round_delay.as_secs(),
        match_config.round_cap
    );

    let graph = load_region_graph()?;
    for (from, to) in graph.asymmetric_edges() {
        warn!("Region map lists {} -> {} but not the reverse", from, to);
    }

    let backend = match GeminiConfig::from_env() {
        Some(config) => QuestionBackend::Gemini(
            GeminiQuestionSource::new(config).context("building question service client")?,
        ),
        None => QuestionBackend::Pool(QuestionPool::builtin()),
    };
    info!("Question source: {}", backend.name());

    let (coordinator, handle) = Coordinator::new(match_config, Arc::new(graph), Arc::new(backend));
    let coordinator_task = tokio::spawn(coordinator.run());

    let server = GameServer::new(server_config, handle.clone());
    tokio::select! {
        result = server.run() => result.context("server failed")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    handle.shutdown().await;
    coordinator_task.await.context("coordinator task failed")?;
    Ok(())
}

/// Region map from `TRIVIA_REGION_MAP`, or the bundled 12-region grid.
fn load_region_graph() -> anyhow::Result<RegionGraph> {
    let Ok(path) = std::env::var("TRIVIA_REGION_MAP") else {
        return Ok(RegionGraph::standard());
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading region map {path}"))?;
    let graph = RegionGraph::from_json(&raw)
        .with_context(|| format!("parsing region map {path}"))?;
    if graph.is_empty() {
        anyhow::bail!("region map {path} has no regions");
    }
    info!("Loaded {} regions from {}", graph.len(), path);
    Ok(graph)
}
