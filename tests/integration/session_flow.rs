//! Lane-runner session driven through its command channel.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use alpha_infinity::engine::session::{spawn_session, GameSession, SessionCommand, SessionHandle};
use alpha_infinity::engine::state::GameState;
use alpha_infinity::types::{GameConfig, GameMode};

use crate::mocks::ScriptedGenerator;

async fn wait_for(state: &mut watch::Receiver<GameState>, pred: impl Fn(&GameState) -> bool) -> GameState {
    loop {
        {
            let s = state.borrow_and_update();
            if pred(&s) {
                return s.clone();
            }
        }
        state.changed().await.unwrap();
    }
}

fn start(preset: &str, mode: GameMode, autopilot: bool, generator: ScriptedGenerator) -> SessionHandle {
    let config = GameConfig::preset(preset).unwrap();
    spawn_session(GameSession::new(config, mode, autopilot), Arc::new(generator), 60)
}

async fn stop(handle: SessionHandle) {
    handle.commands.send(SessionCommand::Shutdown).await.unwrap();
    handle.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_platforms_flow_and_pause_freezes_time() {
    let handle = start("standard", GameMode::MomentumOnly, false, ScriptedGenerator::new());
    let mut state = handle.state.clone();

    let s = wait_for(&mut state, |s| !s.platforms.is_empty()).await;
    assert!(s.platforms.iter().all(|p| p.lane_index < 5));

    handle.commands.send(SessionCommand::Pause).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let paused_at = state.borrow().game_time;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(state.borrow().game_time, paused_at);

    handle.commands.send(SessionCommand::Resume).await.unwrap();
    wait_for(&mut state, |s| s.game_time > paused_at).await;
    stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn test_crypto_rush_only_spawns_crypto() {
    let handle = start("crypto_rush", GameMode::MomentumOnly, false, ScriptedGenerator::new());
    let mut state = handle.state.clone();
    let s = wait_for(&mut state, |s| s.platforms.len() >= 3).await;
    assert!(s
        .platforms
        .iter()
        .all(|p| p.asset.kind == alpha_infinity::types::AssetKind::Crypto));
    stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn test_autopilot_eventually_rides() {
    let handle = start("standard", GameMode::MomentumOnly, true, ScriptedGenerator::new());
    let mut state = handle.state.clone();
    let s = wait_for(&mut state, |s| s.current_ride.is_some()).await;
    let ride = s.current_ride.unwrap();
    assert!((ride.current_score - ride.pnl - ride.entry_score).abs() < 1e-6);
    stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_resets_score_and_clock() {
    let handle = start("stocks_pro", GameMode::MomentumOnly, true, ScriptedGenerator::new());
    let mut state = handle.state.clone();
    wait_for(&mut state, |s| s.game_time > 120).await;

    handle.commands.send(SessionCommand::Restart).await.unwrap();
    let s = wait_for(&mut state, |s| s.game_time < 5).await;
    assert_eq!(s.score, 250_000.0);
    assert!(s.current_ride.is_none());
    stop(handle).await;
}

#[tokio::test(start_paused = true)]
async fn test_news_uses_fallback_headline_when_generator_fails() {
    let handle = start("standard", GameMode::MomentumNews, false, ScriptedGenerator::failing());
    let mut state = handle.state.clone();
    let s = wait_for(&mut state, |s| !s.news.is_empty()).await;
    let item = &s.news[0];
    assert_eq!(item.headline, format!("Volatility spike for {}!", item.asset.symbol));
    assert!(item.impact.abs() >= 0.5 && item.impact.abs() < 1.0);

    // Dropping to momentum-only clears the log.
    handle.commands.send(SessionCommand::SetMode(GameMode::MomentumOnly)).await.unwrap();
    wait_for(&mut state, |s| s.news.is_empty()).await;
    stop(handle).await;
}
