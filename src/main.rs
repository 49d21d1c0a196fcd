//! Alpha Infinity: headless game runner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the lane-runner session, the market event pipeline, the live
//! trade feed (live mode only) and the dashboard, then waits for Ctrl+C
//! and tears every task down.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use alpha_infinity::config::{self, AppConfig};
use alpha_infinity::dashboard::{self, DashboardState};
use alpha_infinity::engine::session::{spawn_session, GameSession, SessionCommand};
use alpha_infinity::llm::gemini::GeminiClient;
use alpha_infinity::llm::ContentGenerator;
use alpha_infinity::market::alpaca::AlpacaClient;
use alpha_infinity::market::{stream, Credentials, OrderService};
use alpha_infinity::pipeline::{EventPipeline, FeedMode, PipelineDeps, PipelineMessage};
use alpha_infinity::storage;
use alpha_infinity::types::GameMode;

const BANNER: &str = r#"
    _    _       _               ___        __ _       _ _
   / \  | |_ __ | |__   __ _    |_ _|_ __  / _(_)_ __ (_) |_ _   _
  / _ \ | | '_ \| '_ \ / _` |    | || '_ \| |_| | '_ \| | __| | | |
 / ___ \| | |_) | | | | (_| |    | || | | |  _| | | | | | |_| |_| |
/_/   \_\_| .__/|_| |_|\__,_|   |___|_| |_|_| |_|_| |_|_|\__|\__, |
          |_|                                                |___/
  Ride the momentum. Read the news.
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        preset = %cfg.game.preset,
        news = cfg.game.news_enabled,
        autopilot = cfg.game.autopilot,
        speed = cfg.pipeline.speed,
        "Alpha Infinity starting up"
    );

    // -- Saved configs ---------------------------------------------------

    let mut saved = storage::load_configs(Some(&cfg.storage.path))?;
    let game_config = match saved.resolve(&cfg.game.preset) {
        Some(c) => c,
        None => {
            warn!(preset = %cfg.game.preset, "Unknown preset, using standard");
            saved
                .resolve("standard")
                .context("Built-in standard preset missing")?
        }
    };
    if !saved.has_played {
        saved.has_played = true;
        storage::save_configs(&saved, Some(&cfg.storage.path))?;
    }

    // -- Collaborators ---------------------------------------------------

    let gemini = build_generator(&cfg)?;
    let generator: Arc<dyn ContentGenerator> = gemini.clone();
    let creds = load_credentials(&cfg);
    let mode = if creds.is_demo() {
        info!("No market data credentials, running in demo mode");
        FeedMode::Demo
    } else {
        info!("Market data credentials found, running in live mode");
        FeedMode::Live
    };
    let alpaca = Arc::new(AlpacaClient::new(creds.clone(), &cfg.market_data)?);
    let orders: Option<Arc<dyn OrderService>> = match mode {
        FeedMode::Live => Some(alpaca.clone()),
        FeedMode::Demo => None,
    };

    // -- Session ---------------------------------------------------------

    let game_mode = if cfg.game.news_enabled {
        GameMode::MomentumNews
    } else {
        GameMode::MomentumOnly
    };
    let session = GameSession::new(game_config, game_mode, cfg.game.autopilot);
    let session = spawn_session(session, generator.clone(), cfg.game.frame_rate_hz);

    // -- Pipeline and feed -----------------------------------------------

    let pipeline = EventPipeline::spawn(
        cfg.pipeline.clone(),
        mode,
        PipelineDeps {
            generator: generator.clone(),
            market: alpaca.clone(),
            orders: orders.clone(),
        },
    );
    let feeds = match mode {
        FeedMode::Live => stream::spawn_feeds(creds, &cfg.market_data, pipeline.sender.clone()),
        FeedMode::Demo => Vec::new(),
    };

    // -- Dashboard -------------------------------------------------------

    let server = if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState {
            session: session.commands.clone(),
            game: session.state.clone(),
            pipeline: pipeline.sender.clone(),
            events: pipeline.snapshot.clone(),
            generator: generator.clone(),
            orders,
            saved: RwLock::new(saved),
            storage_path: cfg.storage.path.clone(),
            start_time: chrono::Utc::now(),
        });
        Some(dashboard::spawn_dashboard(state, cfg.dashboard.port).await?)
    } else {
        None
    };

    // -- Wait for shutdown -----------------------------------------------

    info!("Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutdown signal received.");

    for feed in feeds {
        feed.abort();
    }
    if let Some(server) = server {
        server.abort();
    }
    let _ = pipeline.sender.send(PipelineMessage::Shutdown).await;
    let _ = session.commands.send(SessionCommand::Shutdown).await;
    let _ = pipeline.task.await;
    let _ = session.task.await;

    let final_state = pipeline.snapshot.borrow().clone();
    info!(
        score = format!("{:.2}", session.state.borrow().score),
        equity = format!("{:.2}", final_state.stats.equity),
        streak = final_state.stats.streak,
        gemin = final_state.stats.gemin,
        llm_calls = gemini.total_calls(),
        llm_tokens = gemini.total_tokens(),
        "Alpha Infinity shut down cleanly."
    );

    Ok(())
}

/// Content generator from the `[llm]` section.
fn build_generator(cfg: &AppConfig) -> Result<Arc<GeminiClient>> {
    let api_key = std::env::var(&cfg.llm.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        warn!(env = %cfg.llm.api_key_env, "No content API key set, generated text falls back to templates");
    }
    if cfg.llm.provider != "gemini" {
        warn!(provider = %cfg.llm.provider, "Unknown content provider, using Gemini");
    }
    info!(model = %cfg.llm.model, "Using Gemini content generator");
    let client = GeminiClient::new(api_key, Some(cfg.llm.model.clone()), Some(cfg.llm.max_tokens))?;
    Ok(Arc::new(client))
}

/// Market credentials from the env vars named in `[market_data]`.
fn load_credentials(cfg: &AppConfig) -> Credentials {
    match (
        AppConfig::resolve_env(&cfg.market_data.key_env),
        AppConfig::resolve_env(&cfg.market_data.secret_env),
    ) {
        (Ok(key), Ok(secret)) => Credentials::new(key, secret),
        _ => Credentials::demo(),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alpha_infinity=info"));

    let json_logging = std::env::var("ALPHA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
