//! A single lane-runner session and its async runner.
//!
//! `GameSession` owns the `GameState`, the active settings and the RNG.
//! `spawn_session` drives it from one task: a frame interval and an input
//! channel are multiplexed with `select!`, so frame steps and input are
//! applied one at a time and every frame is published on a watch channel.
//! The news desk is the only other timer; it is started and aborted when
//! the mode or pause flag changes, never re-armed per frame.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::geometry::Perspective;
use super::news::NewsDesk;
use super::state::{GameState, NewsItem, RideChange};
use crate::llm::ContentGenerator;
use crate::types::{GameConfig, GameError, GameMode, GameSettings};

const COMMAND_BUFFER: usize = 64;

/// Input accepted by a running session.
#[derive(Debug)]
pub enum SessionCommand {
    SwitchLane(usize),
    /// Screen click at x, hit-tested at the player's depth.
    Click(f64),
    ToggleAutopilot,
    UpdateSettings { stop_pct: f64, min_momentum: f64 },
    SetMode(GameMode),
    ExitRide,
    Restart,
    ApplyNews(NewsItem),
    Pause,
    Resume,
    Shutdown,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct GameSession {
    config: GameConfig,
    settings: GameSettings,
    state: GameState,
    autopilot: bool,
    mode: GameMode,
    paused: bool,
    perspective: Perspective,
    rng: StdRng,
}

impl GameSession {
    pub fn new(config: GameConfig, mode: GameMode, autopilot: bool) -> Self {
        Self::with_rng(config, mode, autopilot, StdRng::from_entropy())
    }

    /// Session with an injected RNG, for reproducible runs.
    pub fn with_rng(config: GameConfig, mode: GameMode, autopilot: bool, mut rng: StdRng) -> Self {
        let settings = config.settings.clone();
        let state = GameState::new(&settings, &mut rng);
        Self {
            config,
            settings,
            state,
            autopilot,
            mode,
            paused: false,
            perspective: Perspective::default(),
            rng,
        }
    }

    /// Advance one frame unless paused.
    pub fn tick(&mut self) -> Option<RideChange> {
        if self.paused {
            return None;
        }
        let change = self.state.step(&self.settings, self.autopilot, &mut self.rng);
        match &change {
            Some(RideChange::Entered { symbol, entry_score }) => {
                info!(symbol, entry_score, "Ride started");
            }
            Some(RideChange::StoppedOut { symbol, loss }) => {
                info!(symbol, loss, score = self.state.score, "Stop-loss hit");
            }
            None => {}
        }
        change
    }

    /// Steer to `lane` right away. Manual steering disengages autopilot.
    pub fn switch_lane(&mut self, lane: usize) -> Result<(), GameError> {
        self.state.set_target_lane(lane)?;
        self.autopilot = false;
        Ok(())
    }

    /// Hit-test a click and steer to the lane under it, if any.
    pub fn click(&mut self, x: f64) -> Option<usize> {
        let lane = self.perspective.lane_at_player(x)?;
        self.switch_lane(lane).ok()?;
        Some(lane)
    }

    pub fn toggle_autopilot(&mut self) -> bool {
        self.autopilot = !self.autopilot;
        self.autopilot
    }

    pub fn update_settings(&mut self, stop_pct: f64, min_momentum: f64) {
        self.settings.stop_pct = stop_pct;
        self.settings.min_momentum = min_momentum;
        debug!(stop_pct, min_momentum, "Settings updated");
    }

    /// Leaving news mode clears the news log.
    pub fn set_mode(&mut self, mode: GameMode) {
        if mode == GameMode::MomentumOnly {
            self.state.clear_news();
        }
        self.mode = mode;
    }

    pub fn exit_ride(&mut self) -> Option<f64> {
        let pnl = self.state.exit_ride()?;
        info!(pnl, score = self.state.score, "Ride exited");
        Some(pnl)
    }

    /// Fresh state under the current settings. Settings changed during
    /// play (stop-loss, minimum momentum) carry over.
    pub fn restart(&mut self) {
        self.state = GameState::new(&self.settings, &mut self.rng);
        self.paused = false;
        info!(config = %self.config.id, "Session restarted");
    }

    /// Apply a news item, stamped with the current frame.
    /// Ignored outside news mode, so a late item cannot land after a mode switch.
    pub fn apply_news(&mut self, mut item: NewsItem) {
        if self.mode != GameMode::MomentumNews {
            debug!(headline = %item.headline, "News dropped outside news mode");
            return;
        }
        item.game_time = self.state.game_time;
        self.state.apply_news(item);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    // -- Accessors -------------------------------------------------------

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn autopilot(&self) -> bool {
        self.autopilot
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the news desk should be running right now.
    fn wants_news(&self) -> bool {
        self.mode == GameMode::MomentumNews && !self.paused
    }

    /// Returns false when the runner should stop.
    fn apply(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::SwitchLane(lane) => {
                if let Err(e) = self.switch_lane(lane) {
                    debug!(error = %e, "Lane switch rejected");
                }
            }
            SessionCommand::Click(x) => {
                self.click(x);
            }
            SessionCommand::ToggleAutopilot => {
                self.toggle_autopilot();
            }
            SessionCommand::UpdateSettings {
                stop_pct,
                min_momentum,
            } => self.update_settings(stop_pct, min_momentum),
            SessionCommand::SetMode(mode) => self.set_mode(mode),
            SessionCommand::ExitRide => {
                self.exit_ride();
            }
            SessionCommand::Restart => self.restart(),
            SessionCommand::ApplyNews(item) => self.apply_news(item),
            SessionCommand::Pause => self.pause(),
            SessionCommand::Resume => self.resume(),
            SessionCommand::Shutdown => return false,
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Handles to a running session task.
pub struct SessionHandle {
    pub commands: mpsc::Sender<SessionCommand>,
    pub state: watch::Receiver<GameState>,
    pub task: JoinHandle<()>,
}

/// Run `session` on its own task at `frame_rate_hz`.
pub fn spawn_session(
    session: GameSession,
    generator: Arc<dyn ContentGenerator>,
    frame_rate_hz: u32,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(session.state().clone());
    // Weak, so dropping every handle closes the inbox and ends the runner.
    let desk_tx = cmd_tx.downgrade();

    let task = tokio::spawn(run(session, generator, frame_rate_hz, cmd_rx, desk_tx, state_tx));

    SessionHandle {
        commands: cmd_tx,
        state: state_rx,
        task,
    }
}

async fn run(
    mut session: GameSession,
    generator: Arc<dyn ContentGenerator>,
    frame_rate_hz: u32,
    mut commands: mpsc::Receiver<SessionCommand>,
    desk_tx: mpsc::WeakSender<SessionCommand>,
    state_tx: watch::Sender<GameState>,
) {
    let period = Duration::from_secs_f64(1.0 / frame_rate_hz.max(1) as f64);
    let mut frames = tokio::time::interval(period);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut news: Option<JoinHandle<()>> = None;
    sync_news(&session, &generator, &desk_tx, &mut news);

    info!(config = %session.config.id, frame_rate_hz, mode = ?session.mode(), "Session running");

    loop {
        tokio::select! {
            _ = frames.tick() => {
                if session.is_paused() {
                    continue;
                }
                session.tick();
                state_tx.send_replace(session.state().clone());
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("Every session handle dropped");
                    break;
                };
                if !session.apply(command) {
                    break;
                }
                sync_news(&session, &generator, &desk_tx, &mut news);
                state_tx.send_replace(session.state().clone());
            }
        }
    }

    if let Some(handle) = news.take() {
        handle.abort();
    }
    info!(score = session.state().score, frames = session.state().game_time, "Session stopped");
}

/// Start or abort the news desk to match the session's mode and pause flag.
fn sync_news(
    session: &GameSession,
    generator: &Arc<dyn ContentGenerator>,
    desk_tx: &mpsc::WeakSender<SessionCommand>,
    news: &mut Option<JoinHandle<()>>,
) {
    match (session.wants_news(), news.is_some()) {
        (true, false) => {
            let desk = NewsDesk::new(generator.clone(), session.settings.allowed_assets.resolve());
            *news = Some(desk.spawn(desk_tx.clone()));
        }
        (false, true) => {
            if let Some(handle) = news.take() {
                handle.abort();
                debug!("News desk stopped");
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
