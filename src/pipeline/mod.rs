//! Market event pipeline.
//!
//! Turns live trades (or a synthetic scheduler) into a capped list of
//! `GameEvent`s. The pipeline is an actor: every input, including the
//! completion of its own background work, arrives as a `PipelineMessage`
//! on one channel and is applied in order against the current list. Async
//! enrichment runs on spawned tasks and reports back by id, so results can
//! land in any order and a result for an evicted event is simply dropped.
//!
//! Timer ownership: the scheduler has one handle, restarted only when play
//! state, speed or a mandatory quiz block changes. Per-event timers
//! (forecast resolution, modifier expiry, recommendation TTL) are keyed by
//! event id and aborted on eviction and on shutdown.

pub mod throttle;
pub mod prices;
pub mod log;
pub mod demo;
pub mod enrich;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use self::demo::DemoAction;
use self::log::EventLog;
use self::prices::{PriceTracker, PriceUpdate};
use self::throttle::Throttle;
use crate::config::PipelineConfig;
use crate::data::headlines;
use crate::llm::{CoachContext, ContentGenerator, VisibleEvent};
use crate::market::stream::FeedEvent;
use crate::market::{is_crypto, MarketData, OrderService, OrderSide, SYMBOLS};
use crate::types::{
    ChartAnalysis, EventId, ForecastEvent, ForecastStatus, GameEvent, GlobalMarketEvent,
    MarketEvent, ModifierKind, Outcome, PlayerStats, Polarity,
};

const CHANNEL_BUFFER: usize = 256;

/// Gemin credited for a correct quiz answer.
pub const QUIZ_REWARD: u64 = 10;

/// How often live mode refreshes account equity.
const EQUITY_SYNC_SECS: u64 = 5;

/// Where market events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    Live,
    Demo,
}

/// Everything the pipeline reacts to.
#[derive(Debug)]
pub enum PipelineMessage {
    /// Live trade for a symbol.
    Tick { symbol: String, price: f64, size: f64 },
    /// Benchmark trade price.
    Benchmark(f64),
    /// First-tick history lookup finished.
    Seeded { symbol: String, price: f64 },
    SchedulerTick,
    Enriched(MarketEvent),
    ForecastReady(ForecastEvent),
    ResolveForecast(EventId),
    Predict { id: EventId, prediction: Outcome },
    ExpireModifier(EventId),
    ExpireRecommendation(EventId),
    AnswerQuiz { id: EventId, answer: usize },
    /// Trade a market event: simulated in demo mode, a real order in live mode.
    SettleTrade { id: EventId, quantity: f64, stop_loss: Option<f64> },
    TradePlaced { polarity: Polarity },
    Equity(f64),
    Analyze(EventId),
    AnalysisReady { id: EventId, analysis: ChartAnalysis },
    Headlines(Vec<String>),
    SetPlaying(bool),
    SetSpeed(f64),
    Shutdown,
}

impl From<FeedEvent> for PipelineMessage {
    fn from(event: FeedEvent) -> Self {
        match event {
            FeedEvent::Trade { symbol, price, size } => PipelineMessage::Tick { symbol, price, size },
            FeedEvent::Benchmark(price) => PipelineMessage::Benchmark(price),
        }
    }
}

/// Published after every applied message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub mode: FeedMode,
    pub playing: bool,
    pub events: Vec<GameEvent>,
    /// -1, 0 or 1.
    pub market_pulse: i8,
    /// Bias currently applied to new market events.
    pub modifier: Option<ModifierKind>,
    pub stats: PlayerStats,
    pub headlines: Vec<String>,
    /// Mandatory quiz holding the scheduler, if any.
    pub blocked_on: Option<EventId>,
}

impl PipelineSnapshot {
    pub fn event(&self, id: &str) -> Option<&GameEvent> {
        self.events.iter().find(|e| e.id() == id)
    }

    pub fn market_event(&self, id: &str) -> Option<&MarketEvent> {
        match self.event(id) {
            Some(GameEvent::Market(m)) => Some(m),
            _ => None,
        }
    }

    /// What the coach gets to see.
    pub fn coach_context(&self) -> CoachContext {
        CoachContext {
            stats: self.stats.clone(),
            visible_events: self
                .events
                .iter()
                .filter_map(|e| match e {
                    GameEvent::Market(m) => Some(VisibleEvent {
                        polarity: m.polarity,
                        symbol: m.symbol.clone(),
                        value: m.value,
                    }),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// External services the pipeline calls.
#[derive(Clone)]
pub struct PipelineDeps {
    pub generator: Arc<dyn ContentGenerator>,
    pub market: Arc<dyn MarketData>,
    /// Live mode only.
    pub orders: Option<Arc<dyn OrderService>>,
}

/// Handles to a running pipeline task.
pub struct PipelineHandle {
    pub sender: mpsc::Sender<PipelineMessage>,
    pub snapshot: watch::Receiver<PipelineSnapshot>,
    pub task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Running global modifier. Held apart from the log so it keeps biasing
/// events for its full duration even once its card is evicted.
#[derive(Debug)]
struct ActiveModifier {
    id: EventId,
    kind: ModifierKind,
    until: Instant,
}

pub struct EventPipeline {
    config: PipelineConfig,
    mode: FeedMode,
    deps: PipelineDeps,
    log: EventLog,
    throttle: Throttle,
    prices: PriceTracker,
    stats: PlayerStats,
    market_pulse: i8,
    last_benchmark: Option<f64>,
    modifier: Option<ActiveModifier>,
    headlines: Vec<String>,
    next_id: u64,
    playing: bool,
    blocked_on: Option<EventId>,
    rng: StdRng,
    /// Loop-back for spawned work. Weak, so the actor ends once every
    /// outside sender is gone.
    tx: mpsc::WeakSender<PipelineMessage>,
    /// Keeps the inbox open until `run` takes over.
    inbox_guard: Option<mpsc::Sender<PipelineMessage>>,
    snapshot: watch::Sender<PipelineSnapshot>,
    scheduler: Option<JoinHandle<()>>,
    timers: HashMap<EventId, JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

impl EventPipeline {
    /// Build a pipeline and its inbox. Nothing runs until `run` or `start`.
    pub fn new(
        config: PipelineConfig,
        mode: FeedMode,
        deps: PipelineDeps,
        rng: StdRng,
    ) -> (Self, mpsc::Receiver<PipelineMessage>, watch::Receiver<PipelineSnapshot>) {
        let (sender, rx) = mpsc::channel(CHANNEL_BUFFER);
        let (mut pipeline, snapshot_rx) = Self::with_inbox(config, mode, deps, rng, sender.downgrade());
        pipeline.inbox_guard = Some(sender);
        (pipeline, rx, snapshot_rx)
    }

    /// Build and run a pipeline on its own task, already playing. The task
    /// ends on `Shutdown` or once every clone of the returned sender is dropped.
    pub fn spawn(config: PipelineConfig, mode: FeedMode, deps: PipelineDeps) -> PipelineHandle {
        let (sender, rx) = mpsc::channel(CHANNEL_BUFFER);
        let (mut pipeline, snapshot) =
            Self::with_inbox(config, mode, deps, StdRng::from_entropy(), sender.downgrade());
        let task = tokio::spawn(async move {
            pipeline.start();
            pipeline.run(rx).await;
        });
        PipelineHandle {
            sender,
            snapshot,
            task,
        }
    }

    fn with_inbox(
        config: PipelineConfig,
        mode: FeedMode,
        deps: PipelineDeps,
        rng: StdRng,
        tx: mpsc::WeakSender<PipelineMessage>,
    ) -> (Self, watch::Receiver<PipelineSnapshot>) {
        let initial = PipelineSnapshot {
            mode,
            playing: false,
            events: Vec::new(),
            market_pulse: 0,
            modifier: None,
            stats: PlayerStats::default(),
            headlines: headlines::fallback_ticker(),
            blocked_on: None,
        };
        let (snapshot, snapshot_rx) = watch::channel(initial);

        let pipeline = Self {
            log: EventLog::new(config.max_events),
            throttle: Throttle::new(
                Duration::from_secs(config.global_cooldown_secs),
                Duration::from_secs(config.symbol_cooldown_secs),
            ),
            config,
            mode,
            deps,
            prices: PriceTracker::new(),
            stats: PlayerStats::default(),
            market_pulse: 0,
            last_benchmark: None,
            modifier: None,
            headlines: headlines::fallback_ticker(),
            next_id: 0,
            playing: false,
            blocked_on: None,
            rng,
            tx,
            inbox_guard: None,
            snapshot,
            scheduler: None,
            timers: HashMap::new(),
            background: Vec::new(),
        };
        (pipeline, snapshot_rx)
    }

    /// Start background work and begin playing.
    pub fn start(&mut self) {
        self.background.push(self.spawn_headline_refresh());
        if let (FeedMode::Live, Some(orders)) = (self.mode, self.deps.orders.clone()) {
            self.background.push(self.spawn_equity_sync(orders));
        }
        self.playing = true;
        self.sync_scheduler();
        self.publish();
        info!(mode = ?self.mode, speed = self.config.speed, "Event pipeline started");
    }

    /// Apply messages until shutdown or until every outside sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<PipelineMessage>) {
        self.inbox_guard = None;
        while let Some(message) = rx.recv().await {
            if !self.handle(message) {
                break;
            }
        }
        self.teardown();
    }

    /// Apply one message and publish. Returns false on shutdown.
    pub fn handle(&mut self, message: PipelineMessage) -> bool {
        match message {
            PipelineMessage::Tick { symbol, price, size } => self.on_tick(symbol, price, size),
            PipelineMessage::Benchmark(price) => self.on_benchmark(price),
            PipelineMessage::Seeded { symbol, price } => {
                debug!(symbol = %symbol, price, "Symbol seeded");
                self.prices.seed(&symbol, price);
            }
            PipelineMessage::SchedulerTick => self.on_scheduler_tick(),
            PipelineMessage::Enriched(event) => self.on_enriched(event),
            PipelineMessage::ForecastReady(forecast) => self.on_forecast_ready(forecast),
            PipelineMessage::ResolveForecast(id) => self.on_resolve_forecast(id),
            PipelineMessage::Predict { id, prediction } => self.on_predict(id, prediction),
            PipelineMessage::ExpireModifier(id) => {
                self.timers.remove(&id);
                if self.modifier.as_ref().is_some_and(|m| m.id == id) {
                    self.modifier = None;
                }
                self.log.update(&id, |e| {
                    if let GameEvent::Global(g) = e {
                        g.active = false;
                    }
                });
                debug!(event_id = %id, "Global modifier expired");
            }
            PipelineMessage::ExpireRecommendation(id) => {
                self.timers.remove(&id);
                self.log.remove(&id);
            }
            PipelineMessage::AnswerQuiz { id, answer } => self.on_answer_quiz(id, answer),
            PipelineMessage::SettleTrade {
                id,
                quantity,
                stop_loss,
            } => self.on_settle_trade(id, quantity, stop_loss),
            PipelineMessage::TradePlaced { polarity } => self.credit_trade(polarity),
            PipelineMessage::Equity(equity) => self.stats.equity = equity,
            PipelineMessage::Analyze(id) => self.on_analyze(id),
            PipelineMessage::AnalysisReady { id, analysis } => {
                let merged = self.log.update(&id, |e| {
                    if let GameEvent::Market(m) = e {
                        m.analysis = Some(analysis);
                    }
                });
                debug!(event_id = %id, merged, "Chart analysis merged");
            }
            PipelineMessage::Headlines(lines) => {
                if !lines.is_empty() {
                    self.headlines = lines;
                }
            }
            PipelineMessage::SetPlaying(playing) => {
                self.playing = playing;
                self.sync_scheduler();
            }
            PipelineMessage::SetSpeed(speed) => {
                if speed > 0.0 && speed != self.config.speed {
                    self.config.speed = speed;
                    // Restart so the new period applies.
                    self.stop_scheduler();
                    self.sync_scheduler();
                }
            }
            PipelineMessage::Shutdown => return false,
        }
        self.publish();
        true
    }

    // -- Live feed -------------------------------------------------------

    fn on_tick(&mut self, symbol: String, price: f64, size: f64) {
        if !self.playing {
            return;
        }

        let pct = match self.prices.observe(&symbol, price) {
            PriceUpdate::Seeding => {
                debug!(symbol = %symbol, "Tick dropped while seeding");
                return;
            }
            PriceUpdate::FirstSeen => {
                self.spawn_seed(symbol, price);
                return;
            }
            PriceUpdate::Change(pct) => pct,
        };

        let threshold = if is_crypto(&symbol) {
            self.config.crypto_threshold_pct
        } else {
            self.config.stock_threshold_pct
        };
        if pct.abs() < threshold {
            return;
        }

        if let Err(gate) = self.throttle.try_acquire(&symbol, Instant::now()) {
            debug!(symbol = %symbol, pct, gate = ?gate, "Tick throttled");
            return;
        }

        let polarity = Polarity::from_change(pct);
        if let Some(modifier) = self.active_modifier() {
            if modifier.suppresses(polarity) {
                debug!(symbol = %symbol, pct, modifier = ?modifier, "Tick suppressed by modifier");
                return;
            }
        }

        let id = self.next_event_id();
        let lane = demo::random_lane(&mut self.rng);
        let last_price = self.prices.last(&symbol).unwrap_or(price);
        let base = enrich::provisional(id, lane, &symbol, pct, size, last_price);
        info!(event_id = %base.id, symbol = %symbol, pct, value = base.value, "Market event created");

        self.push(GameEvent::Market(base.clone()));

        let deps = self.deps.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = enrich::enrich_live(&*deps.market, &*deps.generator, base, pct).await;
            send_back(&tx, PipelineMessage::Enriched(event)).await;
        });
    }

    fn spawn_seed(&self, symbol: String, observed: f64) {
        let market = self.deps.market.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let history = market.price_history(&symbol).await;
            let price = history.last().map(|p| p.price).unwrap_or(observed);
            send_back(&tx, PipelineMessage::Seeded { symbol, price }).await;
        });
    }

    fn on_benchmark(&mut self, price: f64) {
        if let Some(last) = self.last_benchmark {
            if price > last {
                self.market_pulse = 1;
            } else if price < last {
                self.market_pulse = -1;
            }
        }
        self.last_benchmark = Some(price);
    }

    // -- Scheduler -------------------------------------------------------

    fn on_scheduler_tick(&mut self) {
        if !self.playing || self.blocked_on.is_some() {
            return;
        }
        let demo_mode = self.mode == FeedMode::Demo;
        let action = demo::choose_action(&mut self.rng, demo_mode);
        debug!(action = ?action, "Scheduler tick");

        match action {
            DemoAction::Market => self.create_demo_market(),
            DemoAction::Forecast => self.create_forecast(),
            DemoAction::Quiz => self.create_quiz(),
            DemoAction::Recommendation => self.create_recommendation(),
        }

        if demo_mode {
            self.market_pulse = demo::market_pulse(&mut self.rng);
        }
    }

    fn create_demo_market(&mut self) {
        let active = self.active_modifier();
        if active.is_none() && self.rng.gen_bool(demo::MODIFIER_CHANCE) {
            let id = self.next_event_id();
            let modifier = demo::global_modifier(id, self.config.modifier_duration_secs, &mut self.rng);
            self.start_modifier(modifier);
            return;
        }

        let mv = demo::synthetic_move(&mut self.rng, active);
        let id = self.next_event_id();
        let base = demo::synthetic_event(id, &mv, &mut self.rng);
        debug!(event_id = %base.id, symbol = mv.symbol, pct = mv.pct, "Demo market event created");
        self.push(GameEvent::Market(base.clone()));

        let generator = self.deps.generator.clone();
        let tx = self.tx.clone();
        let pct = mv.pct;
        tokio::spawn(async move {
            let event = enrich::enrich_demo(&*generator, base, pct).await;
            send_back(&tx, PipelineMessage::Enriched(event)).await;
        });
    }

    fn create_forecast(&mut self) {
        let id = self.next_event_id();
        let symbol = demo::random_symbol(&mut self.rng, SYMBOLS);
        let outcome = demo::forecast_outcome(&mut self.rng);
        let lane = demo::random_lane(&mut self.rng);
        let reward = demo::forecast_reward(&mut self.rng);

        let generator = self.deps.generator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let h = enrich::forecast_headlines(&*generator, symbol, outcome).await;
            let outcome = h.outcome.unwrap_or(outcome);
            let forecast = ForecastEvent {
                id,
                lane,
                symbol: symbol.to_string(),
                status: ForecastStatus::Pending,
                initial_headline: h.initial_headline,
                prediction: None,
                reward,
                resolution: None,
                outcome,
                resolution_headline: h.resolution_headline,
            };
            send_back(&tx, PipelineMessage::ForecastReady(forecast)).await;
        });
    }

    fn create_quiz(&mut self) {
        let id = self.next_event_id();
        let quiz = demo::quiz_event(id.clone(), &mut self.rng);
        let mandatory = quiz.kind == crate::types::QuizKind::Mandatory;
        self.push(GameEvent::Quiz(quiz));
        if mandatory {
            info!(event_id = %id, "Mandatory quiz, scheduler paused");
            self.blocked_on = Some(id);
            self.sync_scheduler();
        }
    }

    fn create_recommendation(&mut self) {
        let id = self.next_event_id();
        let rec = demo::recommendation_event(id.clone(), &mut self.rng);
        self.push(GameEvent::Recommendation(rec));
        let ttl = Duration::from_secs(self.config.recommendation_ttl_secs);
        self.arm_timer(id.clone(), ttl, PipelineMessage::ExpireRecommendation(id));
    }

    // -- Merges ----------------------------------------------------------

    fn on_enriched(&mut self, mut event: MarketEvent) {
        let id = event.id.clone();
        if let Some(GameEvent::Market(existing)) = self.log.get(&id) {
            if event.analysis.is_none() {
                event.analysis = existing.analysis.clone();
            }
        }
        if !self.log.replace(GameEvent::Market(event)) {
            debug!(event_id = %id, "Enrichment for evicted event dropped");
        }
    }

    fn on_forecast_ready(&mut self, forecast: ForecastEvent) {
        let id = forecast.id.clone();
        debug!(event_id = %id, symbol = %forecast.symbol, "Forecast created");
        self.push(GameEvent::Forecast(forecast));
        let delay = self.config.forecast_delay();
        self.arm_timer(id.clone(), delay, PipelineMessage::ResolveForecast(id));
    }

    fn on_resolve_forecast(&mut self, id: EventId) {
        self.timers.remove(&id);
        let mut credit = None;
        self.log.update(&id, |e| {
            if let GameEvent::Forecast(f) = e {
                if f.status != ForecastStatus::Resolved {
                    f.resolve();
                    if f.resolution.as_ref().and_then(|r| r.correct) == Some(true) {
                        credit = Some(f.reward);
                    }
                }
            }
        });
        if let Some(reward) = credit {
            self.stats.gemin += reward.round() as u64;
            self.stats.streak += 1;
            info!(event_id = %id, reward, "Forecast called correctly");
        }
    }

    fn on_predict(&mut self, id: EventId, prediction: Outcome) {
        let recorded = self.log.update(&id, |e| {
            if let GameEvent::Forecast(f) = e {
                if f.status == ForecastStatus::Pending {
                    f.status = ForecastStatus::Predicted;
                    f.prediction = Some(prediction);
                }
            }
        });
        debug!(event_id = %id, prediction = %prediction, recorded, "Forecast prediction");
    }

    fn on_answer_quiz(&mut self, id: EventId, answer: usize) {
        let Some(GameEvent::Quiz(quiz)) = self.log.get(&id).cloned() else {
            debug!(event_id = %id, "Answer for unknown quiz ignored");
            return;
        };
        self.log.remove(&id);

        if answer == quiz.question.correct_answer_index {
            self.stats.gemin += QUIZ_REWARD;
            self.stats.streak += 1;
        } else {
            self.stats.streak = 0;
        }

        if self.blocked_on.as_deref() == Some(id.as_str()) {
            self.blocked_on = None;
            self.sync_scheduler();
            info!(event_id = %id, "Mandatory quiz answered, scheduler resumed");
        }
    }

    // -- Trading ---------------------------------------------------------

    fn on_settle_trade(&mut self, id: EventId, quantity: f64, stop_loss: Option<f64>) {
        let Some(GameEvent::Market(event)) = self.log.get(&id).cloned() else {
            debug!(event_id = %id, "Trade for unknown event ignored");
            return;
        };

        match (self.mode, self.deps.orders.clone()) {
            (FeedMode::Live, Some(orders)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let side = match event.polarity {
                        Polarity::Opportunity => OrderSide::Buy,
                        Polarity::Trap => OrderSide::Sell,
                    };
                    let (Some(qty), stop) = (
                        Decimal::from_f64(quantity),
                        stop_loss.and_then(Decimal::from_f64),
                    ) else {
                        warn!(quantity, "Unrepresentable order quantity");
                        return;
                    };
                    match orders.place_order(&event.symbol, qty, side, stop).await {
                        Ok(_) => {
                            let placed = PipelineMessage::TradePlaced {
                                polarity: event.polarity,
                            };
                            send_back(&tx, placed).await;
                        }
                        Err(e) => warn!(symbol = %event.symbol, error = %e, "Order failed"),
                    }
                });
            }
            _ => {
                let pnl = event.value * quantity;
                self.stats.equity += pnl;
                self.credit_trade(event.polarity);
                info!(event_id = %id, symbol = %event.symbol, pnl, equity = self.stats.equity, "Demo trade settled");
            }
        }
    }

    fn credit_trade(&mut self, polarity: Polarity) {
        match polarity {
            Polarity::Opportunity => {
                self.stats.streak += 1;
                self.stats.gemin += 1;
            }
            Polarity::Trap => self.stats.streak = 0,
        }
    }

    fn on_analyze(&mut self, id: EventId) {
        let Some(GameEvent::Market(event)) = self.log.get(&id).cloned() else {
            return;
        };
        let generator = self.deps.generator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            match generator.chart_analysis(&event).await {
                Ok(analysis) => {
                    let ready = PipelineMessage::AnalysisReady {
                        id: event.id,
                        analysis,
                    };
                    send_back(&tx, ready).await;
                }
                Err(e) => warn!(event_id = %event.id, error = %e, "Chart analysis failed"),
            }
        });
    }

    // -- Internals -------------------------------------------------------

    fn next_event_id(&mut self) -> EventId {
        let id = format!("event-{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Append to the log and clean up after anything evicted.
    fn push(&mut self, event: GameEvent) {
        for old in self.log.push(event) {
            let id = old.id();
            if let Some(timer) = self.timers.remove(id) {
                timer.abort();
            }
            if self.blocked_on.as_deref() == Some(id) {
                self.blocked_on = None;
                self.sync_scheduler();
            }
        }
    }

    fn start_modifier(&mut self, modifier: GlobalMarketEvent) {
        let id = modifier.id.clone();
        let duration = Duration::from_secs(modifier.duration_secs);
        info!(event_id = %id, kind = ?modifier.kind, "Global modifier started");
        self.modifier = Some(ActiveModifier {
            id: id.clone(),
            kind: modifier.kind,
            until: Instant::now() + duration,
        });
        self.push(GameEvent::Global(modifier));
        self.arm_timer(id.clone(), duration, PipelineMessage::ExpireModifier(id));
    }

    /// The expiry timer dies with an evicted card, so the deadline decides.
    fn active_modifier(&self) -> Option<ModifierKind> {
        self.modifier
            .as_ref()
            .filter(|m| Instant::now() < m.until)
            .map(|m| m.kind)
    }

    fn arm_timer(&mut self, id: EventId, delay: Duration, message: PipelineMessage) {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            send_back(&tx, message).await;
        });
        if let Some(previous) = self.timers.insert(id, handle) {
            previous.abort();
        }
    }

    fn scheduler_wanted(&self) -> bool {
        self.playing && self.blocked_on.is_none()
    }

    /// Start or stop the scheduler to match play state and quiz block.
    fn sync_scheduler(&mut self) {
        match (self.scheduler_wanted(), self.scheduler.is_some()) {
            (true, false) => {
                let period = self.config.demo_period();
                let tx = self.tx.clone();
                self.scheduler = Some(tokio::spawn(async move {
                    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                    loop {
                        interval.tick().await;
                        if !send_back(&tx, PipelineMessage::SchedulerTick).await {
                            break;
                        }
                    }
                }));
                debug!(period_ms = period.as_millis() as u64, "Scheduler started");
            }
            (false, true) => self.stop_scheduler(),
            _ => {}
        }
    }

    fn stop_scheduler(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            handle.abort();
            debug!("Scheduler stopped");
        }
    }

    fn spawn_headline_refresh(&self) -> JoinHandle<()> {
        let generator = self.deps.generator.clone();
        let tx = self.tx.clone();
        let period = Duration::from_secs(self.config.headline_refresh_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let lines = match generator.live_news_headlines().await {
                    Ok(lines) if !lines.is_empty() => lines,
                    Ok(_) => headlines::fallback_ticker(),
                    Err(e) => {
                        warn!(error = %e, "Ticker headlines unavailable, using fallback");
                        headlines::fallback_ticker()
                    }
                };
                if !send_back(&tx, PipelineMessage::Headlines(lines)).await {
                    break;
                }
            }
        })
    }

    fn spawn_equity_sync(&self, orders: Arc<dyn OrderService>) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(EQUITY_SYNC_SECS));
            loop {
                interval.tick().await;
                match orders.account_equity().await {
                    Ok(equity) => {
                        let Some(equity) = equity.to_f64() else { continue };
                        if !send_back(&tx, PipelineMessage::Equity(equity)).await {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Account sync failed"),
                }
            }
        })
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.snapshot());
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            mode: self.mode,
            playing: self.playing,
            events: self.log.to_vec(),
            market_pulse: self.market_pulse,
            modifier: self.active_modifier(),
            stats: self.stats.clone(),
            headlines: self.headlines.clone(),
            blocked_on: self.blocked_on.clone(),
        }
    }

    /// Abort every timer and background task.
    pub fn teardown(&mut self) {
        self.stop_scheduler();
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        for task in self.background.drain(..) {
            task.abort();
        }
        info!(events = self.log.len(), "Event pipeline stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Report spawned work back to the actor. False once the actor is gone.
async fn send_back(tx: &mpsc::WeakSender<PipelineMessage>, message: PipelineMessage) -> bool {
    match tx.upgrade() {
        Some(tx) => tx.send(message).await.is_ok(),
        None => false,
    }
}
