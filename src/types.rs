//! Shared types for Alpha Infinity.
//!
//! The asset catalog, game settings and presets, the typed game-event
//! union produced by the market event pipeline, and the crate error type.
//! Both engines depend on this module; it depends on nothing in the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Asset class. Crypto trades around the clock and is noisier than equities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Crypto,
    Stock,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Crypto => write!(f, "cryptocurrency"),
            AssetKind::Stock => write!(f, "stock"),
        }
    }
}

/// A tradable asset from the static catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Asset {
    pub symbol: &'static str,
    pub kind: AssetKind,
}

/// The full asset catalog the lane runner draws platforms from.
pub const ASSETS: [Asset; 10] = [
    Asset { symbol: "BTC", kind: AssetKind::Crypto },
    Asset { symbol: "ETH", kind: AssetKind::Crypto },
    Asset { symbol: "SOL", kind: AssetKind::Crypto },
    Asset { symbol: "XRP", kind: AssetKind::Crypto },
    Asset { symbol: "LTC", kind: AssetKind::Crypto },
    Asset { symbol: "TSLA", kind: AssetKind::Stock },
    Asset { symbol: "NVDA", kind: AssetKind::Stock },
    Asset { symbol: "AAPL", kind: AssetKind::Stock },
    Asset { symbol: "MSFT", kind: AssetKind::Stock },
    Asset { symbol: "AMZN", kind: AssetKind::Stock },
];

/// Which part of the catalog a game may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedAssets {
    All,
    Kinds(Vec<AssetKind>),
}

impl AllowedAssets {
    /// Catalog entries permitted by this filter. May be empty.
    pub fn resolve(&self) -> Vec<Asset> {
        match self {
            AllowedAssets::All => ASSETS.to_vec(),
            AllowedAssets::Kinds(kinds) => ASSETS
                .iter()
                .filter(|a| kinds.contains(&a.kind))
                .copied()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings and presets
// ---------------------------------------------------------------------------

/// Tunable gameplay settings for one lane-runner session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    pub starting_score: f64,
    /// Base platform speed in depth units per frame.
    pub road_speed: f64,
    /// Autopilot ignores platforms below this momentum.
    pub min_momentum: f64,
    /// Stop-loss as a fraction of the ride's entry score.
    pub stop_pct: f64,
    pub allowed_assets: AllowedAssets,
}

/// A named game configuration (built-in preset or player-saved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub settings: GameSettings,
}

impl GameConfig {
    /// The built-in presets, in menu order.
    pub fn presets() -> Vec<GameConfig> {
        vec![
            GameConfig {
                id: "standard".into(),
                name: "Standard".into(),
                description: "A balanced experience with standard speed and volatility.".into(),
                settings: GameSettings {
                    starting_score: 100_000.0,
                    road_speed: 2.5,
                    min_momentum: 1.0,
                    stop_pct: 0.3,
                    allowed_assets: AllowedAssets::All,
                },
            },
            GameConfig {
                id: "crypto_rush".into(),
                name: "Crypto Rush".into(),
                description: "A faster, crypto-only mode with higher volatility.".into(),
                settings: GameSettings {
                    starting_score: 100_000.0,
                    road_speed: 3.5,
                    min_momentum: 1.2,
                    stop_pct: 0.25,
                    allowed_assets: AllowedAssets::Kinds(vec![AssetKind::Crypto]),
                },
            },
            GameConfig {
                id: "stocks_pro".into(),
                name: "Stocks Pro".into(),
                description: "A slower, more methodical mode focused on stocks.".into(),
                settings: GameSettings {
                    starting_score: 250_000.0,
                    road_speed: 2.0,
                    min_momentum: 0.8,
                    stop_pct: 0.35,
                    allowed_assets: AllowedAssets::Kinds(vec![AssetKind::Stock]),
                },
            },
        ]
    }

    /// Look up a built-in preset by id.
    pub fn preset(id: &str) -> Option<GameConfig> {
        Self::presets().into_iter().find(|c| c.id == id)
    }
}

/// Whether the news sub-system runs alongside the lane runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    MomentumOnly,
    MomentumNews,
}

// ---------------------------------------------------------------------------
// Game events
// ---------------------------------------------------------------------------

/// Identifier of a pipeline event (`event-N`, unique per pipeline instance).
pub type EventId = String;

/// Long-biased vs short-biased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Opportunity,
    Trap,
}

impl Polarity {
    /// Polarity from the sign of a price change. Zero counts as a trap.
    pub fn from_change(pct: f64) -> Self {
        if pct > 0.0 {
            Polarity::Opportunity
        } else {
            Polarity::Trap
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Polarity::Opportunity => 1.0,
            Polarity::Trap => -1.0,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Opportunity => write!(f, "opportunity"),
            Polarity::Trap => write!(f, "trap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: u32,
    pub price: f64,
}

/// A news article attached to a market event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub headline: String,
    pub source: String,
    pub url: String,
}

impl NewsArticle {
    /// Stand-in used whenever a real article cannot be fetched.
    pub fn generic(symbol: &str) -> Self {
        Self {
            headline: format!("Market data is showing movement for {symbol}."),
            source: "Generic Feed".into(),
            url: String::new(),
        }
    }
}

/// Where a market event is in its enrichment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentState {
    Provisional,
    Enriched,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConcept {
    pub title: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedNews {
    pub headline: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub index: usize,
    pub text: String,
}

/// Generated explanation of a market event's price chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAnalysis {
    pub analysis_text: String,
    pub key_concept: KeyConcept,
    #[serde(default)]
    pub related_news: Vec<RelatedNews>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A price move turned into a gameplay event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketEvent {
    pub id: EventId,
    pub lane: u8,
    pub polarity: Polarity,
    pub symbol: String,
    /// Signed reward; the sign always matches `polarity`.
    pub value: f64,
    pub title: String,
    pub explanation: String,
    pub news: NewsArticle,
    pub price_history: Vec<PricePoint>,
    pub analysis: Option<ChartAnalysis>,
    pub enrichment: EnrichmentState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    /// Can be opened at the player's leisure.
    Optional,
    /// Blocks gameplay until answered.
    Mandatory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizEvent {
    pub id: EventId,
    pub lane: u8,
    pub kind: QuizKind,
    pub question: QuizQuestion,
    pub text: String,
}

/// Self-expiring display hint. Never affects gameplay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationEvent {
    pub id: EventId,
    pub lane: u8,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Bullish,
    Bearish,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Bullish => write!(f, "bullish"),
            Outcome::Bearish => write!(f, "bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Pending,
    Predicted,
    Resolved,
}

/// Revealed once a forecast resolves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResolution {
    pub outcome: Outcome,
    pub headline: String,
    /// `None` when the player never predicted.
    pub correct: Option<bool>,
}

/// A two-phase news story the player tries to call before it resolves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEvent {
    pub id: EventId,
    pub lane: u8,
    pub symbol: String,
    pub status: ForecastStatus,
    pub initial_headline: String,
    pub prediction: Option<Outcome>,
    pub reward: f64,
    pub resolution: Option<ForecastResolution>,
    /// Decided at creation, hidden until resolution.
    #[serde(skip_serializing)]
    pub outcome: Outcome,
    #[serde(skip_serializing)]
    pub resolution_headline: String,
}

impl ForecastEvent {
    /// Move to `Resolved`, keeping any prediction recorded earlier.
    pub fn resolve(&mut self) {
        self.status = ForecastStatus::Resolved;
        self.resolution = Some(ForecastResolution {
            outcome: self.outcome,
            headline: self.resolution_headline.clone(),
            correct: self.prediction.map(|p| p == self.outcome),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Market-wide sell-off: suppresses opportunities.
    Shock,
    /// Sector rally: suppresses traps.
    Streak,
}

impl ModifierKind {
    /// Whether an event of `polarity` conflicts with this bias.
    pub fn suppresses(self, polarity: Polarity) -> bool {
        matches!(
            (self, polarity),
            (ModifierKind::Shock, Polarity::Opportunity) | (ModifierKind::Streak, Polarity::Trap)
        )
    }
}

/// Time-boxed market-wide bias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalMarketEvent {
    pub id: EventId,
    pub kind: ModifierKind,
    pub title: String,
    pub description: String,
    pub duration_secs: u64,
    pub active: bool,
}

/// Every event the pipeline can put on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Market(MarketEvent),
    Quiz(QuizEvent),
    Recommendation(RecommendationEvent),
    Forecast(ForecastEvent),
    Global(GlobalMarketEvent),
}

impl GameEvent {
    pub fn id(&self) -> &str {
        match self {
            GameEvent::Market(e) => &e.id,
            GameEvent::Quiz(e) => &e.id,
            GameEvent::Recommendation(e) => &e.id,
            GameEvent::Forecast(e) => &e.id,
            GameEvent::Global(e) => &e.id,
        }
    }

    /// Display lane; global modifiers span the whole screen.
    pub fn lane(&self) -> Option<u8> {
        match self {
            GameEvent::Market(e) => Some(e.lane),
            GameEvent::Quiz(e) => Some(e.lane),
            GameEvent::Recommendation(e) => Some(e.lane),
            GameEvent::Forecast(e) => Some(e.lane),
            GameEvent::Global(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player stats
// ---------------------------------------------------------------------------

/// Progress the pipeline tracks across quizzes, forecasts and demo trades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    pub equity: f64,
    pub streak: u32,
    pub gemin: u64,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            equity: 100_000.0,
            streak: 0,
            gemin: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for Alpha Infinity.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Lane {lane} is outside the road (0..{lane_count})")]
    InvalidLane { lane: usize, lane_count: usize },

    #[error("Event not found: {0}")]
    UnknownEvent(String),

    #[error("Content generation error ({model}): {message}")]
    Generation { model: String, message: String },

    #[error("Malformed generated content: {0}")]
    MalformedResponse(String),

    #[error("Market data error ({data_source}): {message}")]
    MarketData { data_source: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Engine channel closed")]
    ChannelClosed,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_assets_all() {
        assert_eq!(AllowedAssets::All.resolve().len(), 10);
    }

    #[test]
    fn test_allowed_assets_by_kind() {
        let crypto = AllowedAssets::Kinds(vec![AssetKind::Crypto]).resolve();
        assert_eq!(crypto.len(), 5);
        assert!(crypto.iter().all(|a| a.kind == AssetKind::Crypto));
    }

    #[test]
    fn test_allowed_assets_empty() {
        assert!(AllowedAssets::Kinds(vec![]).resolve().is_empty());
    }

    #[test]
    fn test_presets() {
        let presets = GameConfig::presets();
        assert_eq!(presets.len(), 3);
        let rush = GameConfig::preset("crypto_rush").unwrap();
        assert_eq!(rush.settings.road_speed, 3.5);
        assert!(GameConfig::preset("nope").is_none());
    }

    #[test]
    fn test_polarity_from_change() {
        assert_eq!(Polarity::from_change(1.5), Polarity::Opportunity);
        assert_eq!(Polarity::from_change(-0.2), Polarity::Trap);
        assert_eq!(Polarity::from_change(0.0), Polarity::Trap);
    }

    #[test]
    fn test_modifier_suppression() {
        assert!(ModifierKind::Shock.suppresses(Polarity::Opportunity));
        assert!(!ModifierKind::Shock.suppresses(Polarity::Trap));
        assert!(ModifierKind::Streak.suppresses(Polarity::Trap));
        assert!(!ModifierKind::Streak.suppresses(Polarity::Opportunity));
    }

    #[test]
    fn test_forecast_resolve_keeps_prediction() {
        let mut f = ForecastEvent {
            id: "event-1".into(),
            lane: 1,
            symbol: "NVDA".into(),
            status: ForecastStatus::Predicted,
            initial_headline: "Chip reveal tomorrow".into(),
            prediction: Some(Outcome::Bearish),
            reward: 60.0,
            resolution: None,
            outcome: Outcome::Bullish,
            resolution_headline: "Chip beats benchmarks".into(),
        };
        f.resolve();
        assert_eq!(f.status, ForecastStatus::Resolved);
        assert_eq!(f.prediction, Some(Outcome::Bearish));
        let r = f.resolution.unwrap();
        assert_eq!(r.outcome, Outcome::Bullish);
        assert_eq!(r.correct, Some(false));
    }

    #[test]
    fn test_forecast_outcome_hidden_in_json() {
        let f = ForecastEvent {
            id: "event-2".into(),
            lane: 0,
            symbol: "TSLA".into(),
            status: ForecastStatus::Pending,
            initial_headline: "Hearing scheduled".into(),
            prediction: None,
            reward: 75.0,
            resolution: None,
            outcome: Outcome::Bearish,
            resolution_headline: "Fined".into(),
        };
        let json = serde_json::to_value(GameEvent::Forecast(f)).unwrap();
        assert_eq!(json["type"], "forecast");
        assert!(json.get("outcome").is_none());
        assert!(json.get("resolution_headline").is_none());
    }

    #[test]
    fn test_chart_analysis_camel_case() {
        let json = r#"{
            "analysisText": "Price climbed after the news.",
            "keyConcept": {"title": "Market Sentiment", "explanation": "How traders feel."},
            "relatedNews": [{"headline": "Chips rally", "source": "Bloomberg"}],
            "annotations": [{"index": 3, "text": "Rally Starts"}]
        }"#;
        let a: ChartAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(a.key_concept.title, "Market Sentiment");
        assert_eq!(a.annotations[0].index, 3);
    }

    #[test]
    fn test_global_event_has_no_lane() {
        let e = GameEvent::Global(GlobalMarketEvent {
            id: "event-9".into(),
            kind: ModifierKind::Shock,
            title: "Market Shock!".into(),
            description: String::new(),
            duration_secs: 20,
            active: true,
        });
        assert_eq!(e.lane(), None);
        assert_eq!(e.id(), "event-9");
    }
}
