//! Synthetic event generation for the scheduler.
//!
//! Each scheduler tick makes exactly one choice. Market synthesis only
//! happens in demo mode; forecasts and the zero-cost events run in both.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::{self, headlines, quiz};
use crate::market::{SYMBOLS, TECH_SYMBOLS};
use crate::types::{
    EnrichmentState, EventId, GlobalMarketEvent, MarketEvent, ModifierKind, NewsArticle, Outcome,
    Polarity, PricePoint, QuizEvent, QuizKind, RecommendationEvent,
};

/// Chance that a market slot becomes a global modifier instead.
pub const MODIFIER_CHANCE: f64 = 0.15;

/// Share of quizzes that block play until answered.
pub const MANDATORY_QUIZ_CHANCE: f64 = 0.2;

/// Lanes available to market and forecast events.
pub const EVENT_LANES: u8 = 3;

const HISTORY_LEN: u32 = 15;
const MIN_REWARD: f64 = 50.0;
const MAX_REWARD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoAction {
    Market,
    Forecast,
    Quiz,
    Recommendation,
}

/// One action for this tick. Outside demo mode the market slot rolls into a forecast.
pub fn choose_action<R: Rng + ?Sized>(rng: &mut R, demo: bool) -> DemoAction {
    let r: f64 = rng.gen();
    if demo && r < 0.33 {
        DemoAction::Market
    } else if r < 0.66 {
        DemoAction::Forecast
    } else if rng.gen_bool(0.5) {
        DemoAction::Quiz
    } else {
        DemoAction::Recommendation
    }
}

pub fn random_lane<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(0..EVENT_LANES)
}

pub fn random_symbol<R: Rng + ?Sized>(rng: &mut R, pool: &[&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or(SYMBOLS[0])
}

/// Advisory pulse for demo mode: -1, 0 or 1.
pub fn market_pulse<R: Rng + ?Sized>(rng: &mut R) -> i8 {
    rng.gen_range(-1..=1)
}

pub fn global_modifier<R: Rng + ?Sized>(id: EventId, duration_secs: u64, rng: &mut R) -> GlobalMarketEvent {
    let (kind, title, description) = if rng.gen_bool(0.5) {
        (
            ModifierKind::Shock,
            "Market Shock!",
            "Negative news drags the market down!",
        )
    } else {
        (
            ModifierKind::Streak,
            "Sector Rally!",
            "Tech sector booms on breakthrough news!",
        )
    };
    GlobalMarketEvent {
        id,
        kind,
        title: title.into(),
        description: description.into(),
        duration_secs,
        active: true,
    }
}

/// A synthetic price move, biased by the active modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMove {
    pub symbol: &'static str,
    pub pct: f64,
}

pub fn synthetic_move<R: Rng + ?Sized>(rng: &mut R, modifier: Option<ModifierKind>) -> SyntheticMove {
    let pct = (rng.gen::<f64>() - 0.45) * 5.0;
    match modifier {
        Some(ModifierKind::Shock) => SyntheticMove {
            symbol: random_symbol(rng, SYMBOLS),
            pct: -pct.abs(),
        },
        Some(ModifierKind::Streak) => SyntheticMove {
            symbol: random_symbol(rng, TECH_SYMBOLS),
            pct: pct.abs(),
        },
        None => SyntheticMove {
            symbol: random_symbol(rng, SYMBOLS),
            pct,
        },
    }
}

/// Provisional market event for a synthetic move, with a wavy local history.
pub fn synthetic_event<R: Rng + ?Sized>(id: EventId, mv: &SyntheticMove, rng: &mut R) -> MarketEvent {
    let polarity = Polarity::from_change(mv.pct);
    let value = (mv.pct * 10.0).abs() + 5.0;
    let price_history = (0..HISTORY_LEN)
        .map(|i| PricePoint {
            time: i,
            price: 100.0 + (i as f64).sin() * mv.pct + (rng.gen::<f64>() - 0.5) * 2.0,
        })
        .collect();

    MarketEvent {
        id,
        lane: random_lane(rng),
        polarity,
        symbol: mv.symbol.to_string(),
        value: value * polarity.sign(),
        title: "Market Movement".into(),
        explanation: "Price has changed.".into(),
        news: NewsArticle {
            headline: headlines::mock_headline(mv.symbol, rng),
            source: "MarketWatch".into(),
            url: String::new(),
        },
        price_history,
        analysis: None,
        enrichment: EnrichmentState::Provisional,
    }
}

pub fn forecast_outcome<R: Rng + ?Sized>(rng: &mut R) -> Outcome {
    if rng.gen_bool(0.5) {
        Outcome::Bullish
    } else {
        Outcome::Bearish
    }
}

pub fn forecast_reward<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(MIN_REWARD..MAX_REWARD)
}

pub fn quiz_event<R: Rng + ?Sized>(id: EventId, rng: &mut R) -> QuizEvent {
    let kind = if rng.gen_bool(MANDATORY_QUIZ_CHANCE) {
        QuizKind::Mandatory
    } else {
        QuizKind::Optional
    };
    let text = match kind {
        QuizKind::Mandatory => "Pop quiz! Answer to keep playing.",
        QuizKind::Optional => "Test your knowledge!",
    };
    QuizEvent {
        id,
        lane: 0,
        kind,
        question: quiz::random_question(rng),
        text: text.into(),
    }
}

pub fn recommendation_event<R: Rng + ?Sized>(id: EventId, rng: &mut R) -> RecommendationEvent {
    RecommendationEvent {
        id,
        lane: 0,
        text: data::random_recommendation(rng).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
