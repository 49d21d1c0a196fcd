//! Generated game content.
//!
//! Defines the `ContentGenerator` trait the engines call for headlines,
//! event explanations, forecasts and chart analysis, and provides the
//! Gemini implementation. Every call may fail; callers degrade.

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::types::{Asset, ChartAnalysis, MarketEvent, Outcome, PlayerStats, Polarity};

/// Title and explanation for a market event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub explanation: String,
}

/// Setup and payoff headlines for a forecast, written for a fixed outcome.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastHeadlines {
    pub initial_headline: String,
    pub resolution_headline: String,
    /// Outcome the headlines were written for, when the reply states one.
    #[serde(default)]
    pub outcome: Option<Outcome>,
}

/// A market event as the coach sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleEvent {
    pub polarity: Polarity,
    pub symbol: String,
    pub value: f64,
}

/// Game snapshot handed to the coach alongside the player's question.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachContext {
    pub stats: PlayerStats,
    pub visible_events: Vec<VisibleEvent>,
}

/// Abstraction over the content-generation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Explain a price move of `pct_change` percent given a headline.
    async fn market_event_details(
        &self,
        symbol: &str,
        pct_change: f64,
        headline: &str,
    ) -> Result<EventDetails>;

    /// Both forecast headlines in one call, matching `outcome`.
    async fn forecast_headlines(&self, symbol: &str, outcome: Outcome) -> Result<ForecastHeadlines>;

    /// Annotated analysis of a market event's price history.
    async fn chart_analysis(&self, event: &MarketEvent) -> Result<ChartAnalysis>;

    /// A batch of breaking headlines for the news ticker.
    async fn live_news_headlines(&self) -> Result<Vec<String>>;

    /// A short headline that would move `asset` in the direction of `impact`.
    async fn news_headline(&self, asset: Asset, impact: f64) -> Result<String>;

    /// One-sentence coaching reply.
    async fn coach_reply(&self, question: &str, context: &CoachContext) -> Result<String>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}
