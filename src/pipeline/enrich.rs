//! Asynchronous enrichment of pipeline events.
//!
//! These functions run on spawned tasks and never fail: every error path
//! returns a degraded event with placeholder text, so the merge step always
//! has something to put in place of the provisional stub.

use tracing::{debug, warn};

use crate::llm::{ContentGenerator, ForecastHeadlines};
use crate::market::MarketData;
use crate::types::{
    EnrichmentState, EventId, MarketEvent, NewsArticle, Outcome, Polarity, PricePoint,
};

const PROVISIONAL_HISTORY_LEN: usize = 15;

/// Provisional live event shown while enrichment is in flight.
pub fn provisional(
    id: EventId,
    lane: u8,
    symbol: &str,
    pct: f64,
    size: f64,
    last_price: f64,
) -> MarketEvent {
    let polarity = Polarity::from_change(pct);
    let value = (pct * 10.0).abs() + size / 100.0;
    MarketEvent {
        id,
        lane,
        polarity,
        symbol: symbol.to_string(),
        value: value * polarity.sign(),
        title: symbol.to_string(),
        explanation: "Analyzing market data...".into(),
        news: NewsArticle {
            headline: "Fetching latest news...".into(),
            source: String::new(),
            url: String::new(),
        },
        price_history: vec![PricePoint { time: 0, price: last_price }; PROVISIONAL_HISTORY_LEN],
        analysis: None,
        enrichment: EnrichmentState::Provisional,
    }
}

/// Degraded replacement, keeping id, lane and any history already present.
pub fn degraded(mut base: MarketEvent) -> MarketEvent {
    base.title = format!("{} - Data Error", base.symbol);
    base.explanation = "Could not load full details for this event.".into();
    base.enrichment = EnrichmentState::Degraded;
    base
}

/// Live enrichment: news first, then history and generated details together.
pub async fn enrich_live(
    market: &dyn MarketData,
    generator: &dyn ContentGenerator,
    base: MarketEvent,
    pct: f64,
) -> MarketEvent {
    let news = market.recent_news(&base.symbol).await;
    let (history, details) = tokio::join!(
        market.price_history(&base.symbol),
        generator.market_event_details(&base.symbol, pct, &news.headline),
    );

    match details {
        Ok(details) => {
            debug!(event_id = %base.id, symbol = %base.symbol, "Live event enriched");
            MarketEvent {
                title: details.title,
                explanation: details.explanation,
                price_history: if history.is_empty() { base.price_history } else { history },
                news,
                enrichment: EnrichmentState::Enriched,
                ..base
            }
        }
        Err(e) => {
            warn!(event_id = %base.id, symbol = %base.symbol, error = %e, "Enrichment failed, degrading event");
            degraded(MarketEvent { news, ..base })
        }
    }
}

/// Demo enrichment: the local headline stands in for a news lookup and the
/// synthetic history is kept.
pub async fn enrich_demo(generator: &dyn ContentGenerator, base: MarketEvent, pct: f64) -> MarketEvent {
    match generator
        .market_event_details(&base.symbol, pct, &base.news.headline)
        .await
    {
        Ok(details) => MarketEvent {
            title: details.title,
            explanation: details.explanation,
            enrichment: EnrichmentState::Enriched,
            ..base
        },
        Err(e) => {
            warn!(event_id = %base.id, symbol = %base.symbol, error = %e, "Demo enrichment failed, degrading event");
            degraded(base)
        }
    }
}

/// Forecast headlines for a predetermined outcome, with templates on failure.
pub async fn forecast_headlines(
    generator: &dyn ContentGenerator,
    symbol: &str,
    outcome: Outcome,
) -> ForecastHeadlines {
    match generator.forecast_headlines(symbol, outcome).await {
        Ok(h) if !h.initial_headline.trim().is_empty() => h,
        Ok(_) => template_headlines(symbol, outcome),
        Err(e) => {
            warn!(symbol, error = %e, "Forecast headline generation failed, using template");
            template_headlines(symbol, outcome)
        }
    }
}

pub fn template_headlines(symbol: &str, outcome: Outcome) -> ForecastHeadlines {
    let resolution_headline = match outcome {
        Outcome::Bullish => format!("{symbol} jumps as the announcement beats expectations."),
        Outcome::Bearish => format!("{symbol} slides as the announcement disappoints."),
    };
    ForecastHeadlines {
        initial_headline: format!("Traders await a major announcement from {symbol}."),
        resolution_headline,
        outcome: Some(outcome),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
