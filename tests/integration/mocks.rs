//! Deterministic collaborators for integration testing.
//!
//! In-memory stand-ins for the content generator, the market data source
//! and the order service. Every call is recorded, and each mock can be
//! switched into a failing mode from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use alpha_infinity::llm::{CoachContext, ContentGenerator, EventDetails, ForecastHeadlines};
use alpha_infinity::market::{MarketData, OrderReceipt, OrderService, OrderSide};
use alpha_infinity::types::*;

// ---------------------------------------------------------------------------
// Content generator
// ---------------------------------------------------------------------------

/// Generator with canned, input-derived replies.
#[derive(Default)]
pub struct ScriptedGenerator {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let g = Self::default();
        g.set_failing(true);
        g
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("generator unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn market_event_details(
        &self,
        symbol: &str,
        pct_change: f64,
        headline: &str,
    ) -> Result<EventDetails> {
        self.check()?;
        Ok(EventDetails {
            title: format!("{symbol} {}", if pct_change > 0.0 { "surges" } else { "slides" }),
            explanation: format!("Traders react to: {headline}"),
        })
    }

    async fn forecast_headlines(&self, symbol: &str, outcome: Outcome) -> Result<ForecastHeadlines> {
        self.check()?;
        Ok(ForecastHeadlines {
            initial_headline: format!("{symbol} awaits regulator decision"),
            resolution_headline: format!("{symbol} decision is {outcome}"),
            outcome: Some(outcome),
        })
    }

    async fn chart_analysis(&self, event: &MarketEvent) -> Result<ChartAnalysis> {
        self.check()?;
        Ok(ChartAnalysis {
            analysis_text: format!("{} moved on the news.", event.symbol),
            key_concept: KeyConcept {
                title: "Volatility".into(),
                explanation: "How much prices swing.".into(),
            },
            related_news: Vec::new(),
            annotations: vec![Annotation { index: 2, text: "Break".into() }],
        })
    }

    async fn live_news_headlines(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(vec!["Markets steady ahead of CPI".into()])
    }

    async fn news_headline(&self, asset: Asset, impact: f64) -> Result<String> {
        self.check()?;
        Ok(format!("{} {} on scripted news", asset.symbol, if impact > 0.0 { "jumps" } else { "drops" }))
    }

    async fn coach_reply(&self, _question: &str, context: &CoachContext) -> Result<String> {
        self.check()?;
        Ok(format!("You have {} gemin.", context.stats.gemin))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Fixed per-symbol closes and a headline per symbol.
pub struct ScriptedMarket {
    closes: HashMap<String, f64>,
    history_calls: AtomicUsize,
}

impl ScriptedMarket {
    pub fn new(closes: &[(&str, f64)]) -> Self {
        Self {
            closes: closes.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            history_calls: AtomicUsize::new(0),
        }
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketData for ScriptedMarket {
    async fn price_history(&self, symbol: &str) -> Vec<PricePoint> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        match self.closes.get(symbol) {
            Some(close) => (0..15)
                .map(|i| PricePoint {
                    time: i,
                    price: close - (14 - i) as f64 * 0.1,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    async fn recent_news(&self, symbol: &str) -> NewsArticle {
        NewsArticle {
            headline: format!("{symbol} in the headlines"),
            source: "scripted".into(),
            url: format!("https://news.test/{symbol}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub symbol: String,
    pub qty: Decimal,
    pub side: OrderSide,
    pub stop_price: Option<Decimal>,
}

/// Records orders; equity is fixed.
pub struct RecordingOrders {
    equity: Decimal,
    orders: Mutex<Vec<PlacedOrder>>,
    liquidations: AtomicUsize,
    force_error: Mutex<Option<String>>,
}

impl RecordingOrders {
    pub fn new(equity: Decimal) -> Self {
        Self {
            equity,
            orders: Mutex::new(Vec::new()),
            liquidations: AtomicUsize::new(0),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn orders(&self) -> Vec<PlacedOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn liquidations(&self) -> usize {
        self.liquidations.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderService for RecordingOrders {
    async fn account_equity(&self) -> Result<Decimal> {
        self.check()?;
        Ok(self.equity)
    }

    async fn place_order(
        &self,
        symbol: &str,
        qty: Decimal,
        side: OrderSide,
        stop_price: Option<Decimal>,
    ) -> Result<OrderReceipt> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap();
        orders.push(PlacedOrder {
            symbol: symbol.to_string(),
            qty,
            side,
            stop_price,
        });
        Ok(OrderReceipt {
            id: format!("order-{}", orders.len()),
            status: "accepted".into(),
            symbol: symbol.to_string(),
        })
    }

    async fn close_all_positions(&self) -> Result<()> {
        self.check()?;
        self.liquidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
