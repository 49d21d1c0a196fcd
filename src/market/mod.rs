//! Market data integrations.
//!
//! Defines the `MarketData` and `OrderService` traits the pipeline and the
//! dashboard depend on, plus the Alpaca implementations:
//! - `alpaca`: REST bars, news, account and orders
//! - `stream`: WebSocket trade feed for the live pipeline

pub mod alpaca;
pub mod stream;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::types::{NewsArticle, PricePoint};

// ---------------------------------------------------------------------------
// Symbol universe
// ---------------------------------------------------------------------------

/// Symbols the live feed subscribes to and demo mode draws from.
pub const SYMBOLS: &[&str] = &[
    "NVDA", "TSLA", "GOOG", "MSFT", "AAPL", "AMZN", "META", "BTC/USD", "ETH/USD", "SOL/USD",
];

/// The tech subset favoured during a sector rally.
pub const TECH_SYMBOLS: &[&str] = &["NVDA", "GOOG", "MSFT", "AAPL", "AMZN", "META"];

/// Benchmark that drives the market pulse.
pub const BENCHMARK: &str = "SPY";

/// Crypto pairs are written with a slash (`BTC/USD`).
pub fn is_crypto(symbol: &str) -> bool {
    symbol.contains('/')
}

/// Credential key that selects demo mode.
pub const DEMO_KEY: &str = "demo";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Market data credentials. The sentinel key `demo` (or no key) means demo mode.
#[derive(Clone)]
pub struct Credentials {
    pub key: SecretString,
    pub secret: SecretString,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: SecretString::new(key.into()),
            secret: SecretString::new(secret.into()),
        }
    }

    pub fn demo() -> Self {
        Self::new(DEMO_KEY, DEMO_KEY)
    }

    pub fn is_demo(&self) -> bool {
        let key = self.key.expose_secret();
        key.is_empty() || key == DEMO_KEY
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("demo", &self.is_demo())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read-only market data. Both lookups are infallible by contract: failures
/// come back as an empty history or the generic article.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Recent closes, oldest first. Empty when unavailable.
    async fn price_history(&self, symbol: &str) -> Vec<PricePoint>;

    /// Most recent article for `symbol`, or `NewsArticle::generic`.
    async fn recent_news(&self, symbol: &str) -> NewsArticle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Acknowledgement returned by the broker for a new order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderReceipt {
    pub id: String,
    #[serde(default)]
    pub status: String,
    pub symbol: String,
}

/// Account and order operations for live trading.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn account_equity(&self) -> Result<Decimal>;

    async fn place_order(
        &self,
        symbol: &str,
        qty: Decimal,
        side: OrderSide,
        stop_price: Option<Decimal>,
    ) -> Result<OrderReceipt>;

    async fn close_all_positions(&self) -> Result<()>;
}
