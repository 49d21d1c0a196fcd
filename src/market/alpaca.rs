//! Alpaca Markets REST integration.
//!
//! Historical bars and news come from the market data API; account and
//! order calls go to the trading API (paper by default).
//!
//! API docs: https://docs.alpaca.markets/reference
//! Auth: `APCA-API-KEY-ID` / `APCA-API-SECRET-KEY` headers on every call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{is_crypto, Credentials, MarketData, OrderReceipt, OrderService, OrderSide};
use crate::config::MarketDataConfig;
use crate::types::{GameError, NewsArticle, PricePoint};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DATA_SOURCE: &str = "alpaca";

/// Bars requested for a price history.
const HISTORY_BARS: u32 = 15;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Vec<Bar>>,
}

#[derive(Debug, Deserialize)]
struct Bar {
    /// Close price.
    c: f64,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    news: Vec<AlpacaArticle>,
}

#[derive(Debug, Deserialize)]
struct AlpacaArticle {
    headline: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    /// Decimal string, e.g. "100234.56".
    equity: String,
}

#[derive(Debug, Serialize)]
struct OrderRequest {
    symbol: String,
    qty: String,
    side: OrderSide,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<StopLoss>,
}

#[derive(Debug, Serialize)]
struct StopLoss {
    stop_price: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AlpacaClient {
    http: Client,
    creds: Credentials,
    data_url: String,
    news_url: String,
    trading_url: String,
}

impl AlpacaClient {
    pub fn new(creds: Credentials, cfg: &MarketDataConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("alpha-infinity/0.1.0")
            .build()
            .context("Failed to build HTTP client for Alpaca")?;

        Ok(Self {
            http,
            creds,
            data_url: cfg.data_url.trim_end_matches('/').to_string(),
            news_url: cfg.news_url.trim_end_matches('/').to_string(),
            trading_url: cfg.trading_url.trim_end_matches('/').to_string(),
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("APCA-API-KEY-ID", self.creds.key.expose_secret())
            .header("APCA-API-SECRET-KEY", self.creds.secret.expose_secret())
    }

    /// Bars endpoint for `symbol`. Crypto pairs drop the slash.
    pub fn bars_url(&self, symbol: &str) -> String {
        let (class, formatted) = if is_crypto(symbol) {
            ("crypto", symbol.replace('/', ""))
        } else {
            ("stocks", symbol.to_string())
        };
        format!(
            "{}/{class}/{formatted}/bars?timeframe=1Min&limit={HISTORY_BARS}",
            self.data_url
        )
    }

    /// News endpoint for `symbol`. Crypto pairs use only the base asset.
    pub fn news_url(&self, symbol: &str) -> String {
        let base = symbol.split('/').next().unwrap_or(symbol);
        format!("{}?symbols={}&limit=1", self.news_url, urlencoding::encode(base))
    }

    async fn fetch_bars(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        let url = self.bars_url(symbol);
        debug!(url = %url, "Fetching Alpaca bars");

        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Alpaca bars request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(market_error(format!("bars {status}: {body}")));
        }

        let body: BarsResponse = resp.json().await.context("Failed to parse Alpaca bars")?;
        Ok(closes_to_history(body.bars.unwrap_or_default()))
    }

    async fn fetch_news(&self, symbol: &str) -> Result<Option<NewsArticle>> {
        let resp = self
            .authed(self.http.get(self.news_url(symbol)))
            .send()
            .await
            .context("Alpaca news request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(market_error(format!("news {status}: {body}")));
        }

        let body: NewsResponse = resp.json().await.context("Failed to parse Alpaca news")?;
        Ok(body.news.into_iter().next().map(|a| NewsArticle {
            headline: a.headline,
            source: a.source,
            url: a.url,
        }))
    }

    /// Fail with the response body when the call was not a success.
    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(market_error(format!("{what} {status}: {body}")))
    }
}

fn market_error(message: String) -> anyhow::Error {
    GameError::MarketData {
        data_source: DATA_SOURCE.into(),
        message,
    }
    .into()
}

fn closes_to_history(bars: Vec<Bar>) -> Vec<PricePoint> {
    bars.into_iter()
        .enumerate()
        .map(|(i, b)| PricePoint {
            time: i as u32,
            price: b.c,
        })
        .collect()
}

/// Parse Alpaca's decimal-string equity.
pub fn parse_equity(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("Invalid equity value: {raw}"))
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketData for AlpacaClient {
    async fn price_history(&self, symbol: &str) -> Vec<PricePoint> {
        match self.fetch_bars(symbol).await {
            Ok(history) => history,
            Err(e) => {
                warn!(symbol, error = %e, "Price history unavailable");
                Vec::new()
            }
        }
    }

    async fn recent_news(&self, symbol: &str) -> NewsArticle {
        match self.fetch_news(symbol).await {
            Ok(Some(article)) => article,
            Ok(None) => NewsArticle::generic(symbol),
            Err(e) => {
                warn!(symbol, error = %e, "News lookup failed");
                NewsArticle::generic(symbol)
            }
        }
    }
}

#[async_trait]
impl OrderService for AlpacaClient {
    async fn account_equity(&self) -> Result<Decimal> {
        let url = format!("{}/v2/account", self.trading_url);
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Alpaca account request failed")?;
        let account: Account = Self::check(resp, "account")
            .await?
            .json()
            .await
            .context("Failed to parse Alpaca account")?;
        parse_equity(&account.equity)
    }

    async fn place_order(
        &self,
        symbol: &str,
        qty: Decimal,
        side: OrderSide,
        stop_price: Option<Decimal>,
    ) -> Result<OrderReceipt> {
        let order = build_order(symbol, qty, side, stop_price);
        let url = format!("{}/v2/orders", self.trading_url);

        let resp = self
            .authed(self.http.post(&url))
            .json(&order)
            .send()
            .await
            .context("Alpaca order request failed")?;
        let receipt: OrderReceipt = Self::check(resp, "order")
            .await?
            .json()
            .await
            .context("Failed to parse Alpaca order response")?;

        info!(symbol, qty = %qty, side = ?side, order_id = %receipt.id, "Order placed");
        Ok(receipt)
    }

    async fn close_all_positions(&self) -> Result<()> {
        let url = format!("{}/v2/positions", self.trading_url);
        let resp = self
            .authed(self.http.delete(&url))
            .send()
            .await
            .context("Alpaca close-positions request failed")?;
        Self::check(resp, "close positions").await?;
        info!("All positions closed");
        Ok(())
    }
}

fn build_order(symbol: &str, qty: Decimal, side: OrderSide, stop_price: Option<Decimal>) -> OrderRequest {
    OrderRequest {
        symbol: symbol.to_string(),
        qty: qty.to_string(),
        side,
        order_type: "market",
        time_in_force: "day",
        order_class: stop_price.map(|_| "simple"),
        stop_loss: stop_price.map(|p| StopLoss {
            stop_price: p.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
