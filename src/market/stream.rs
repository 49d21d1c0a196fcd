//! Alpaca WebSocket trade feed.
//!
//! Two connections: equities plus the benchmark on the SIP stream, and
//! crypto pairs on the crypto stream. Each authenticates, subscribes to
//! trades, and forwards parsed ticks to the pipeline. A dropped connection
//! is retried with exponential backoff until the pipeline goes away.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{is_crypto, Credentials, BENCHMARK, SYMBOLS};
use crate::config::MarketDataConfig;
use crate::pipeline::PipelineMessage;

const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60_000;

/// A parsed feed message the pipeline cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Trade { symbol: String, price: f64, size: f64 },
    Benchmark(f64),
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(rename = "T")]
    kind: String,
    #[serde(rename = "S", default)]
    symbol: Option<String>,
    #[serde(rename = "p", default)]
    price: Option<f64>,
    #[serde(rename = "s", default)]
    size: Option<f64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Parse one text frame (an array of messages) into feed events.
/// Control messages are logged and skipped; unparseable frames yield nothing.
pub fn parse_messages(text: &str) -> Vec<FeedEvent> {
    let messages: Vec<StreamMessage> = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "Ignoring non-array stream frame");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for m in messages {
        match m.kind.as_str() {
            "t" | "ct" => {
                let (Some(symbol), Some(price)) = (m.symbol, m.price) else {
                    continue;
                };
                if symbol == BENCHMARK {
                    events.push(FeedEvent::Benchmark(price));
                } else if let Some(size) = m.size {
                    events.push(FeedEvent::Trade { symbol, price, size });
                }
            }
            "success" | "subscription" => debug!(kind = %m.kind, msg = ?m.msg, "Stream control message"),
            "error" => warn!(code = ?m.code, msg = ?m.msg, "Stream error message"),
            _ => {}
        }
    }
    events
}

fn auth_message(creds: &Credentials) -> String {
    json!({
        "action": "auth",
        "key": creds.key.expose_secret(),
        "secret": creds.secret.expose_secret(),
    })
    .to_string()
}

fn equity_subscription() -> String {
    let mut trades: Vec<&str> = SYMBOLS.iter().copied().filter(|s| !is_crypto(s)).collect();
    trades.push(BENCHMARK);
    json!({ "action": "subscribe", "trades": trades }).to_string()
}

fn crypto_subscription() -> String {
    let trades: Vec<&str> = SYMBOLS.iter().copied().filter(|s| is_crypto(s)).collect();
    json!({ "action": "subscribe", "trades": trades }).to_string()
}

/// Start both feed connections. Abort the handles to stop them.
pub fn spawn_feeds(
    creds: Credentials,
    cfg: &MarketDataConfig,
    sink: mpsc::Sender<PipelineMessage>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(run_feed(
            "equities",
            cfg.stream_url.clone(),
            creds.clone(),
            equity_subscription(),
            sink.clone(),
        )),
        tokio::spawn(run_feed(
            "crypto",
            cfg.crypto_stream_url.clone(),
            creds,
            crypto_subscription(),
            sink,
        )),
    ]
}

/// Keep one connection alive, reconnecting with backoff.
async fn run_feed(
    name: &'static str,
    url: String,
    creds: Credentials,
    subscription: String,
    sink: mpsc::Sender<PipelineMessage>,
) {
    let mut attempt: u32 = 0;
    loop {
        match stream_once(name, &url, &creds, &subscription, &sink).await {
            Ok(()) if sink.is_closed() => break,
            Ok(()) => {
                info!(feed = name, "Stream closed, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                warn!(feed = name, attempt, error = %e, "Stream connection failed");
                attempt += 1;
            }
        }
        if sink.is_closed() {
            break;
        }
        let delay = (BASE_BACKOFF_MS * 2u64.saturating_pow(attempt)).min(MAX_BACKOFF_MS);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    info!(feed = name, "Stream stopped");
}

async fn stream_once(
    name: &str,
    url: &str,
    creds: &Credentials,
    subscription: &str,
    sink: &mpsc::Sender<PipelineMessage>,
) -> Result<()> {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(auth_message(creds)))
        .await
        .context("Failed to send stream auth")?;
    write
        .send(Message::Text(subscription.to_string()))
        .await
        .context("Failed to send stream subscription")?;
    info!(feed = name, url, "Stream connected");

    while let Some(frame) = read.next().await {
        let frame = frame.context("Stream read failed")?;
        match frame {
            Message::Text(text) => {
                for event in parse_messages(&text) {
                    if sink.send(event.into()).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Message::Ping(payload) => {
                write.send(Message::Pong(payload)).await.context("Failed to answer ping")?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
