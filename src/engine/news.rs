//! Market news for the lane runner.
//!
//! While the session runs in news mode a desk task sleeps a random
//! 10–20 seconds, asks the content generator for a headline about a random
//! allowed asset, and hands the result to the session as a command. The
//! session applies it on its own thread of control, so the frame step never
//! waits on the network.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::SessionCommand;
use super::state::NewsItem;
use crate::llm::ContentGenerator;
use crate::types::Asset;

const MIN_DELAY_SECS: f64 = 10.0;
const MAX_DELAY_SECS: f64 = 20.0;
const MIN_IMPACT: f64 = 0.5;
const MAX_IMPACT: f64 = 1.0;

pub struct NewsDesk {
    generator: Arc<dyn ContentGenerator>,
    pool: Vec<Asset>,
}

impl NewsDesk {
    pub fn new(generator: Arc<dyn ContentGenerator>, pool: Vec<Asset>) -> Self {
        Self { generator, pool }
    }

    /// Wait before the next headline.
    pub fn next_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
        Duration::from_secs_f64(rng.gen_range(MIN_DELAY_SECS..MAX_DELAY_SECS))
    }

    /// Pick the asset and signed impact for the next headline.
    /// `None` when no assets are allowed.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Asset, f64)> {
        if self.pool.is_empty() {
            return None;
        }
        let asset = self.pool[rng.gen_range(0..self.pool.len())];
        let magnitude = rng.gen_range(MIN_IMPACT..MAX_IMPACT);
        let impact = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
        Some((asset, impact))
    }

    /// Generated headline, or a stock line when generation fails or comes back empty.
    pub async fn headline(&self, asset: Asset, impact: f64) -> String {
        match self.generator.news_headline(asset, impact).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => format!("Major news hits {}!", asset.symbol),
            Err(e) => {
                warn!(symbol = asset.symbol, error = %e, "Headline generation failed");
                format!("Volatility spike for {}!", asset.symbol)
            }
        }
    }

    /// One news item, ready to apply. `game_time` is stamped by the session.
    pub async fn compose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NewsItem> {
        let (asset, impact) = self.draw(rng)?;
        let headline = self.headline(asset, impact).await;
        Some(NewsItem {
            id: format!("news-{}", uuid::Uuid::new_v4()),
            asset,
            headline,
            impact,
            game_time: 0,
        })
    }

    /// Run the desk until the session goes away or the handle is aborted.
    /// The desk holds only a weak sender, so it never keeps the session alive.
    pub fn spawn(self, commands: mpsc::WeakSender<SessionCommand>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            info!(assets = self.pool.len(), "News desk started");
            loop {
                tokio::time::sleep(Self::next_delay(&mut rng)).await;

                let Some(item) = self.compose(&mut rng).await else {
                    debug!("No allowed assets, skipping headline");
                    continue;
                };
                debug!(symbol = item.asset.symbol, impact = item.impact, headline = %item.headline, "News generated");

                let Some(tx) = commands.upgrade() else { break };
                if tx.send(SessionCommand::ApplyNews(item)).await.is_err() {
                    break;
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
