//! Google Gemini content generation.
//!
//! Implements `ContentGenerator` on top of the `generateContent` REST
//! endpoint. Structured calls run in JSON response mode, and replies
//! wrapped in markdown fences or prose are still accepted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CoachContext, ContentGenerator, EventDetails, ForecastHeadlines};
use crate::types::{Asset, ChartAnalysis, GameError, MarketEvent, Outcome, Polarity};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

const KEY_CONCEPTS: &[&str] = &[
    "Price vs. Value",
    "Reading Candlestick Charts",
    "Market Sentiment",
    "Support and Resistance",
];

const COACH_PERSONA: &str = "You are a trading coach in a gamified learning app. \
    Provide a concise, encouraging, and educational answer in a single short sentence. \
    You can explain risk management (e.g. stop-loss), the basics of trading algorithms, \
    and how social sentiment can move markets.";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}

/// How the reply should be formatted.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ReplyFormat {
    Json,
    Text,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
    total_calls: std::sync::atomic::AtomicU64,
    total_tokens: std::sync::atomic::AtomicU64,
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            http,
            api_key: SecretString::new(api_key),
            base_url: GEMINI_API_URL.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_calls: std::sync::atomic::AtomicU64::new(0),
            total_tokens: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Send a generateContent request with retry + backoff.
    async fn call_api(&self, prompt: &str, format: ReplyFormat) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
                response_mime_type: match format {
                    ReplyFormat::Json => Some("application/json"),
                    ReplyFormat::Text => None,
                },
            },
        };
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying Gemini API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("x-goog-api-key", self.api_key.expose_secret())
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: GenerateResponse = response
                            .json()
                            .await
                            .context("Failed to parse Gemini response")?;

                        let tokens = body.usage_metadata.map(|u| u.total_token_count).unwrap_or(0);
                        self.total_calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        self.total_tokens
                            .fetch_add(tokens as u64, std::sync::atomic::Ordering::Relaxed);

                        let text = Self::response_text(body.candidates);
                        if text.trim().is_empty() {
                            return Err(GameError::Generation {
                                model: self.model.clone(),
                                message: "empty response".into(),
                            }
                            .into());
                        }
                        return Ok(text);
                    }

                    // Retryable errors: 429 (rate limit), 500+
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable Gemini API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    return Err(GameError::Generation {
                        model: self.model.clone(),
                        message: format!("HTTP {status}: {error_text}"),
                    }
                    .into());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Gemini request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        Err(GameError::Generation {
            model: self.model.clone(),
            message: format!(
                "failed after {} retries: {}",
                MAX_RETRIES,
                last_error.unwrap_or_default()
            ),
        }
        .into())
    }

    /// Call the API and decode a JSON reply into `T`.
    async fn call_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let text = self.call_api(prompt, ReplyFormat::Json).await?;
        Ok(parse_json(&text)?)
    }

    fn response_text(candidates: Vec<Candidate>) -> String {
        candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }

    // -- Prompts ---------------------------------------------------------

    pub fn build_event_details_prompt(symbol: &str, pct_change: f64, headline: &str) -> String {
        let polarity = Polarity::from_change(pct_change);
        format!(
            "You create engaging, educational content for a financial education game.\n\
             A market event just occurred for {symbol}.\n\
             - News headline: \"{headline}\"\n\
             - Price change: {pct_change:.2}%\n\
             Return a JSON object for a market {polarity} with two fields:\n\
             1. \"title\": a very short, catchy title.\n\
             2. \"explanation\": one or two simple sentences on why the news could cause this move."
        )
    }

    pub fn build_forecast_prompt(symbol: &str, outcome: Outcome) -> String {
        format!(
            "Create a two-part news event for {symbol} whose final outcome is {outcome}.\n\
             Return a JSON object with:\n\
             1. \"initialHeadline\": an upcoming event or rumour that creates uncertainty.\n\
             2. \"resolutionHeadline\": a follow-up that clearly states the {outcome} outcome.\n\
             3. \"outcome\": the string \"{outcome}\"."
        )
    }

    pub fn build_chart_prompt(event: &MarketEvent, concept: &str) -> String {
        let prices: Vec<String> = event
            .price_history
            .iter()
            .map(|p| format!("{:.2}", p.price))
            .collect();
        format!(
            "Analyze this market event for a beginner.\n\
             - Symbol: {}\n\
             - News: \"{}\"\n\
             - Price history (last {} intervals): [{}]\n\
             Return one JSON object with: \"analysisText\" (two sentences linking chart and news), \
             \"keyConcept\" {{\"title\", \"explanation\"}} using the concept '{concept}', \
             \"relatedNews\" (two {{\"headline\", \"source\"}} items), and \
             \"annotations\" (two {{\"index\", \"text\"}} items pointing at notable price indices).",
            event.symbol,
            event.news.headline,
            prices.len(),
            prices.join(", ")
        )
    }

    pub fn build_headline_prompt(asset: Asset, impact: f64) -> String {
        let direction = if impact > 0.0 { "positive" } else { "negative" };
        format!(
            "Generate a very short, punchy, fake news headline for the {} {} that would cause \
             a {direction} price movement. Maximum 10 words.",
            asset.kind, asset.symbol
        )
    }

    pub fn build_coach_prompt(question: &str, context: &CoachContext) -> String {
        let events = if context.visible_events.is_empty() {
            "No significant events on screen.".to_string()
        } else {
            context
                .visible_events
                .iter()
                .map(|e| format!("{}: {} for {:.2} P&L", e.polarity, e.symbol, e.value))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{COACH_PERSONA}\n---\nCURRENT GAME STATE:\n- Equity: {:.2}\n- Current Streak: {}\n\
             - Gemin Balance: {}\n- Visible Market Events: {events}\n---\nUser's Question: \"{question}\"",
            context.stats.equity, context.stats.streak, context.stats.gemin
        )
    }

    // -- Accessors for monitoring ----------------------------------------

    /// Total number of successful API calls.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Total tokens reported by the API.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(std::sync::atomic::Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Slice out the JSON payload, tolerating markdown fences and prose.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    let start = trimmed.find(|c| c == '{' || c == '[');
    let end = trimmed.rfind(|c| c == '}' || c == ']');
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &trimmed[s..=e],
        _ => trimmed,
    }
}

/// Decode a model reply into `T`, mapping failures to `MalformedResponse`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, GameError> {
    serde_json::from_str(extract_json(text))
        .map_err(|e| GameError::MalformedResponse(format!("{e}: {}", truncate(text, 120))))
}

/// Clean a free-text headline: single line, no quotes.
pub fn clean_headline(text: &str) -> String {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .replace('"', "")
        .trim()
        .to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// ContentGenerator implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn market_event_details(
        &self,
        symbol: &str,
        pct_change: f64,
        headline: &str,
    ) -> Result<EventDetails> {
        let prompt = Self::build_event_details_prompt(symbol, pct_change, headline);
        let details: EventDetails = self
            .call_json(&prompt)
            .await
            .with_context(|| format!("Event details for {symbol}"))?;
        debug!(symbol, title = %details.title, "Event details generated");
        Ok(details)
    }

    async fn forecast_headlines(&self, symbol: &str, outcome: Outcome) -> Result<ForecastHeadlines> {
        let prompt = Self::build_forecast_prompt(symbol, outcome);
        self.call_json(&prompt)
            .await
            .with_context(|| format!("Forecast headlines for {symbol}"))
    }

    async fn chart_analysis(&self, event: &MarketEvent) -> Result<ChartAnalysis> {
        let concept = KEY_CONCEPTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(KEY_CONCEPTS[0]);
        let prompt = Self::build_chart_prompt(event, concept);
        let analysis: ChartAnalysis = self
            .call_json(&prompt)
            .await
            .with_context(|| format!("Chart analysis for {}", event.symbol))?;
        info!(event_id = %event.id, concept, "Chart analysis generated");
        Ok(analysis)
    }

    async fn live_news_headlines(&self) -> Result<Vec<String>> {
        let prompt = "You are a financial news AI. Generate a JSON array of 5 realistic, breaking \
                      financial news headlines covering stocks, crypto, and macroeconomic events. \
                      Mix positive and negative. Return a simple JSON array of strings.";
        self.call_json(prompt).await.context("Live news headlines")
    }

    async fn news_headline(&self, asset: Asset, impact: f64) -> Result<String> {
        let prompt = Self::build_headline_prompt(asset, impact);
        let text = self.call_api(&prompt, ReplyFormat::Text).await?;
        Ok(clean_headline(&text))
    }

    async fn coach_reply(&self, question: &str, context: &CoachContext) -> Result<String> {
        let prompt = Self::build_coach_prompt(question, context);
        let text = self.call_api(&prompt, ReplyFormat::Text).await?;
        Ok(text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::VisibleEvent;
    use crate::types::{
        AssetKind, EnrichmentState, NewsArticle, PlayerStats, PricePoint, ASSETS,
    };

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let text = "```json\n{\"title\": \"Rally\", \"explanation\": \"Up.\"}\n```";
        let d: EventDetails = parse_json(text).unwrap();
        assert_eq!(d.title, "Rally");
    }

    #[test]
    fn test_extract_json_array() {
        let text = "Here you go: [\"One\", \"Two\"]";
        let v: Vec<String> = parse_json(text).unwrap();
        assert_eq!(v, vec!["One", "Two"]);
    }

    #[test]
    fn test_parse_json_malformed() {
        let r: Result<EventDetails, _> = parse_json("{\"title\": 3}");
        assert!(matches!(r, Err(GameError::MalformedResponse(_))));
        let r: Result<EventDetails, _> = parse_json("no json here");
        assert!(r.is_err());
    }

    #[test]
    fn test_forecast_headlines_camel_case() {
        let text = r#"{"initialHeadline": "Hearing tomorrow", "resolutionHeadline": "Cleared", "outcome": "bullish"}"#;
        let h: ForecastHeadlines = parse_json(text).unwrap();
        assert_eq!(h.initial_headline, "Hearing tomorrow");
        assert_eq!(h.resolution_headline, "Cleared");
        assert_eq!(h.outcome, Some(Outcome::Bullish));

        let h: ForecastHeadlines =
            parse_json(r#"{"initialHeadline": "Hearing", "resolutionHeadline": "Cleared"}"#).unwrap();
        assert_eq!(h.outcome, None);
    }

    #[test]
    fn test_clean_headline() {
        assert_eq!(clean_headline("\n\"NVDA Soars On AI Deal\"\nextra"), "NVDA Soars On AI Deal");
        assert_eq!(clean_headline("   "), "");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let candidates = vec![Candidate {
            content: Some(Content {
                role: Some("model".into()),
                parts: vec![
                    Part { text: Some("{\"a\":".into()) },
                    Part { text: Some("1}".into()) },
                ],
            }),
        }];
        assert_eq!(GeminiClient::response_text(candidates), "{\"a\":1}");
        assert_eq!(GeminiClient::response_text(Vec::new()), "");
    }

    #[test]
    fn test_event_prompt_mentions_polarity() {
        let p = GeminiClient::build_event_details_prompt("NVDA", -1.5, "Chip export ban");
        assert!(p.contains("market trap"));
        assert!(p.contains("-1.50%"));
        assert!(p.contains("Chip export ban"));
    }

    #[test]
    fn test_headline_prompt_direction() {
        let btc = ASSETS[0];
        assert_eq!(btc.kind, AssetKind::Crypto);
        let p = GeminiClient::build_headline_prompt(btc, 0.7);
        assert!(p.contains("cryptocurrency BTC"));
        assert!(p.contains("positive"));
    }

    #[test]
    fn test_chart_prompt_lists_prices() {
        let event = MarketEvent {
            id: "event-1".into(),
            lane: 0,
            polarity: Polarity::Opportunity,
            symbol: "AAPL".into(),
            value: 12.0,
            title: "t".into(),
            explanation: "e".into(),
            news: NewsArticle::generic("AAPL"),
            price_history: vec![
                PricePoint { time: 0, price: 100.0 },
                PricePoint { time: 1, price: 101.5 },
            ],
            analysis: None,
            enrichment: EnrichmentState::Enriched,
        };
        let p = GeminiClient::build_chart_prompt(&event, "Market Sentiment");
        assert!(p.contains("[100.00, 101.50]"));
        assert!(p.contains("Market Sentiment"));
    }

    #[test]
    fn test_coach_prompt_context() {
        let ctx = CoachContext {
            stats: PlayerStats::default(),
            visible_events: vec![VisibleEvent {
                polarity: Polarity::Trap,
                symbol: "TSLA".into(),
                value: -20.0,
            }],
        };
        let p = GeminiClient::build_coach_prompt("Should I set a stop?", &ctx);
        assert!(p.contains("trap: TSLA for -20.00 P&L"));
        assert!(p.contains("Should I set a stop?"));
    }

    #[test]
    fn test_client_construction() {
        let c = GeminiClient::new("key".into(), None, None).unwrap();
        assert_eq!(c.model_name(), DEFAULT_MODEL);
        assert_eq!(c.total_calls(), 0);
        assert_eq!(c.total_tokens(), 0);
    }
}
