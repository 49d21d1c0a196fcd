//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::GameError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub game: GameSection,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub market_data: MarketDataConfig,
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GameSection {
    /// Id of a built-in preset or a saved custom config.
    pub preset: String,
    #[serde(default = "default_true")]
    pub news_enabled: bool,
    #[serde(default)]
    pub autopilot: bool,
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: u32,
}

/// Rates and limits for the market event pipeline.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Game speed multiplier; scheduler periods are divided by it.
    pub speed: f64,
    pub global_cooldown_secs: u64,
    pub symbol_cooldown_secs: u64,
    /// Minimum absolute percent move for crypto ticks.
    pub crypto_threshold_pct: f64,
    /// Minimum absolute percent move for equity ticks.
    pub stock_threshold_pct: f64,
    pub max_events: usize,
    pub demo_interval_secs: u64,
    pub forecast_delay_secs: u64,
    pub modifier_duration_secs: u64,
    pub recommendation_ttl_secs: u64,
    pub headline_refresh_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            global_cooldown_secs: 10,
            symbol_cooldown_secs: 60,
            crypto_threshold_pct: 0.02,
            stock_threshold_pct: 0.01,
            max_events: 15,
            demo_interval_secs: 30,
            forecast_delay_secs: 8,
            modifier_duration_secs: 20,
            recommendation_ttl_secs: 5,
            headline_refresh_secs: 90,
        }
    }
}

impl PipelineConfig {
    /// A base period shortened by the speed multiplier.
    pub fn scaled(&self, secs: u64) -> Duration {
        let speed = if self.speed > 0.0 { self.speed } else { 1.0 };
        Duration::from_secs_f64(secs as f64 / speed)
    }

    pub fn demo_period(&self) -> Duration {
        self.scaled(self.demo_interval_secs)
    }

    pub fn forecast_delay(&self) -> Duration {
        self.scaled(self.forecast_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketDataConfig {
    pub key_env: String,
    pub secret_env: String,
    pub stream_url: String,
    pub crypto_stream_url: String,
    pub data_url: String,
    pub news_url: String,
    pub trading_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "alpha_saved_configs.json".into(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_frame_rate() -> u32 {
    60
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runners cannot work with.
    pub fn validate(&self) -> Result<(), GameError> {
        let p = &self.pipeline;
        if self.game.frame_rate_hz == 0 {
            return Err(GameError::Config("game.frame_rate_hz must be positive".into()));
        }
        if p.speed.is_nan() || p.speed <= 0.0 {
            return Err(GameError::Config(format!("pipeline.speed must be positive, got {}", p.speed)));
        }
        if p.max_events == 0 {
            return Err(GameError::Config("pipeline.max_events must be positive".into()));
        }
        if p.demo_interval_secs == 0 {
            return Err(GameError::Config("pipeline.demo_interval_secs must be positive".into()));
        }
        if p.crypto_threshold_pct < 0.0 || p.stock_threshold_pct < 0.0 {
            return Err(GameError::Config("pipeline thresholds cannot be negative".into()));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
