//! Persistence layer.
//!
//! Saves and loads the player's custom game configs and the has-played
//! flag to/from a JSON file. Built-in presets are never written.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{GameConfig, GameError};

/// Default saved-configs file path.
pub const DEFAULT_CONFIGS_FILE: &str = "alpha_saved_configs.json";

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedConfigs {
    /// Custom configs keyed by id.
    #[serde(default)]
    pub configs: BTreeMap<String, GameConfig>,
    #[serde(default)]
    pub has_played: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SavedConfigs {
    /// Add or replace a custom config. Preset ids are reserved.
    pub fn upsert(&mut self, config: GameConfig) -> Result<(), GameError> {
        if GameConfig::preset(&config.id).is_some() {
            return Err(GameError::Storage(format!(
                "'{}' is a built-in preset id",
                config.id
            )));
        }
        if config.id.trim().is_empty() {
            return Err(GameError::Storage("config id must not be empty".into()));
        }
        self.configs.insert(config.id.clone(), config);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<GameConfig> {
        self.configs.remove(id)
    }

    /// Resolve a config id: built-in presets first, then saved configs.
    pub fn resolve(&self, id: &str) -> Option<GameConfig> {
        GameConfig::preset(id).or_else(|| self.configs.get(id).cloned())
    }

    /// Presets followed by saved configs, for menus.
    pub fn all(&self) -> Vec<GameConfig> {
        let mut all = GameConfig::presets();
        all.extend(self.configs.values().cloned());
        all
    }
}

/// Save configs to a JSON file.
pub fn save_configs(saved: &SavedConfigs, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_CONFIGS_FILE);
    let mut saved = saved.clone();
    saved.updated_at = Some(Utc::now());
    let json = serde_json::to_string_pretty(&saved).context("Failed to serialise saved configs")?;

    std::fs::write(path, &json).with_context(|| format!("Failed to write configs to {path}"))?;

    debug!(path, configs = saved.configs.len(), "Configs saved");
    Ok(())
}

/// Load configs from a JSON file. A missing file is a fresh start.
pub fn load_configs(path: Option<&str>) -> Result<SavedConfigs> {
    let path = path.unwrap_or(DEFAULT_CONFIGS_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved configs found, starting fresh");
        return Ok(SavedConfigs::default());
    }

    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read configs from {path}"))?;
    let saved: SavedConfigs = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse configs from {path}"))?;

    info!(
        path,
        configs = saved.configs.len(),
        has_played = saved.has_played,
        "Saved configs loaded"
    );
    Ok(saved)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
