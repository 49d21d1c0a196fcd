//! Enrichment throttle.
//!
//! Two gates guard every live enrichment: a global minimum spacing across
//! all symbols and a per-symbol minimum spacing. The global gate is checked
//! first. Timestamps are committed only when both pass, so a rejected tick
//! leaves the throttle exactly as it was.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Which gate rejected a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleGate {
    Global,
    Symbol,
}

#[derive(Debug, Clone)]
pub struct Throttle {
    global_cooldown: Duration,
    symbol_cooldown: Duration,
    last_global: Option<Instant>,
    last_by_symbol: HashMap<String, Instant>,
}

impl Throttle {
    pub fn new(global_cooldown: Duration, symbol_cooldown: Duration) -> Self {
        Self {
            global_cooldown,
            symbol_cooldown,
            last_global: None,
            last_by_symbol: HashMap::new(),
        }
    }

    /// Admit an enrichment for `symbol` at `now`, committing both timestamps
    /// on success.
    pub fn try_acquire(&mut self, symbol: &str, now: Instant) -> Result<(), ThrottleGate> {
        if let Some(last) = self.last_global {
            if now.saturating_duration_since(last) < self.global_cooldown {
                return Err(ThrottleGate::Global);
            }
        }
        if let Some(last) = self.last_by_symbol.get(symbol) {
            if now.saturating_duration_since(*last) < self.symbol_cooldown {
                return Err(ThrottleGate::Symbol);
            }
        }

        self.last_global = Some(now);
        self.last_by_symbol.insert(symbol.to_string(), now);
        Ok(())
    }
}
