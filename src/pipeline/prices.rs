//! Per-symbol last-price tracking for the live feed.

use std::collections::{HashMap, HashSet};

/// What a new trade means for a symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceUpdate {
    /// First trade ever seen; the caller should seed the symbol.
    FirstSeen,
    /// A seed lookup is still in flight; the trade is dropped.
    Seeding,
    /// Percent change against the last known price.
    Change(f64),
}

#[derive(Debug, Default, Clone)]
pub struct PriceTracker {
    last: HashMap<String, f64>,
    seeding: HashSet<String>,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade. The last price is updated on every `Change`.
    pub fn observe(&mut self, symbol: &str, price: f64) -> PriceUpdate {
        if self.seeding.contains(symbol) {
            return PriceUpdate::Seeding;
        }
        match self.last.get_mut(symbol) {
            None => {
                self.seeding.insert(symbol.to_string());
                PriceUpdate::FirstSeen
            }
            Some(last) => {
                let pct = if *last != 0.0 {
                    (price - *last) / *last * 100.0
                } else {
                    0.0
                };
                *last = price;
                PriceUpdate::Change(pct)
            }
        }
    }

    /// Finish seeding `symbol` with a reference price.
    pub fn seed(&mut self, symbol: &str, price: f64) {
        self.seeding.remove(symbol);
        self.last.insert(symbol.to_string(), price);
    }

    pub fn last(&self, symbol: &str) -> Option<f64> {
        self.last.get(symbol).copied()
    }
}
