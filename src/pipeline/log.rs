//! The capped, id-addressed event list.
//!
//! Every mutation locates its target by id. Updates to an id that has
//! already been evicted are no-ops.

use std::collections::VecDeque;

use crate::types::GameEvent;

#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<GameEvent>,
    cap: usize,
}

impl EventLog {
    pub fn new(cap: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    /// Append, evicting the oldest entries beyond the cap. Returns the evicted events.
    pub fn push(&mut self, event: GameEvent) -> Vec<GameEvent> {
        self.events.push_back(event);
        let mut evicted = Vec::new();
        while self.events.len() > self.cap {
            if let Some(old) = self.events.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }

    /// Replace the event with the same id wholesale. False if it is gone.
    pub fn replace(&mut self, event: GameEvent) -> bool {
        match self.events.iter_mut().find(|e| e.id() == event.id()) {
            Some(slot) => {
                *slot = event;
                true
            }
            None => false,
        }
    }

    /// Mutate the event with `id` in place. False if it is gone.
    pub fn update<F: FnOnce(&mut GameEvent)>(&mut self, id: &str, f: F) -> bool {
        match self.events.iter_mut().find(|e| e.id() == id) {
            Some(slot) => {
                f(slot);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<GameEvent> {
        let idx = self.events.iter().position(|e| e.id() == id)?;
        self.events.remove(idx)
    }

    pub fn get(&self, id: &str) -> Option<&GameEvent> {
        self.events.iter().find(|e| e.id() == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<GameEvent> {
        self.events.iter().cloned().collect()
    }
}
