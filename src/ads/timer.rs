//! Per-FSM timer registry
//!
//! Timers are plain (key, due) entries owned by one state machine and fired by
//! its `advance(now)`. Nothing runs on its own, so sweeping the registry is
//! enough to guarantee a cancelled timer never fires.

use crate::Millis;

#[derive(Debug, Clone)]
struct Timer<K> {
    key: K,
    due: Millis,
    seq: u64,
}

/// Keyed one-shot timers; scheduling a key again replaces it
#[derive(Debug, Clone)]
pub struct TimerRegistry<K> {
    timers: Vec<Timer<K>>,
    next_seq: u64,
}

impl<K> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<K: Copy + Eq + std::fmt::Debug> TimerRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `due`, replacing any pending timer with the same key
    pub fn schedule(&mut self, key: K, due: Millis) {
        self.cancel(key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Timer { key, due, seq });
    }

    /// Cancel a pending timer; returns whether one existed
    pub fn cancel(&mut self, key: K) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.key != key);
        self.timers.len() != before
    }

    /// Cancel everything
    pub fn clear(&mut self) {
        if !self.timers.is_empty() {
            log::trace!("Sweeping {} timers", self.timers.len());
        }
        self.timers.clear();
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.timers.iter().any(|t| t.key == key)
    }

    pub fn due_at(&self, key: K) -> Option<Millis> {
        self.timers.iter().find(|t| t.key == key).map(|t| t.due)
    }

    /// Earliest pending due time
    pub fn next_due(&self) -> Option<Millis> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Timers due at the same instant fire in scheduling order.
    pub fn pop_due(&mut self, now: Millis) -> Option<(K, Millis)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        let timer = self.timers.swap_remove(index);
        Some((timer.key, timer.due))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
