//! Cancelable timers for the practice loop.
//!
//! Timers live in a generational arena: a key from a cancelled or fired timer
//! can never address a newer one, and `cancel_all` drops every pending entry
//! in one call. Nothing fires on its own; the owner drains due timers from its
//! `tick`.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to one scheduled timer.
    pub struct TimerKey;
}

#[derive(Debug, Clone)]
struct Timer<E> {
    due_ms: f64,
    seq: u64,
    event: E,
}

#[derive(Debug, Clone)]
pub struct TimerArena<E> {
    timers: SlotMap<TimerKey, Timer<E>>,
    next_seq: u64,
}

impl<E> Default for TimerArena<E> {
    fn default() -> Self {
        Self {
            timers: SlotMap::with_key(),
            next_seq: 0,
        }
    }
}

impl<E> TimerArena<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: f64, event: E) -> TimerKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(Timer { due_ms, seq, event })
    }

    /// Removes a pending timer. `None` if it already fired or was cancelled.
    pub fn cancel(&mut self, key: TimerKey) -> Option<E> {
        self.timers.remove(key).map(|t| t.event)
    }

    /// Drops every pending timer; returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.timers.contains_key(key)
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.timers
            .values()
            .map(|t| t.due_ms)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Removes and returns the earliest timer due at or before `now_ms`.
    /// Timers due at the same instant come out in scheduling order.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<(TimerKey, E)> {
        let key = self
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= now_ms)
            .min_by(|(_, a), (_, b)| a.due_ms.total_cmp(&b.due_ms).then(a.seq.cmp(&b.seq)))
            .map(|(key, _)| key)?;
        self.timers.remove(key).map(|t| (key, t.event))
    }
}
