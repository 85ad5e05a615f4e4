//! Virtual timers for `setTimeout`, `setInterval` and `requestAnimationFrame`.
//!
//! DESIGN
//! ======
//! Each compiled unit owns one [`TimerQueue`] with its own clock in
//! milliseconds, starting at zero. Registering a timer never runs anything.
//! The host moves the clock forward with
//! [`RenderSession::advance`](super::render::RenderSession::advance), which
//! pops due timers in due order (ties by registration order) and runs each
//! callback as its own entry.
//!
//! ```text
//! setInterval(cb, 1000) at t=0
//! advance(2500) ─► cb @1000 ─► cb @2000 ─► clock = 2500, next due @3000
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::value::Value;

/// Delay used by `requestAnimationFrame`.
pub const FRAME_MS: f64 = 16.0;

/// Shortest period an interval re-arms with, so a zero delay cannot spin.
const MIN_INTERVAL_MS: f64 = 1.0;

#[derive(Clone)]
struct Timer {
    due: f64,
    interval: Option<f64>,
    callback: Value,
    args: Vec<Value>,
}

#[derive(Default)]
struct Queue {
    now: f64,
    next_id: u64,
    timers: BTreeMap<u64, Timer>,
}

/// A timer whose due time has been reached.
pub struct DueTimer {
    pub id: u64,
    pub callback: Value,
    pub args: Vec<Value>,
}

#[derive(Clone, Default)]
pub struct TimerQueue(Arc<Mutex<Queue>>);

impl TimerQueue {
    /// Register `callback` to run `delay` ms from now, repeatedly when
    /// `repeat` is set. Returns the id `clearTimeout` takes.
    pub fn schedule(&self, callback: Value, delay: f64, repeat: bool, args: Vec<Value>) -> u64 {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        let mut queue = self.0.lock();
        queue.next_id += 1;
        let id = queue.next_id;
        let due = queue.now + delay;
        let interval = repeat.then_some(delay.max(MIN_INTERVAL_MS));
        queue.timers.insert(id, Timer { due, interval, callback, args });
        id
    }

    pub fn clear(&self, id: u64) {
        self.0.lock().timers.remove(&id);
    }

    /// Drop every timer. Their callbacks can hold the unit's closures alive.
    pub fn clear_all(&self) {
        self.0.lock().timers.clear();
    }

    /// Current virtual time in ms.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.0.lock().now
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.0.lock().timers.len()
    }

    /// Remove the earliest timer due at or before `until` and move the clock
    /// to its due time. Intervals are re-armed before the callback runs so
    /// the callback can clear them.
    #[must_use]
    pub fn pop_due(&self, until: f64) -> Option<DueTimer> {
        let mut queue = self.0.lock();
        let id = queue
            .timers
            .iter()
            .filter(|(_, timer)| timer.due <= until)
            .min_by(|a, b| a.1.due.total_cmp(&b.1.due).then(a.0.cmp(b.0)))
            .map(|(id, _)| *id)?;
        let timer = queue.timers.remove(&id)?;
        queue.now = queue.now.max(timer.due);
        let due = DueTimer { id, callback: timer.callback.clone(), args: timer.args.clone() };
        if let Some(interval) = timer.interval {
            queue.timers.insert(id, Timer { due: timer.due + interval, ..timer });
        }
        Some(due)
    }

    /// Move the clock to `until` without running anything.
    pub fn settle_clock(&self, until: f64) {
        let mut queue = self.0.lock();
        queue.now = queue.now.max(until);
    }
}

#[cfg(test)]
#[path = "timers_test.rs"]
mod tests;
