//! Armed timers driving hover detection, caret blink, and application
//! timers. The list lives under the queue lock; callbacks are handed out
//! under that lock and invoked outside it.

use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub(crate) u64);

pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct Timer {
    id: TimerId,
    interval: Duration,
    next_deadline: Instant,
    repeating: bool,
    enabled: bool,
    callback: TimerCallback,
}

#[derive(Default)]
pub(crate) struct TimerList {
    timers: Vec<Timer>,
    next_id: u64,
}

impl TimerList {
    pub fn arm(&mut self, interval: Duration, repeating: bool, callback: TimerCallback) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.push(Timer {
            id,
            interval,
            next_deadline: Instant::now() + interval,
            repeating,
            enabled: true,
            callback,
        });
        tracing::trace!(timer = id.0, ?interval, repeating, "armed timer");
        id
    }

    pub fn disarm(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        before != self.timers.len()
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id && timer.enabled)
    }

    /// Nearest deadline among armed timers outside `lagging`, or `None`
    /// when the wait is unbounded.
    pub fn next_deadline(&self, lagging: &[TimerId]) -> Option<Instant> {
        self.timers
            .iter()
            .filter(|timer| timer.enabled && !lagging.contains(&timer.id))
            .map(|timer| timer.next_deadline)
            .min()
    }

    /// Collect timers due at `now`, skipping ids already in `lagging`, and
    /// move each fired deadline forward by exactly one interval. A timer
    /// whose advanced deadline is still in the past is added to `lagging`:
    /// within one drain pass it catches up a single tick instead of firing a
    /// burst, while a timer whose next tick genuinely lies ahead keeps
    /// firing on schedule. One-shot timers disable on fire.
    pub fn take_expired(
        &mut self,
        now: Instant,
        lagging: &mut Vec<TimerId>,
    ) -> Vec<(TimerId, TimerCallback)> {
        let mut fired = Vec::new();
        for timer in &mut self.timers {
            if timer.enabled && timer.next_deadline <= now && !lagging.contains(&timer.id) {
                timer.next_deadline += timer.interval;
                if timer.next_deadline <= now {
                    lagging.push(timer.id);
                }
                if !timer.repeating {
                    timer.enabled = false;
                }
                fired.push((timer.id, Arc::clone(&timer.callback)));
            }
        }
        self.timers.retain(|timer| timer.enabled);
        fired
    }
}
