//! The per-consumer event queue: a raw FIFO for input and lifecycle events,
//! coalescing slots for repaint and layout work, and the armed-timer list,
//! all behind a single mutex and condition variable.
//!
//! Topology is single-producer (the capture thread) and single-consumer (the
//! dispatcher thread that owns this queue). Collaborator threads may post
//! work and arm timers; only the owning consumer dequeues.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::event::{NativeEvent, WindowHandle};
use crate::geometry::Rect;
use crate::timer::{TimerCallback, TimerId, TimerList};

/// Outcome of a single `dequeue` call.
pub enum Dequeued {
    /// A raw native event, in FIFO order.
    Event(NativeEvent),
    /// A coalesced repaint obligation for one window.
    Paint {
        window: WindowHandle,
        region: Rect,
        client: bool,
    },
    /// A coalesced layout obligation for one window.
    LayoutChange { window: WindowHandle },
    /// Timers whose deadline passed. Callbacks were collected under the
    /// queue lock and must be invoked by the caller, outside it.
    TimersFired(Vec<(TimerId, TimerCallback)>),
    /// The timeout hint elapsed with nothing to deliver.
    TimedOut,
    /// The queue was closed, or its lock poisoned.
    Disconnected,
}

#[derive(Debug, Default, Clone, Copy)]
struct PaintPending {
    client: Option<Rect>,
    nonclient: Option<Rect>,
}

#[derive(Default)]
struct QueueState {
    raw: VecDeque<NativeEvent>,
    // Insertion order doubles as the fair drain order: the window whose
    // repaint was requested first drains first, and a re-request merges in
    // place without moving the entry forward.
    paint: Vec<(WindowHandle, PaintPending)>,
    layout: Vec<WindowHandle>,
    timers: TimerList,
    closed: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    cond: Condvar,
}

pub struct EventQueue {
    shared: Arc<Shared>,
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                cond: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, QueueState>> {
        self.shared.state.lock().ok()
    }

    /// Append a raw native event. A Motion whose trailing neighbor is a
    /// Motion for the same window replaces it instead of appending: only the
    /// latest pre-consumption pointer position matters. Expose events are
    /// rerouted into the coalesced repaint slot and never queued raw.
    pub fn post_native_event(&self, event: NativeEvent) {
        if let NativeEvent::Expose {
            window,
            region,
            client,
        } = &event
        {
            self.request_repaint(*window, *region, *client);
            return;
        }
        let Some(mut state) = self.lock() else {
            return;
        };
        if state.closed {
            return;
        }
        if let NativeEvent::Motion { window, .. } = &event
            && matches!(state.raw.back(), Some(NativeEvent::Motion { window: tail, .. }) if tail == window)
        {
            tracing::trace!(window = window.0, "coalesced trailing motion");
            if let Some(tail) = state.raw.back_mut() {
                *tail = event;
            }
        } else {
            state.raw.push_back(event);
        }
        drop(state);
        self.shared.cond.notify_one();
    }

    /// Union `region` into the window's pending client or non-client
    /// rectangle. At most one repaint obligation is outstanding per window.
    pub fn request_repaint(&self, window: WindowHandle, region: Rect, client: bool) {
        let Some(mut state) = self.lock() else {
            return;
        };
        if state.closed {
            return;
        }
        let idx = match state.paint.iter().position(|(w, _)| *w == window) {
            Some(idx) => idx,
            None => {
                state.paint.push((window, PaintPending::default()));
                state.paint.len() - 1
            }
        };
        let slot = &mut state.paint[idx].1;
        let cell = if client {
            &mut slot.client
        } else {
            &mut slot.nonclient
        };
        *cell = Some(cell.map_or(region, |pending| pending.union(region)));
        drop(state);
        self.shared.cond.notify_one();
    }

    /// Idempotent: at most one layout obligation is outstanding per window.
    pub fn request_layout_recompute(&self, window: WindowHandle) {
        let Some(mut state) = self.lock() else {
            return;
        };
        if state.closed {
            return;
        }
        if !state.layout.contains(&window) {
            state.layout.push(window);
        }
        drop(state);
        self.shared.cond.notify_one();
    }

    /// Drop pending coalesced work for a window whose destruction has been
    /// fully processed, so work cannot resurrect for a dead handle.
    pub fn remove_window(&self, window: WindowHandle) {
        let Some(mut state) = self.lock() else {
            return;
        };
        state.paint.retain(|(w, _)| *w != window);
        state.layout.retain(|w| *w != window);
    }

    pub fn arm_timer(&self, interval: Duration, repeating: bool, callback: TimerCallback) -> TimerId {
        let id = match self.lock() {
            Some(mut state) => state.timers.arm(interval, repeating, callback),
            None => TimerId(0),
        };
        // A blocked dequeue may need to shorten its wait.
        self.shared.cond.notify_all();
        id
    }

    pub fn disarm_timer(&self, id: TimerId) -> bool {
        let disarmed = match self.lock() {
            Some(mut state) => state.timers.disarm(id),
            None => false,
        };
        self.shared.cond.notify_all();
        disarmed
    }

    pub fn timer_armed(&self, id: TimerId) -> bool {
        self.lock().is_some_and(|state| state.timers.is_armed(id))
    }

    /// Clone of the oldest queued raw event, if any. Lookahead for repeat
    /// collapse; the consumer is the only remover, so the front is stable
    /// between a peek and a `take_raw_front`.
    pub fn peek_raw(&self) -> Option<NativeEvent> {
        self.lock()?.raw.front().cloned()
    }

    pub fn take_raw_front(&self) -> Option<NativeEvent> {
        self.lock()?.raw.pop_front()
    }

    /// Close the queue and wake all waiters. Subsequent dequeues report
    /// `Disconnected`; posts become no-ops.
    pub fn close(&self) {
        if let Some(mut state) = self.lock() {
            state.closed = true;
        }
        self.shared.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none_or(|state| state.closed)
    }

    /// Drain priority: raw events (oldest first), then one repaint slot,
    /// then one layout slot, then expired timers, then block for
    /// `min(timeout_hint, nearest timer deadline)`. Spurious-wake safe.
    pub fn dequeue(&self, timeout_hint: Option<Duration>) -> Dequeued {
        self.dequeue_inner(timeout_hint, &mut Vec::new())
    }

    /// `lagging` carries the ids of timers that fell behind and already
    /// caught up a tick during the caller's current drain pass; they are
    /// neither refired nor allowed to bound the wait, while on-schedule
    /// timers keep firing as their deadlines arrive.
    pub(crate) fn dequeue_inner(
        &self,
        timeout_hint: Option<Duration>,
        lagging: &mut Vec<TimerId>,
    ) -> Dequeued {
        let hint_deadline = timeout_hint.and_then(|hint| Instant::now().checked_add(hint));
        let mut state = match self.shared.state.lock() {
            Ok(state) => state,
            Err(_) => return Dequeued::Disconnected,
        };
        loop {
            if state.closed {
                return Dequeued::Disconnected;
            }
            if let Some(event) = state.raw.pop_front() {
                return Dequeued::Event(event);
            }
            if let Some(paint) = take_paint(&mut state) {
                return paint;
            }
            if !state.layout.is_empty() {
                let window = state.layout.remove(0);
                return Dequeued::LayoutChange { window };
            }
            let now = Instant::now();
            let fired = state.timers.take_expired(now, lagging);
            if !fired.is_empty() {
                return Dequeued::TimersFired(fired);
            }
            let timer_deadline = state.timers.next_deadline(lagging);
            let deadline = match (hint_deadline, timer_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
            state = match deadline {
                Some(deadline) => {
                    if deadline <= now {
                        // The hint elapsed; an expired timer deadline would
                        // have been reported above.
                        if hint_deadline.is_some_and(|hint| hint <= now) {
                            return Dequeued::TimedOut;
                        }
                        continue;
                    }
                    match self.shared.cond.wait_timeout(state, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(_) => return Dequeued::Disconnected,
                    }
                }
                None => match self.shared.cond.wait(state) {
                    Ok(guard) => guard,
                    Err(_) => return Dequeued::Disconnected,
                },
            };
        }
    }
}

/// Pop one repaint obligation from the oldest-requested window. When both
/// rectangles are pending the client rect drains first and the slot keeps
/// its queue position for the non-client remainder.
fn take_paint(state: &mut QueueState) -> Option<Dequeued> {
    let (window, slot) = state.paint.first_mut()?;
    let window = *window;
    let (region, client) = if let Some(region) = slot.client.take() {
        (region, true)
    } else if let Some(region) = slot.nonclient.take() {
        (region, false)
    } else {
        // Slots always carry at least one rect by construction.
        state.paint.remove(0);
        return None;
    };
    if slot.client.is_none() && slot.nonclient.is_none() {
        state.paint.remove(0);
    }
    Some(Dequeued::Paint {
        window,
        region,
        client,
    })
}
