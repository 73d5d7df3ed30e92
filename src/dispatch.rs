//! The consumer-facing message pump.
//!
//! One `MessagePump` per consumer thread. It owns that thread's queue and
//! translator, shares the window registry with the backend's lifecycle
//! layer, and exposes the blocking `get_message` / non-blocking
//! `peek_message` / `run_until_idle` surface the application loop drives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::PumpError;
use crate::event::{Message, NativeEvent, WindowHandle};
use crate::geometry::Rect;
use crate::queue::{Dequeued, EventQueue};
use crate::timer::{TimerCallback, TimerId};
use crate::translate::{MessageTranslator, NoRepeatCollapse, RepeatPolicy};
use crate::window::{WindowRegistry, WindowState};

pub struct MessagePump {
    queue: EventQueue,
    registry: Arc<Mutex<WindowRegistry>>,
    translator: MessageTranslator,
    /// Translations not yet handed to the caller, in emission order.
    pending: VecDeque<Message>,
    repeat_policy: Box<dyn RepeatPolicy>,
}

impl Default for MessagePump {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePump {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(Mutex::new(WindowRegistry::new())))
    }

    /// Build around a registry owned by the surrounding backend.
    pub fn with_registry(registry: Arc<Mutex<WindowRegistry>>) -> Self {
        Self {
            queue: EventQueue::new(),
            registry,
            translator: MessageTranslator::new(),
            pending: VecDeque::new(),
            repeat_policy: Box::new(NoRepeatCollapse),
        }
    }

    /// Cheap cloneable handle for the capture thread and collaborators.
    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    pub fn registry(&self) -> Arc<Mutex<WindowRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn set_repeat_policy(&mut self, policy: Box<dyn RepeatPolicy>) {
        self.repeat_policy = policy;
    }

    pub fn set_double_click_interval(&mut self, interval_ms: u64) {
        self.translator.set_double_click_interval(interval_ms);
    }

    pub fn set_hover_dwell(&mut self, dwell: Duration) {
        self.translator.set_hover_dwell(dwell);
    }

    // Inbound surface, safe while the consumer blocks in `get_message`.

    pub fn post_native_event(&self, event: NativeEvent) {
        self.queue.post_native_event(event);
    }

    pub fn post_repaint_request(&self, window: WindowHandle, region: Rect, client: bool) {
        self.queue.request_repaint(window, region, client);
    }

    pub fn post_layout_changed(&self, window: WindowHandle) {
        self.queue.request_layout_recompute(window);
    }

    pub fn register_window(&self, window: WindowHandle, state: WindowState) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.register(window, state);
        }
    }

    /// Remove a window the lifecycle layer is done with, purging any
    /// coalesced work still pending for it.
    pub fn unregister_window(&self, window: WindowHandle) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.unregister(window);
        }
        self.queue.remove_window(window);
    }

    pub fn arm_timer(
        &self,
        interval: Duration,
        repeating: bool,
        callback: TimerCallback,
    ) -> TimerId {
        self.queue.arm_timer(interval, repeating, callback)
    }

    pub fn disarm_timer(&self, id: TimerId) -> bool {
        self.queue.disarm_timer(id)
    }

    pub fn close(&self) {
        self.queue.close();
    }

    /// Block until the next message. Timer callbacks fire along the way,
    /// a lagging timer at most once per call; dropped events keep pumping.
    pub fn get_message(&mut self) -> Result<Message, PumpError> {
        match self.pump(None)? {
            Some(message) => Ok(message),
            // No hint: the inner loop only exits with a message or an error.
            None => Err(PumpError::Disconnected),
        }
    }

    /// Like `get_message`, but gives up after `hint` and returns
    /// `Message::Idle` when nothing was deliverable.
    pub fn get_message_timeout(&mut self, hint: Duration) -> Result<Message, PumpError> {
        Ok(self.pump(Some(hint))?.unwrap_or(Message::Idle))
    }

    /// Non-blocking variant: `None` when the queue is idle.
    pub fn peek_message(&mut self) -> Result<Option<Message>, PumpError> {
        self.pump(Some(Duration::ZERO))
    }

    /// Drain `peek_message` until idle, dispatching each message
    /// synchronously. Returns the number dispatched. Used for cooperative
    /// re-entrant pumping (modal loops).
    pub fn run_until_idle<F>(&mut self, mut handler: F) -> Result<usize, PumpError>
    where
        F: FnMut(Message),
    {
        let mut dispatched = 0;
        while let Some(message) = self.peek_message()? {
            handler(message);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn pump(&mut self, hint: Option<Duration>) -> Result<Option<Message>, PumpError> {
        let deadline = hint.and_then(|hint| Instant::now().checked_add(hint));
        // A timer that fell behind catches up one tick per call instead of
        // bursting; on-schedule timers keep ticking while the call blocks.
        let mut lagging = Vec::new();
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }
            let remaining = match deadline {
                Some(deadline) => Some(deadline.saturating_duration_since(Instant::now())),
                None => None,
            };
            match self.queue.dequeue_inner(remaining, &mut lagging) {
                Dequeued::Event(event) => self.translate_event(event)?,
                Dequeued::Paint {
                    window,
                    region,
                    client,
                } => {
                    return Ok(Some(Message::Paint {
                        window,
                        region,
                        client,
                    }));
                }
                Dequeued::LayoutChange { window } => {
                    // Exactly one GeometryChanged carrying the latest cached
                    // geometry, however many configures were coalesced.
                    if let Some(rect) = self.window_frame(window)? {
                        return Ok(Some(Message::GeometryChanged { window, rect }));
                    }
                    // Window vanished between coalesce and drain.
                }
                Dequeued::TimersFired(fired) => {
                    for (id, callback) in fired {
                        tracing::trace!(timer = ?id, "timer fired");
                        callback();
                    }
                }
                Dequeued::TimedOut => return Ok(None),
                Dequeued::Disconnected => return Err(PumpError::Disconnected),
            }
        }
    }

    fn translate_event(&mut self, event: NativeEvent) -> Result<(), PumpError> {
        if matches!(event, NativeEvent::KeyUp { .. }) {
            let next = self.queue.peek_raw();
            if self.repeat_policy.collapse(&event, next.as_ref()) {
                // Native auto-repeat echo: swallow the pair. The key stays
                // logically held, so the downed-key set is left untouched.
                let _ = self.queue.take_raw_front();
                return Ok(());
            }
        }
        let mut registry = self
            .registry
            .lock()
            .map_err(|_| PumpError::Disconnected)?;
        let mut out = Vec::new();
        self.translator
            .translate(event, &mut registry, &self.queue, &mut out);
        self.pending.extend(out);
        Ok(())
    }

    fn window_frame(&self, window: WindowHandle) -> Result<Option<Rect>, PumpError> {
        let registry = self
            .registry
            .lock()
            .map_err(|_| PumpError::Disconnected)?;
        Ok(registry.get(window).map(|state| state.frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{KeyCode, Modifiers};
    use crate::geometry::Point;
    use crate::translate::CollapseAutoRepeat;

    fn pump_with_window() -> MessagePump {
        let pump = MessagePump::new();
        pump.register_window(
            WindowHandle(1),
            WindowState::new(Rect::new(0, 0, 100, 100), Rect::new(0, 0, 100, 100)),
        );
        pump
    }

    fn key(down: bool, code: u32, time: u64) -> NativeEvent {
        let window = WindowHandle(1);
        let key = KeyCode(code);
        let modifiers = Modifiers::empty();
        if down {
            NativeEvent::KeyDown {
                window,
                key,
                modifiers,
                time,
            }
        } else {
            NativeEvent::KeyUp {
                window,
                key,
                modifiers,
                time,
            }
        }
    }

    #[test]
    fn peek_returns_none_when_idle() {
        let mut pump = pump_with_window();
        assert!(pump.peek_message().expect("pump alive").is_none());
    }

    #[test]
    fn dropped_events_keep_pumping_to_next_message() {
        let mut pump = pump_with_window();
        // Unregistered window: dropped. Map: no message. Then a real key.
        pump.post_native_event(NativeEvent::Map {
            window: WindowHandle(99),
        });
        pump.post_native_event(NativeEvent::Map {
            window: WindowHandle(1),
        });
        pump.post_native_event(key(true, 7, 0));
        let message = pump.get_message().expect("pump alive");
        assert!(matches!(message, Message::KeyDown { key, .. } if key == KeyCode(7)));
    }

    #[test]
    fn surplus_translations_buffer_in_order() {
        let mut pump = pump_with_window();
        pump.post_native_event(NativeEvent::ButtonDown {
            window: WindowHandle(1),
            button: crate::event::MouseButton::Left,
            pos: Point::new(5, 5),
            modifiers: Modifiers::empty(),
            time: 0,
        });
        let first = pump.get_message().expect("pump alive");
        let second = pump.get_message_timeout(Duration::ZERO).expect("pump alive");
        assert!(matches!(first, Message::ButtonDown { .. }));
        assert!(matches!(second, Message::Move { .. }));
    }

    #[test]
    fn auto_repeat_pair_collapses_with_policy() {
        let mut pump = pump_with_window();
        pump.set_repeat_policy(Box::new(CollapseAutoRepeat));
        pump.post_native_event(key(true, 5, 100));
        pump.post_native_event(key(false, 5, 150));
        pump.post_native_event(key(true, 5, 150));
        pump.post_native_event(key(false, 5, 200));

        let mut seen = Vec::new();
        while let Some(message) = pump.peek_message().expect("pump alive") {
            seen.push(message);
        }
        // Initial press, echo pair swallowed, genuine release.
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], Message::KeyDown { .. }));
        assert!(matches!(seen[1], Message::KeyUp { .. }));
    }

    #[test]
    fn get_message_timeout_reports_idle() {
        let mut pump = pump_with_window();
        let message = pump
            .get_message_timeout(Duration::from_millis(10))
            .expect("pump alive");
        assert_eq!(message, Message::Idle);
    }

    #[test]
    fn closed_pump_errors() {
        let mut pump = pump_with_window();
        pump.close();
        assert!(matches!(pump.get_message(), Err(PumpError::Disconnected)));
    }

    #[test]
    fn run_until_idle_counts_dispatches() {
        let mut pump = pump_with_window();
        pump.post_native_event(key(true, 1, 0));
        pump.post_native_event(key(false, 1, 10));
        let mut seen = Vec::new();
        let count = pump
            .run_until_idle(|message| seen.push(message))
            .expect("pump alive");
        assert_eq!(count, 2);
        assert_eq!(seen.len(), 2);
    }
}
