//! Translation from raw native events to application messages.
//!
//! The translator owns the click, hover, and downed-key state machines for
//! one consumer thread. It consumes one event at a time and appends zero or
//! more messages; events for unknown or zombie windows drop silently.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::event::{
    CrossingMode, EventTime, FocusDetail, KeyCode, Message, Modifiers, MouseButton, NativeEvent,
    WindowHandle,
};
use crate::geometry::{Point, Size};
use crate::queue::EventQueue;
use crate::timer::TimerId;
use crate::window::WindowRegistry;

/// ClientSignal token posted by hover timers.
pub const HOVER_SIGNAL: u32 = 1;

const DEFAULT_DOUBLE_CLICK_MS: u64 = 500;
const DEFAULT_HOVER_DWELL: Duration = Duration::from_millis(500);
const DEFAULT_TOLERANCE: Size = Size::new(4, 4);

/// Native auto-repeat shows up as a KeyUp immediately followed by an
/// identical KeyDown. Whether to collapse the pair is backend-dependent, so
/// the policy is pluggable: the pump consults it with one raw event of
/// lookahead before translating any KeyUp.
pub trait RepeatPolicy: Send {
    /// Return true to drop both the KeyUp and the queued KeyDown.
    fn collapse(&self, up: &NativeEvent, next: Option<&NativeEvent>) -> bool {
        let _ = (up, next);
        false
    }
}

/// Default policy: deliver auto-repeat as genuine key transitions.
pub struct NoRepeatCollapse;

impl RepeatPolicy for NoRepeatCollapse {}

/// Collapse a KeyUp/KeyDown pair with matching window, key, and timestamp.
pub struct CollapseAutoRepeat;

impl RepeatPolicy for CollapseAutoRepeat {
    fn collapse(&self, up: &NativeEvent, next: Option<&NativeEvent>) -> bool {
        match (up, next) {
            (
                NativeEvent::KeyUp {
                    window, key, time, ..
                },
                Some(NativeEvent::KeyDown {
                    window: next_window,
                    key: next_key,
                    time: next_time,
                    ..
                }),
            ) => window == next_window && key == next_key && time == next_time,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ClickPending {
    button: MouseButton,
    window: WindowHandle,
    client: bool,
    time: EventTime,
    pos: Point,
}

#[derive(Debug, Clone, Copy)]
struct HoverPending {
    window: WindowHandle,
    origin: Point,
    timer: TimerId,
}

pub struct MessageTranslator {
    click: Option<ClickPending>,
    hover: Option<HoverPending>,
    keys_down: BTreeMap<WindowHandle, BTreeSet<KeyCode>>,
    /// Synthetic button mask folded into emitted pointer modifiers.
    buttons: Modifiers,
    double_click_interval: u64,
    click_tolerance: Size,
    hover_dwell: Duration,
    hover_tolerance: Size,
}

impl Default for MessageTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTranslator {
    pub fn new() -> Self {
        Self {
            click: None,
            hover: None,
            keys_down: BTreeMap::new(),
            buttons: Modifiers::empty(),
            double_click_interval: DEFAULT_DOUBLE_CLICK_MS,
            click_tolerance: DEFAULT_TOLERANCE,
            hover_dwell: DEFAULT_HOVER_DWELL,
            hover_tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn set_double_click_interval(&mut self, interval_ms: u64) {
        self.double_click_interval = interval_ms;
    }

    pub fn set_hover_dwell(&mut self, dwell: Duration) {
        self.hover_dwell = dwell;
    }

    pub fn set_hover_tolerance(&mut self, tolerance: Size) {
        self.hover_tolerance = tolerance;
    }

    /// Translate one event, appending resulting messages to `out`.
    pub fn translate(
        &mut self,
        event: NativeEvent,
        registry: &mut WindowRegistry,
        queue: &EventQueue,
        out: &mut Vec<Message>,
    ) {
        let window = event.window();
        let Some(state) = registry.get(window) else {
            tracing::trace!(window = window.0, "dropping event for unregistered window");
            return;
        };
        if state.zombie && !matches!(event, NativeEvent::Destroy { .. }) {
            tracing::trace!(window = window.0, "dropping event for zombie window");
            return;
        }

        match event {
            NativeEvent::KeyDown {
                window,
                key,
                modifiers,
                ..
            } => {
                self.keys_down.entry(window).or_default().insert(key);
                out.push(Message::KeyDown {
                    window,
                    key,
                    modifiers,
                });
            }
            NativeEvent::KeyUp {
                window,
                key,
                modifiers,
                ..
            } => {
                if let Some(keys) = self.keys_down.get_mut(&window) {
                    keys.remove(&key);
                }
                out.push(Message::KeyUp {
                    window,
                    key,
                    modifiers,
                });
            }
            NativeEvent::ButtonDown {
                window,
                button,
                pos,
                modifiers,
                time,
            } => {
                let Some((target, pos)) = registry.retarget_disabled(window, pos) else {
                    return;
                };
                let client = self.classify(registry, target, pos);
                self.buttons |= button.modifier_bit();
                let double = self.click.is_some_and(|pending| {
                    pending.button == button
                        && pending.window == target
                        && pending.client == client
                        && time.saturating_sub(pending.time) < self.double_click_interval
                        && pending.pos.within_box(pos, self.click_tolerance)
                });
                if double {
                    self.click = None;
                    out.push(Message::DoubleClick {
                        window: target,
                        button,
                        pos,
                        client,
                    });
                } else {
                    self.click = Some(ClickPending {
                        button,
                        window: target,
                        client,
                        time,
                        pos,
                    });
                    out.push(Message::ButtonDown {
                        window: target,
                        button,
                        pos,
                        client,
                    });
                }
                // Toolkits expect a move bracketing every click.
                out.push(Message::Move {
                    window: target,
                    pos,
                    modifiers: modifiers | self.buttons,
                    client,
                });
            }
            NativeEvent::ButtonUp {
                window,
                button,
                pos,
                modifiers,
                ..
            } => {
                let Some((target, pos)) = registry.retarget_disabled(window, pos) else {
                    return;
                };
                let client = self.classify(registry, target, pos);
                self.buttons.remove(button.modifier_bit());
                out.push(Message::ButtonUp {
                    window: target,
                    button,
                    pos,
                    client,
                });
                out.push(Message::Move {
                    window: target,
                    pos,
                    modifiers: modifiers | self.buttons,
                    client,
                });
            }
            NativeEvent::Motion {
                window,
                pos,
                modifiers,
                ..
            } => {
                // Tolerance is judged in the hovered window's own space,
                // before any retarget shifts the position.
                if self.hover.is_some_and(|hover| {
                    hover.window == window && !hover.origin.within_box(pos, self.hover_tolerance)
                }) {
                    // Pointer wandered off; only a fresh Enter re-arms.
                    self.disarm_hover(queue);
                }
                let Some((target, pos)) = registry.retarget_disabled(window, pos) else {
                    return;
                };
                let client = self.classify(registry, target, pos);
                out.push(Message::Move {
                    window: target,
                    pos,
                    modifiers,
                    client,
                });
            }
            NativeEvent::Enter {
                window, pos, mode, ..
            } => {
                if mode != CrossingMode::Normal {
                    tracing::trace!(window = window.0, "suppressed grab crossing");
                    return;
                }
                self.disarm_hover(queue);
                let hover_queue = queue.clone();
                let timer = queue.arm_timer(
                    self.hover_dwell,
                    false,
                    Arc::new(move || {
                        hover_queue.post_native_event(NativeEvent::ClientSignal {
                            window,
                            token: HOVER_SIGNAL,
                            data: 0,
                        });
                    }),
                );
                self.hover = Some(HoverPending {
                    window,
                    origin: pos,
                    timer,
                });
                out.push(Message::Enter { window, pos });
            }
            NativeEvent::Leave { window, mode, .. } => {
                if mode != CrossingMode::Normal {
                    tracing::trace!(window = window.0, "suppressed grab crossing");
                    return;
                }
                if self.hover.is_some_and(|hover| hover.window == window) {
                    self.disarm_hover(queue);
                }
                out.push(Message::Leave { window });
            }
            NativeEvent::ClientSignal { window, token, .. } if token == HOVER_SIGNAL => {
                if self.hover.is_some_and(|hover| hover.window == window) {
                    let hover = self.hover.take();
                    if let Some(hover) = hover {
                        out.push(Message::Hover {
                            window,
                            pos: hover.origin,
                        });
                    }
                }
                // A stale signal (hover moved on before the wake-up drained)
                // is dropped.
            }
            NativeEvent::FocusIn { window, detail } => {
                if detail == FocusDetail::Genuine {
                    out.push(Message::FocusGained { window });
                }
            }
            NativeEvent::FocusOut { window, detail } => {
                if detail != FocusDetail::Genuine {
                    return;
                }
                // Replay outstanding key-downs so the application never
                // observes a stuck key across a focus loss.
                if let Some(keys) = self.keys_down.remove(&window) {
                    for key in keys {
                        out.push(Message::KeyUp {
                            window,
                            key,
                            modifiers: Modifiers::empty(),
                        });
                    }
                }
                out.push(Message::FocusLost { window });
            }
            NativeEvent::Destroy { window } => {
                self.keys_down.remove(&window);
                if self.hover.is_some_and(|hover| hover.window == window) {
                    self.disarm_hover(queue);
                }
                if self.click.is_some_and(|pending| pending.window == window) {
                    self.click = None;
                }
                registry.unregister(window);
                queue.remove_window(window);
                out.push(Message::Destroyed { window });
            }
            NativeEvent::Map { window } => {
                if let Some(state) = registry.get_mut(window) {
                    state.mapped = true;
                }
            }
            NativeEvent::Unmap { window } => {
                if let Some(state) = registry.get_mut(window) {
                    state.mapped = false;
                }
            }
            NativeEvent::ConfigureChanged { window, geometry } => {
                // Normally rerouted by the capture layer; a direct post
                // still refreshes the cache. Delivery stays coalesced.
                registry.set_geometry(window, geometry);
            }
            NativeEvent::Expose { .. } | NativeEvent::ClientSignal { .. } => {
                tracing::trace!(window = window.0, "dropped unhandled event");
            }
        }
    }

    fn classify(&self, registry: &WindowRegistry, window: WindowHandle, pos: Point) -> bool {
        registry
            .get(window)
            .is_some_and(|state| state.client.contains(pos))
    }

    fn disarm_hover(&mut self, queue: &EventQueue) {
        if let Some(hover) = self.hover.take() {
            queue.disarm_timer(hover.timer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::window::WindowState;

    fn setup() -> (WindowRegistry, EventQueue, MessageTranslator) {
        let mut registry = WindowRegistry::new();
        registry.register(
            WindowHandle(1),
            WindowState::new(Rect::new(0, 0, 100, 100), Rect::new(0, 0, 100, 100)),
        );
        (registry, EventQueue::new(), MessageTranslator::new())
    }

    fn button_down(window: u64, x: i32, y: i32, time: EventTime) -> NativeEvent {
        NativeEvent::ButtonDown {
            window: WindowHandle(window),
            button: MouseButton::Left,
            pos: Point::new(x, y),
            modifiers: Modifiers::empty(),
            time,
        }
    }

    fn translate(
        translator: &mut MessageTranslator,
        registry: &mut WindowRegistry,
        queue: &EventQueue,
        event: NativeEvent,
    ) -> Vec<Message> {
        let mut out = Vec::new();
        translator.translate(event, registry, queue, &mut out);
        out
    }

    #[test]
    fn second_press_within_interval_is_double_click() {
        let (mut registry, queue, mut translator) = setup();
        let first = translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1000));
        assert!(matches!(first[0], Message::ButtonDown { .. }));
        assert!(matches!(first[1], Message::Move { .. }));

        let second = translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1200));
        assert!(matches!(second[0], Message::DoubleClick { .. }));
    }

    #[test]
    fn slow_second_press_is_plain_down() {
        let (mut registry, queue, mut translator) = setup();
        translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1000));
        let second = translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1700));
        assert!(matches!(second[0], Message::ButtonDown { .. }));
    }

    #[test]
    fn displaced_second_press_is_plain_down() {
        let (mut registry, queue, mut translator) = setup();
        translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1000));
        let second = translate(&mut translator, &mut registry, &queue, button_down(1, 40, 40, 1100));
        assert!(matches!(second[0], Message::ButtonDown { .. }));
    }

    #[test]
    fn third_press_after_double_click_starts_over() {
        let (mut registry, queue, mut translator) = setup();
        translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1000));
        translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1100));
        let third = translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 1200));
        assert!(matches!(third[0], Message::ButtonDown { .. }));
    }

    #[test]
    fn focus_out_replays_downed_keys() {
        let (mut registry, queue, mut translator) = setup();
        translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::KeyDown {
                window: WindowHandle(1),
                key: KeyCode(42),
                modifiers: Modifiers::empty(),
                time: 0,
            },
        );
        let out = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::FocusOut {
                window: WindowHandle(1),
                detail: FocusDetail::Genuine,
            },
        );
        assert!(
            matches!(out[0], Message::KeyUp { key, .. } if key == KeyCode(42)),
            "synthetic release must precede focus loss"
        );
        assert!(matches!(out[1], Message::FocusLost { .. }));
    }

    #[test]
    fn transient_focus_churn_is_suppressed() {
        let (mut registry, queue, mut translator) = setup();
        let out = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::FocusOut {
                window: WindowHandle(1),
                detail: FocusDetail::Transient,
            },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn grab_crossings_are_suppressed() {
        let (mut registry, queue, mut translator) = setup();
        let out = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Enter {
                window: WindowHandle(1),
                pos: Point::new(1, 1),
                mode: CrossingMode::Grab,
                time: 0,
            },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn destroy_is_terminal_and_idempotent() {
        let (mut registry, queue, mut translator) = setup();
        let first = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Destroy {
                window: WindowHandle(1),
            },
        );
        assert_eq!(
            first,
            vec![Message::Destroyed {
                window: WindowHandle(1)
            }]
        );
        let second = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Destroy {
                window: WindowHandle(1),
            },
        );
        assert!(second.is_empty());
        // Anything else for the dead handle drops too.
        let late = translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 0));
        assert!(late.is_empty());
    }

    #[test]
    fn zombie_window_drops_all_but_destroy() {
        let (mut registry, queue, mut translator) = setup();
        registry.mark_zombie(WindowHandle(1));
        let moved = translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 0));
        assert!(moved.is_empty());
        let destroyed = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Destroy {
                window: WindowHandle(1),
            },
        );
        assert_eq!(destroyed.len(), 1);
    }

    #[test]
    fn disabled_window_retargets_to_ancestor() {
        let (mut registry, queue, mut translator) = setup();
        registry.register(
            WindowHandle(2),
            WindowState::new(Rect::new(10, 10, 50, 50), Rect::new(0, 0, 50, 50))
                .with_parent(WindowHandle(1))
                .disabled(),
        );
        let out = translate(&mut translator, &mut registry, &queue, button_down(2, 3, 3, 0));
        assert!(
            matches!(out[0], Message::ButtonDown { window, pos, .. }
                if window == WindowHandle(1) && pos == Point::new(13, 13))
        );
    }

    #[test]
    fn nonclient_press_is_classified() {
        let (mut registry, queue, mut translator) = setup();
        registry.register(
            WindowHandle(3),
            // Client area inset by a 5px border.
            WindowState::new(Rect::new(0, 0, 100, 100), Rect::new(5, 5, 90, 90)),
        );
        let out = translate(&mut translator, &mut registry, &queue, button_down(3, 2, 2, 0));
        assert!(matches!(out[0], Message::ButtonDown { client: false, .. }));
    }

    #[test]
    fn motion_outside_tolerance_disarms_hover() {
        let (mut registry, queue, mut translator) = setup();
        let entered = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Enter {
                window: WindowHandle(1),
                pos: Point::new(5, 5),
                mode: CrossingMode::Normal,
                time: 0,
            },
        );
        assert!(matches!(entered[0], Message::Enter { .. }));
        let timer = translator.hover.expect("armed").timer;
        assert!(queue.timer_armed(timer));

        // Inside the 4x4 box: still armed.
        translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Motion {
                window: WindowHandle(1),
                pos: Point::new(6, 5),
                modifiers: Modifiers::empty(),
                time: 1,
            },
        );
        assert!(translator.hover.is_some());

        translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Motion {
                window: WindowHandle(1),
                pos: Point::new(30, 30),
                modifiers: Modifiers::empty(),
                time: 2,
            },
        );
        assert!(translator.hover.is_none());
        assert!(!queue.timer_armed(timer));
    }

    #[test]
    fn hover_tolerance_judged_in_hovered_window_space() {
        let (mut registry, queue, mut translator) = setup();
        registry.register(
            WindowHandle(2),
            WindowState::new(Rect::new(10, 10, 50, 50), Rect::new(0, 0, 50, 50))
                .with_parent(WindowHandle(1))
                .disabled(),
        );
        translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Enter {
                window: WindowHandle(2),
                pos: Point::new(5, 5),
                mode: CrossingMode::Normal,
                time: 0,
            },
        );
        assert!(translator.hover.is_some());

        // The move retargets to the enabled ancestor at (16, 16); hover must
        // compare the raw (6, 6) against the origin and stay armed.
        translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Motion {
                window: WindowHandle(2),
                pos: Point::new(6, 6),
                modifiers: Modifiers::empty(),
                time: 1,
            },
        );
        assert!(translator.hover.is_some());

        translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::Motion {
                window: WindowHandle(2),
                pos: Point::new(30, 30),
                modifiers: Modifiers::empty(),
                time: 2,
            },
        );
        assert!(translator.hover.is_none());
    }

    #[test]
    fn stale_hover_signal_drops() {
        let (mut registry, queue, mut translator) = setup();
        let out = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::ClientSignal {
                window: WindowHandle(1),
                token: HOVER_SIGNAL,
                data: 0,
            },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn button_up_clears_button_modifier() {
        let (mut registry, queue, mut translator) = setup();
        translate(&mut translator, &mut registry, &queue, button_down(1, 5, 5, 0));
        assert!(translator.buttons.contains(Modifiers::BUTTON_LEFT));
        let out = translate(
            &mut translator,
            &mut registry,
            &queue,
            NativeEvent::ButtonUp {
                window: WindowHandle(1),
                button: MouseButton::Left,
                pos: Point::new(5, 5),
                modifiers: Modifiers::empty(),
                time: 10,
            },
        );
        assert!(!translator.buttons.contains(Modifiers::BUTTON_LEFT));
        assert!(matches!(out[0], Message::ButtonUp { .. }));
        assert!(matches!(out[1], Message::Move { .. }));
    }

    #[test]
    fn collapse_policy_matches_echo_pair() {
        let policy = CollapseAutoRepeat;
        let up = NativeEvent::KeyUp {
            window: WindowHandle(1),
            key: KeyCode(9),
            modifiers: Modifiers::empty(),
            time: 77,
        };
        let echo = NativeEvent::KeyDown {
            window: WindowHandle(1),
            key: KeyCode(9),
            modifiers: Modifiers::empty(),
            time: 77,
        };
        let later = NativeEvent::KeyDown {
            window: WindowHandle(1),
            key: KeyCode(9),
            modifiers: Modifiers::empty(),
            time: 99,
        };
        assert!(policy.collapse(&up, Some(&echo)));
        assert!(!policy.collapse(&up, Some(&later)));
        assert!(!policy.collapse(&up, None));
        assert!(!NoRepeatCollapse.collapse(&up, Some(&echo)));
    }
}
