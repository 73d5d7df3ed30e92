//! Native events arriving from the display connection and the translated,
//! application-facing messages the pump emits.

use bitflags::bitflags;

use crate::geometry::{Point, Rect};

/// Opaque identifier for a native window. The surrounding backend owns the
/// window's lifetime; this core only correlates events and state by handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowHandle(pub u64);

/// Native key symbol. Opaque to this core; translation to characters happens
/// in the widget layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyCode(pub u32);

bitflags! {
    /// Keyboard and pointer-button state carried on input events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u16 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const BUTTON_LEFT = 1 << 3;
        const BUTTON_MIDDLE = 1 << 4;
        const BUTTON_RIGHT = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    pub fn modifier_bit(self) -> Modifiers {
        match self {
            MouseButton::Left => Modifiers::BUTTON_LEFT,
            MouseButton::Middle => Modifiers::BUTTON_MIDDLE,
            MouseButton::Right => Modifiers::BUTTON_RIGHT,
        }
    }
}

/// How a crossing (enter/leave) event was produced. Grab and ungrab
/// crossings are side effects of pointer grabs, not genuine pointer travel,
/// and are suppressed during translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingMode {
    Normal,
    Grab,
    Ungrab,
}

/// Whether a focus event reflects a real focus change or transient grab
/// churn the application should never observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDetail {
    Genuine,
    Transient,
}

/// Milliseconds timestamp from the native event stream.
pub type EventTime = u64;

/// A raw notification from the underlying display system. Produced only by
/// the capture layer; immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    KeyDown {
        window: WindowHandle,
        key: KeyCode,
        modifiers: Modifiers,
        time: EventTime,
    },
    KeyUp {
        window: WindowHandle,
        key: KeyCode,
        modifiers: Modifiers,
        time: EventTime,
    },
    ButtonDown {
        window: WindowHandle,
        button: MouseButton,
        pos: Point,
        modifiers: Modifiers,
        time: EventTime,
    },
    ButtonUp {
        window: WindowHandle,
        button: MouseButton,
        pos: Point,
        modifiers: Modifiers,
        time: EventTime,
    },
    Motion {
        window: WindowHandle,
        pos: Point,
        modifiers: Modifiers,
        time: EventTime,
    },
    Enter {
        window: WindowHandle,
        pos: Point,
        mode: CrossingMode,
        time: EventTime,
    },
    Leave {
        window: WindowHandle,
        pos: Point,
        mode: CrossingMode,
        time: EventTime,
    },
    /// Damage report. Never queued raw: the queue reroutes it into the
    /// coalesced repaint slot for the window.
    Expose {
        window: WindowHandle,
        region: Rect,
        client: bool,
    },
    ConfigureChanged {
        window: WindowHandle,
        geometry: Rect,
    },
    Map {
        window: WindowHandle,
    },
    Unmap {
        window: WindowHandle,
    },
    FocusIn {
        window: WindowHandle,
        detail: FocusDetail,
    },
    FocusOut {
        window: WindowHandle,
        detail: FocusDetail,
    },
    Destroy {
        window: WindowHandle,
    },
    /// Backend-internal signalling (hover timers post these to wake the
    /// consumer through the regular queue path).
    ClientSignal {
        window: WindowHandle,
        token: u32,
        data: u64,
    },
}

impl NativeEvent {
    /// Target window of the event.
    pub fn window(&self) -> WindowHandle {
        match *self {
            NativeEvent::KeyDown { window, .. }
            | NativeEvent::KeyUp { window, .. }
            | NativeEvent::ButtonDown { window, .. }
            | NativeEvent::ButtonUp { window, .. }
            | NativeEvent::Motion { window, .. }
            | NativeEvent::Enter { window, .. }
            | NativeEvent::Leave { window, .. }
            | NativeEvent::Expose { window, .. }
            | NativeEvent::ConfigureChanged { window, .. }
            | NativeEvent::Map { window }
            | NativeEvent::Unmap { window }
            | NativeEvent::FocusIn { window, .. }
            | NativeEvent::FocusOut { window, .. }
            | NativeEvent::Destroy { window }
            | NativeEvent::ClientSignal { window, .. } => window,
        }
    }
}

/// The translated, application-facing message stream. Pointer messages carry
/// a `client` flag distinguishing client-area from non-client (chrome) hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeyDown {
        window: WindowHandle,
        key: KeyCode,
        modifiers: Modifiers,
    },
    KeyUp {
        window: WindowHandle,
        key: KeyCode,
        modifiers: Modifiers,
    },
    ButtonDown {
        window: WindowHandle,
        button: MouseButton,
        pos: Point,
        client: bool,
    },
    ButtonUp {
        window: WindowHandle,
        button: MouseButton,
        pos: Point,
        client: bool,
    },
    DoubleClick {
        window: WindowHandle,
        button: MouseButton,
        pos: Point,
        client: bool,
    },
    Move {
        window: WindowHandle,
        pos: Point,
        modifiers: Modifiers,
        client: bool,
    },
    Enter {
        window: WindowHandle,
        pos: Point,
    },
    Leave {
        window: WindowHandle,
    },
    /// Synthetic message fired after the pointer dwelled over a window
    /// without leaving the tolerance box.
    Hover {
        window: WindowHandle,
        pos: Point,
    },
    Paint {
        window: WindowHandle,
        region: Rect,
        client: bool,
    },
    GeometryChanged {
        window: WindowHandle,
        rect: Rect,
    },
    FocusGained {
        window: WindowHandle,
    },
    FocusLost {
        window: WindowHandle,
    },
    Destroyed {
        window: WindowHandle,
    },
    /// Returned by the timed pump call when the wait elapsed with nothing
    /// to deliver.
    Idle,
}
