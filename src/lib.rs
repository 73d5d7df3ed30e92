//! Event ingestion and message translation core for a windowing backend.
//!
//! A capture thread polls the native display connection and feeds a
//! per-consumer [`queue::EventQueue`]: input and lifecycle events go into a
//! FIFO, while repaint and layout work coalesces into at most one pending
//! obligation per window. The consumer thread drives a [`MessagePump`] whose
//! blocking `get_message` drains the queue, runs due timers, and feeds raw
//! events through the [`translate::MessageTranslator`] state machines
//! (double-click, hover, stuck-key replay) to produce the ordered,
//! application-facing [`Message`] stream.
//!
//! Raw events always drain ahead of coalesced obligations, so input is never
//! starved by a resize or repaint storm.

pub mod capture;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod geometry;
pub mod queue;
pub mod timer;
pub mod trace;
pub mod translate;
pub mod window;

pub use capture::{DisplaySource, EventCapture};
pub use dispatch::MessagePump;
pub use error::PumpError;
pub use event::{
    CrossingMode, EventTime, FocusDetail, KeyCode, Message, Modifiers, MouseButton, NativeEvent,
    WindowHandle,
};
pub use geometry::{Point, Rect, Size};
pub use queue::{Dequeued, EventQueue};
pub use timer::{TimerCallback, TimerId};
pub use translate::{CollapseAutoRepeat, MessageTranslator, NoRepeatCollapse, RepeatPolicy};
pub use window::{WindowRegistry, WindowState};
