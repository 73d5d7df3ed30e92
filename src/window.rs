//! Window state consumed by the translation core.
//!
//! The surrounding backend owns window lifetime and pushes the subset of
//! state this core needs into a [`WindowRegistry`] shared with the pump.

use std::collections::BTreeMap;

use crate::event::WindowHandle;
use crate::geometry::{Point, Rect};

/// The slice of per-window state the pump consults while translating.
#[derive(Debug, Clone)]
pub struct WindowState {
    pub parent: Option<WindowHandle>,
    /// Outer rectangle in parent coordinates.
    pub frame: Rect,
    /// Client area in frame-local coordinates.
    pub client: Rect,
    pub mapped: bool,
    pub enabled: bool,
    /// Destruction has been requested but not yet fully acknowledged.
    pub zombie: bool,
}

impl WindowState {
    pub fn new(frame: Rect, client: Rect) -> Self {
        Self {
            parent: None,
            frame,
            client,
            mapped: true,
            enabled: true,
            zombie: false,
        }
    }

    pub fn with_parent(mut self, parent: WindowHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: BTreeMap<WindowHandle, WindowState>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: WindowHandle, state: WindowState) {
        tracing::debug!(window = handle.0, "registered window");
        self.windows.insert(handle, state);
    }

    pub fn unregister(&mut self, handle: WindowHandle) -> bool {
        let removed = self.windows.remove(&handle).is_some();
        if removed {
            tracing::debug!(window = handle.0, "unregistered window");
        }
        removed
    }

    pub fn get(&self, handle: WindowHandle) -> Option<&WindowState> {
        self.windows.get(&handle)
    }

    pub fn get_mut(&mut self, handle: WindowHandle) -> Option<&mut WindowState> {
        self.windows.get_mut(&handle)
    }

    /// Flag the window as awaiting destruction. Events for a zombie are
    /// dropped until its terminal Destroy arrives.
    pub fn mark_zombie(&mut self, handle: WindowHandle) {
        if let Some(state) = self.windows.get_mut(&handle) {
            state.zombie = true;
        }
    }

    /// Geometry cache update; called synchronously when a configure event is
    /// captured, ahead of the coalesced delivery.
    pub fn set_geometry(&mut self, handle: WindowHandle, frame: Rect) {
        if let Some(state) = self.windows.get_mut(&handle) {
            state.frame = frame;
        }
    }

    /// Resolve the delivery target for a pointer event aimed at `window`.
    ///
    /// An enabled window receives its own input. A disabled window forwards
    /// to its first enabled ancestor, with `pos` translated into that
    /// ancestor's frame space along the way. Returns `None` when no enabled
    /// ancestor exists (the event is dropped).
    pub fn retarget_disabled(
        &self,
        window: WindowHandle,
        pos: Point,
    ) -> Option<(WindowHandle, Point)> {
        let mut current = window;
        let mut pos = pos;
        loop {
            let state = self.windows.get(&current)?;
            if state.enabled {
                return Some((current, pos));
            }
            let parent = state.parent?;
            pos = pos.offset(state.frame.x, state.frame.y);
            current = parent;
        }
    }
}
