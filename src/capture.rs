//! The capture thread: one dedicated thread per display connection, polling
//! the native source and feeding the owning queue.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PumpError;
use crate::event::NativeEvent;
use crate::queue::EventQueue;
use crate::window::WindowRegistry;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A native display connection, reduced to what the capture thread needs.
///
/// `poll` reports whether an event is ready within the timeout; `read`
/// returns the next event, or `None` when the connection yielded something
/// this backend does not model.
pub trait DisplaySource: Send {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self) -> io::Result<Option<NativeEvent>>;
}

impl<T: DisplaySource + ?Sized> DisplaySource for &mut T {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).poll(timeout)
    }

    fn read(&mut self) -> io::Result<Option<NativeEvent>> {
        (**self).read()
    }
}

pub struct EventCapture {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EventCapture {
    /// Start the capture thread. Configure events update the shared
    /// geometry cache synchronously and coalesce into the layout slot;
    /// expose events coalesce into the repaint slot; everything else is
    /// queued raw. A source error closes the queue so the consumer observes
    /// disconnection instead of a silent stall.
    pub fn spawn<S>(
        mut source: S,
        queue: EventQueue,
        registry: Arc<Mutex<WindowRegistry>>,
    ) -> Result<Self, PumpError>
    where
        S: DisplaySource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("event-capture".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) && !queue.is_closed() {
                    match source.poll(POLL_INTERVAL) {
                        Ok(false) => {}
                        Ok(true) => {
                            // Drain until the source is dry so a burst (drag,
                            // resize storm) lands in one pass and coalescing
                            // sees the whole run.
                            loop {
                                match source.read() {
                                    Ok(Some(event)) => route(&queue, &registry, event),
                                    Ok(None) => {}
                                    Err(err) => {
                                        tracing::warn!(error = %err, "display source read failed");
                                        queue.close();
                                        return;
                                    }
                                }
                                if !matches!(source.poll(Duration::ZERO), Ok(true)) {
                                    break;
                                }
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "display source poll failed");
                            queue.close();
                            return;
                        }
                    }
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop and join the capture thread.
    pub fn shutdown(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventCapture {
    fn drop(&mut self) {
        self.join_inner();
    }
}

fn route(queue: &EventQueue, registry: &Arc<Mutex<WindowRegistry>>, event: NativeEvent) {
    match event {
        NativeEvent::ConfigureChanged { window, geometry } => {
            // Geometry cache updates ahead of the coalesced delivery, so
            // the eventual GeometryChanged message carries the latest rect.
            if let Ok(mut registry) = registry.lock() {
                registry.set_geometry(window, geometry);
            }
            queue.request_layout_recompute(window);
        }
        event => queue.post_native_event(event),
    }
}
