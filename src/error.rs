use thiserror::Error;

#[derive(Debug, Error)]
pub enum PumpError {
    /// The queue was closed, by explicit shutdown or capture failure.
    #[error("event queue disconnected")]
    Disconnected,
    #[error("display capture failed: {0}")]
    Capture(#[from] std::io::Error),
}
