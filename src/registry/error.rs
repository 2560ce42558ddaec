//! Delivery error types

/// Why a payload could not be handed to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The subscriber's connection task is gone
    Closed,
    /// The subscriber's outbound queue is saturated (stalled client)
    Full,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Closed => write!(f, "subscriber connection closed"),
            SendError::Full => write!(f, "subscriber queue full"),
        }
    }
}

impl std::error::Error for SendError {}

impl<T> From<tokio::sync::mpsc::error::TrySendError<T>> for SendError {
    fn from(err: tokio::sync::mpsc::error::TrySendError<T>) -> Self {
        use tokio::sync::mpsc::error::TrySendError;

        match err {
            TrySendError::Closed(_) => SendError::Closed,
            TrySendError::Full(_) => SendError::Full,
        }
    }
}
