//! Producer ingest
//!
//! The upstream device connects over raw TCP and writes text. Each decoded
//! message is broadcast to the subscriber registry. When the device
//! disconnects the listener goes back to waiting for the next connection.

pub mod decoder;
pub mod listener;
pub mod session;

pub use decoder::{DecodeError, FramingMode, MessageDecoder, DEFAULT_MAX_LINE_LENGTH};
pub use listener::ProducerListener;
pub use session::{ProducerSession, SessionEnd};
