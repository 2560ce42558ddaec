//! Subscriber accept loop
//!
//! Display clients connect over WebSocket and receive every producer
//! message as a text frame. The relay never expects data from them.

pub mod connection;
pub mod listener;

pub use connection::{Disconnect, SubscriberConnection};
pub use listener::SubscriberListener;
