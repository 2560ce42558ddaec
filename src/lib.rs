//! TCP to WebSocket fan-out relay
//!
//! One upstream device writes text over a raw TCP connection; every
//! connected WebSocket client receives each message as a text frame.
//!
//! ```text
//!   device ──TCP──► [ProducerListener] ──► SubscriberRegistry ──► [SubscriberConnection] ──WS──► display
//!                                                          └────► [SubscriberConnection] ──WS──► display
//! ```
//!
//! # Example
//! ```no_run
//! use sensor_relay::{Relay, RelayConfig};
//!
//! # async fn example() -> sensor_relay::Result<()> {
//! let relay = Relay::bind(RelayConfig::default()).await?;
//! relay.run().await
//! # }
//! ```

pub mod error;
pub mod producer;
pub mod registry;
pub mod server;
pub mod stats;
pub mod subscriber;

pub use error::{Error, Result};
pub use producer::FramingMode;
pub use registry::{Payload, SubscriberRegistry};
pub use server::{Relay, RelayConfig};
