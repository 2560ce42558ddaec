//! Subscriber registry for fan-out
//!
//! The registry tracks every WebSocket client believed to be writable and
//! delivers each producer message to all of them.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<SubscriberRegistry>
//!                   ┌──────────────────────────┐
//!                   │ members: HashMap<Id,     │
//!                   │   SubscriberHandle {     │
//!                   │     tx: mpsc::Sender,    │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │ snapshot()
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Producer]             [Subscriber]            [Subscriber]
//!   session.run()          queue.recv()            queue.recv()
//!        │                       │                       │
//!        └──► registry.broadcast()──► try_deliver() ──► WebSocket
//! ```
//!
//! Delivery is a non-blocking enqueue onto the subscriber's bounded queue,
//! so the lock is only held while copying the member list. A closed or
//! saturated queue removes the member without affecting anyone else.

pub mod error;
pub mod store;
pub mod subscriber;

pub use error::SendError;
pub use store::{BroadcastReport, Registration, SubscriberRegistry};
pub use subscriber::{Payload, SubscriberHandle, SubscriberId, SubscriberQueue};
