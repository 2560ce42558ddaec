//! Relay server
//!
//! Configuration and the orchestrator that owns the registry and both
//! endpoint loops.

pub mod config;
pub mod relay;

pub use config::RelayConfig;
pub use relay::Relay;
