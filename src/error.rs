//! Error types
//!
//! Only endpoint setup is fatal to the relay. Everything that can go wrong
//! on an individual producer or subscriber connection is handled inside
//! that connection and never reaches this type.

use std::net::SocketAddr;

use thiserror::Error;

/// Which endpoint a listener serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// Raw TCP endpoint for the upstream device
    Producer,
    /// WebSocket endpoint for display clients
    Subscriber,
}

impl std::fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointRole::Producer => write!(f, "producer"),
            EndpointRole::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// Relay error
#[derive(Error, Debug)]
pub enum Error {
    /// A listening socket could not be bound
    #[error("failed to bind {role} endpoint {addr}: {source}")]
    Bind {
        role: EndpointRole,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;
