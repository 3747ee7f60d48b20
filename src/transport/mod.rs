//! Transport abstractions
//!
//! The connection supervisor talks to the backend exclusively through these
//! traits, so tests substitute fake transports that emit synthetic events.
//! Production implementations live in [`http`] and [`ws`].

pub mod http;
pub mod ws;

use crate::error::SessionError;
use crate::protocol::ChatResponse;
use async_trait::async_trait;

pub use http::{HttpHealthProbe, RestSecondaryTransport};
pub use ws::WsPrimaryTransport;

/// Close code for a normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the stream ends without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Single-shot liveness check performed before opening the duplex channel
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns `Ok` when the backend answers with a 2xx status
    async fn check(&self) -> Result<(), SessionError>;
}

/// Factory for the persistent duplex channel
#[async_trait]
pub trait PrimaryTransport: Send + Sync {
    /// Open a new duplex connection
    async fn open(&self) -> Result<Box<dyn DuplexConnection>, SessionError>;
}

/// Event produced by an open duplex connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplexEvent {
    /// A text frame arrived
    Frame(String),
    /// The connection closed
    Closed {
        /// Close code (1000 = normal, 1006 = abnormal)
        code: u16,
        /// Close reason, possibly empty
        reason: String,
    },
    /// A runtime error occurred on the open connection
    Error(String),
}

/// An open duplex channel
///
/// The handle is owned exclusively by the connection supervisor; no other
/// component sends on or closes it directly. `Sync` is required so the
/// supervisor future that owns the handle is spawnable.
#[async_trait]
pub trait DuplexConnection: Send + Sync {
    /// Send a text frame
    async fn send(&mut self, text: String) -> Result<(), SessionError>;

    /// Wait for the next event
    async fn recv(&mut self) -> DuplexEvent;

    /// Close the channel with the given code and reason; best effort
    async fn close(&mut self, code: u16, reason: &str);
}

/// One-shot request/response call used when the duplex channel is unusable
#[async_trait]
pub trait SecondaryTransport: Send + Sync {
    /// Deliver a message and collect the agent responses
    async fn send_chat(&self, message: &str) -> Result<ChatResponse, SessionError>;
}
