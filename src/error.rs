//! Error types for the session connection manager
//!
//! Distinguishes transient transport faults, which the supervisor retries
//! internally, from the errors that are surfaced to callers.

use thiserror::Error;

/// Errors produced by the session connection manager
///
/// Transient variants (`Probe`, `TransportInit`, `Transport`,
/// `TransportClosed`) are retried by the connection supervisor and never
/// returned from public methods; callers only ever observe `Delivery`,
/// `SessionClosed`, and the terminal `Failed` connection state.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Backend health check returned a non-2xx status or the request failed
    #[error("Health probe failed: {0}")]
    Probe(String),

    /// The duplex channel could not be constructed
    #[error("WebSocket init error: {0}")]
    TransportInit(String),

    /// Runtime error on an open duplex channel
    #[error("Transport error: {0}")]
    Transport(String),

    /// The duplex channel closed unexpectedly
    #[error("Closed (code={code}): {reason}")]
    TransportClosed {
        /// Close code reported by the transport (1000 = normal closure)
        code: u16,
        /// Close reason; "No reason" when the transport supplied none
        reason: String,
    },

    /// An inbound frame could not be decoded
    #[error("Malformed inbound frame: {0}")]
    Parse(#[from] serde_json::Error),

    /// The automatic reconnect budget is exhausted; terminal until a manual
    /// reconnect
    #[error("Maximum reconnect attempts ({0}) reached.")]
    MaxRetriesExceeded(u32),

    /// Both delivery paths failed for a single submit call; the optimistic
    /// local echo is retained
    #[error("Message delivery failed: {0}")]
    Delivery(String),

    /// The session was torn down; no further operations are possible
    #[error("Session has been torn down")]
    SessionClosed,
}
