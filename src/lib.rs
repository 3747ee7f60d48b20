//! Realtime session connection manager for a remote multi-agent service
//!
//! Keeps a client UI continuously synchronized with the backend: maintains a
//! duplex WebSocket channel gated by a health probe, reconnects with
//! exponential backoff, falls back to a one-shot REST call when the channel
//! is unusable, records every exchanged message in an append-only log, and
//! derives agent presence from inbound events.
//!
//! Everything hangs off [`SessionManager`]: construct one per session with
//! [`SessionManager::start`], submit user requests with
//! [`SessionManager::submit`], and read the message log, connection state,
//! and presence set through its accessors.

pub mod config;
pub mod error;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod store;
mod supervisor;
pub mod transport;

pub use config::{DeliveryConfig, EndpointConfig, PresenceConfig, RetryConfig, SessionConfig};
pub use error::SessionError;
pub use presence::{DepartureRules, PresenceTracker};
pub use protocol::{
    AgentStatus, ChatRequest, ChatResponse, ChatResponseItem, InboundFrame, OutboundFrame,
};
pub use session::{ConnectionState, ConnectionStatus, SessionManager};
pub use store::{Attachment, AttachmentContent, Message, MessageContext, MessageKind, MessageStore};
pub use transport::{
    DuplexConnection, DuplexEvent, HealthProbe, PrimaryTransport, SecondaryTransport,
};
