//! Wire protocol types
//!
//! JSON frames exchanged over the duplex channel, plus the request/response
//! bodies of the secondary transport. Inbound frames are decoded with
//! [`InboundFrame::parse`]; a malformed frame is a parse error that the
//! caller logs and drops without touching connection state.

use crate::error::SessionError;
use crate::store::{Attachment, Message, MessageContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Explicit agent availability carried by `status_update` frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent is active and reachable
    Online,
    /// Agent has left the session
    Offline,
    /// Agent is temporarily unavailable; treated as absent
    Away,
}

impl AgentStatus {
    /// String form as carried on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Away => "away",
        }
    }
}

/// Inbound frame received over the duplex channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A response produced by a remote agent
    AgentResponse {
        /// Identifier of the responding agent
        agent: String,
        /// Response text
        message: String,
        /// Backend-side timestamp; may lag receipt time
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
        /// Files attached to the response
        #[serde(default)]
        uploaded_files: Vec<Attachment>,
    },
    /// Full roster snapshot replacing the presence set
    CollaborationUpdate {
        /// The complete list of currently active agents
        #[serde(default)]
        agents: Vec<String>,
    },
    /// Explicit availability change for a single agent
    StatusUpdate {
        /// Identifier of the agent whose status changed
        agent: String,
        /// New availability
        status: AgentStatus,
    },
    /// Error reported by the backend
    Error {
        /// Identifier of the originating agent, if any
        #[serde(default)]
        agent: Option<String>,
        /// Human-readable error text
        message: String,
    },
}

impl InboundFrame {
    /// Decode a raw text frame
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Outbound frame sent over the duplex channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A user-originated request
    UserMessage {
        /// Request text
        message: String,
        /// Structured request context
        context: Option<MessageContext>,
        /// Agents the user addressed explicitly; empty means any
        requested_agents: Vec<String>,
        /// Files attached to the request
        uploaded_files: Vec<Attachment>,
        /// Recent log entries for backend-side context
        history: Vec<Message>,
    },
}

impl OutboundFrame {
    /// Encode the frame as a text payload
    pub fn encode(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Request body of the secondary transport
///
/// Minimal payload: the secondary path carries no history or attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Request text
    pub message: String,
}

/// Response body of the secondary transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Agent responses produced for the request
    #[serde(default)]
    pub responses: Vec<ChatResponseItem>,
}

/// One agent response in a [`ChatResponse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseItem {
    /// Identifier of the responding agent
    pub agent: String,
    /// Response text
    pub message: String,
    /// Backend-side timestamp, if provided; defaults to receipt time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
