//! Message log
//!
//! The append-only ordered log of exchanged messages, plus the message data
//! model. Ordering is arrival order, not `occurred_at` order — the backend's
//! clock may lag receipt, so consumers must not assume monotonic timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a logged message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Response produced by a remote agent
    Response,
    /// Explicit availability change for an agent
    StatusUpdate,
    /// Error reported by the backend
    Error,
    /// User-originated request (optimistic local echo)
    Outbound,
}

/// Structured context attached to an outbound request
///
/// Carries only the fields consumed downstream rather than an open-ended
/// payload bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Project identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Phase identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Content of an attachment: inline data or a reference to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentContent {
    /// Base64-encoded inline content
    Inline(String),
    /// URL or backend handle to externally stored content
    Reference(String),
}

/// A file attached to a message
///
/// Owned by the message that references it; attachments have no independent
/// lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique identifier
    pub id: String,
    /// Original file name
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Inline content or a reference to it
    pub content: AttachmentContent,
}

/// A single entry in the message log; immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier
    pub id: String,
    /// Kind of the entry
    pub kind: MessageKind,
    /// Identifier of the originating agent (`"user"` for outbound entries)
    pub agent_id: String,
    /// Message text
    pub text: String,
    /// When the message occurred: backend clock for inbound entries, local
    /// clock for outbound ones
    pub occurred_at: DateTime<Utc>,
    /// Attached files, possibly empty
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Structured context for outbound entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
}

impl Message {
    /// Create a new message with a fresh id and no attachments or context
    pub fn new(
        kind: MessageKind,
        agent_id: impl Into<String>,
        text: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            agent_id: agent_id.into(),
            text: text.into(),
            occurred_at,
            attachments: Vec::new(),
            context: None,
        }
    }

    /// Attach files to the message
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Attach structured context to the message
    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Append-only ordered log of exchanged messages
///
/// Entries are never edited, reordered, or removed; the log lives for one
/// session and is discarded on teardown.
#[derive(Debug, Default)]
pub struct MessageStore {
    entries: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message in arrival order
    pub(crate) fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// All entries in arrival order
    pub fn all(&self) -> &[Message] {
        &self.entries
    }

    /// The last `n` entries in arrival order
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Lazily iterate over entries matching `predicate`, in arrival order
    pub fn search<P>(&self, mut predicate: P) -> impl Iterator<Item = &Message>
    where
        P: FnMut(&Message) -> bool,
    {
        self.entries.iter().filter(move |m| predicate(m))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
