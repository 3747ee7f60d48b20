//! Session state and the public manager facade
//!
//! [`SessionState`] is the single shared snapshot of a session: connection
//! status, the message log, and agent presence. [`SessionManager`] is the
//! handle callers hold; it spawns the connection supervisor and exposes
//! submit, teardown, and read access over the shared state.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::presence::{DepartureRules, PresenceTracker};
use crate::protocol::{ChatResponseItem, InboundFrame};
use crate::store::{Message, MessageKind, MessageStore};
use crate::supervisor::{Command, ConnectionSupervisor};
use crate::transport::{
    HealthProbe, HttpHealthProbe, PrimaryTransport, RestSecondaryTransport, SecondaryTransport,
    WsPrimaryTransport,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Agent identifier recorded on outbound log entries
const USER_AGENT_ID: &str = "user";
/// Agent identifier recorded on error entries with no originating agent
const SYSTEM_AGENT_ID: &str = "system";

const COMMAND_BUFFER: usize = 32;

/// Lifecycle state of the duplex connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection attempt has started yet
    Idle,
    /// Health probe in flight
    Probing,
    /// Probe passed; opening the duplex channel
    Connecting,
    /// Duplex channel is open
    Open,
    /// Channel is down; a retry may be pending
    Closed,
    /// Retry budget exhausted; terminal until an explicit reconnect
    Failed,
}

/// Observable connection status: state, retry counter, and last error text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Number of the reconnect attempt currently pending or in flight
    pub attempt_count: u32,
    /// Human-readable description of the most recent failure
    pub last_error: Option<String>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            attempt_count: 0,
            last_error: None,
        }
    }
}

/// Shared snapshot of one session: connection status, message log, presence
///
/// Mutated only by the connection supervisor and by [`SessionManager::submit`]
/// (the optimistic echo); everyone else reads.
pub struct SessionState {
    pub(crate) status: ConnectionStatus,
    pub(crate) store: MessageStore,
    pub(crate) presence: PresenceTracker,
}

impl SessionState {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            status: ConnectionStatus::default(),
            store: MessageStore::new(),
            presence: PresenceTracker::new(DepartureRules::new(
                &config.presence.departure_phrases,
            )),
        }
    }

    /// Fold one decoded inbound frame into the log, presence set, and
    /// connection status
    pub(crate) fn apply_inbound(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::AgentResponse {
                agent,
                message,
                timestamp,
                uploaded_files,
            } => {
                self.presence.apply_response(&agent, &message);
                let occurred_at = timestamp.unwrap_or_else(Utc::now);
                let entry = Message::new(MessageKind::Response, agent, message, occurred_at)
                    .with_attachments(uploaded_files);
                self.store.append(entry);
            }
            InboundFrame::CollaborationUpdate { agents } => {
                self.presence.apply_roster(agents);
            }
            InboundFrame::StatusUpdate { agent, status } => {
                self.presence.apply_status(&agent, status);
                let text = format!("{agent} is now {}", status.as_str());
                self.store
                    .append(Message::new(MessageKind::StatusUpdate, agent, text, Utc::now()));
            }
            InboundFrame::Error { agent, message } => {
                let agent_id = agent.unwrap_or_else(|| SYSTEM_AGENT_ID.to_string());
                self.status.last_error = Some(message.clone());
                self.store
                    .append(Message::new(MessageKind::Error, agent_id, message, Utc::now()));
            }
        }
    }

    /// Fold one secondary-transport response into the log and presence set
    pub(crate) fn apply_chat_response(&mut self, item: ChatResponseItem) {
        self.presence.apply_response(&item.agent, &item.message);
        let occurred_at = item.timestamp.unwrap_or_else(Utc::now);
        self.store.append(Message::new(
            MessageKind::Response,
            item.agent,
            item.message,
            occurred_at,
        ));
    }
}

/// Handle to a running session
///
/// Cloneable; dropping the last clone tears the session down. Created with
/// [`SessionManager::start`], which spawns the supervisor task and begins
/// connecting immediately.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<RwLock<SessionState>>,
    commands: mpsc::Sender<Command>,
    history_window: usize,
}

impl SessionManager {
    /// Start a session against the configured backend
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: SessionConfig, session_id: &str) -> Self {
        let client = reqwest::Client::new();
        let probe = Arc::new(HttpHealthProbe::new(
            client.clone(),
            config.endpoints.health_url(),
        ));
        let primary = Arc::new(WsPrimaryTransport::new(config.endpoints.ws_url(session_id)));
        let secondary = Arc::new(RestSecondaryTransport::new(
            client,
            config.endpoints.chat_url(),
        ));
        Self::start_with(config, probe, primary, secondary)
    }

    /// Start a session with caller-supplied transports
    pub fn start_with(
        config: SessionConfig,
        probe: Arc<dyn HealthProbe>,
        primary: Arc<dyn PrimaryTransport>,
        secondary: Arc<dyn SecondaryTransport>,
    ) -> Self {
        let shared = Arc::new(RwLock::new(SessionState::new(&config)));
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let history_window = config.delivery.history_window;

        let supervisor = ConnectionSupervisor::new(
            config,
            probe,
            primary,
            secondary,
            Arc::clone(&shared),
            rx,
        );
        tokio::spawn(supervisor.run());

        Self {
            shared,
            commands: tx,
            history_window,
        }
    }

    /// Submit a user message addressed to `targets` (empty means any agent)
    ///
    /// The message is appended to the log immediately, then delivered on the
    /// duplex channel or the secondary transport. On total delivery failure
    /// the echo stays in the log and an error is returned.
    pub async fn submit(
        &self,
        text: impl Into<String>,
        targets: Vec<String>,
    ) -> Result<(), SessionError> {
        let message = Message::new(MessageKind::Outbound, USER_AGENT_ID, text, Utc::now());
        self.submit_message(message, targets).await
    }

    /// Submit a pre-built message, carrying attachments and context
    ///
    /// The message kind is forced to [`MessageKind::Outbound`].
    pub async fn submit_message(
        &self,
        mut message: Message,
        targets: Vec<String>,
    ) -> Result<(), SessionError> {
        message.kind = MessageKind::Outbound;

        // History captured before the echo is appended, so the submitted
        // message never appears in its own history.
        let history = {
            let mut state = self.shared.write().await;
            let history = state.store.tail(self.history_window).to_vec();
            state.store.append(message.clone());
            history
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Deliver {
                message,
                targets,
                history,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        reply_rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Reset the retry budget and reconnect; no-op while already open
    pub async fn force_reconnect(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::ForceReconnect)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Close the duplex channel normally and stop the supervisor
    ///
    /// Idempotent: tearing down an already-stopped session is a no-op.
    pub async fn teardown(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Teardown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    /// Current connection status
    pub async fn connection(&self) -> ConnectionStatus {
        self.shared.read().await.status.clone()
    }

    /// All logged messages in arrival order
    pub async fn messages(&self) -> Vec<Message> {
        self.shared.read().await.store.all().to_vec()
    }

    /// The last `n` logged messages in arrival order
    pub async fn tail(&self, n: usize) -> Vec<Message> {
        self.shared.read().await.store.tail(n).to_vec()
    }

    /// Logged messages matching `predicate`, in arrival order
    pub async fn search<P>(&self, predicate: P) -> Vec<Message>
    where
        P: FnMut(&Message) -> bool,
    {
        self.shared
            .read()
            .await
            .store
            .search(predicate)
            .cloned()
            .collect()
    }

    /// Identifiers of agents currently believed active, in first-seen order
    pub async fn presence(&self) -> Vec<String> {
        self.shared.read().await.presence.active().to_vec()
    }
}
