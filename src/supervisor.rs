//! Connection supervisor
//!
//! A single actor task that owns the duplex connection handle, drives the
//! probe → connect → open lifecycle with exponential backoff, folds inbound
//! frames into the message log and presence set, and routes outbound
//! requests to the primary or secondary transport.
//!
//! All mutation happens on this task (or under the shared state's write
//! lock), so inbound frames are processed strictly in arrival order and at
//! most one connect attempt is in flight at any time.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::protocol::{InboundFrame, OutboundFrame};
use crate::session::{ConnectionState, ConnectionStatus, SessionState};
use crate::store::Message;
use crate::transport::{
    DuplexConnection, DuplexEvent, HealthProbe, PrimaryTransport, SecondaryTransport, CLOSE_NORMAL,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Probe-failure text surfaced through `last_error`
const PROBE_FAILED_ERROR: &str = "Backend health check failed";
/// Reason sent with the normal-closure frame on teardown
const TEARDOWN_REASON: &str = "Session teardown";

/// Commands accepted by the supervisor task
pub(crate) enum Command {
    /// Deliver an outbound message (already appended to the log)
    Deliver {
        message: Message,
        targets: Vec<String>,
        history: Vec<Message>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Reset the retry budget and re-enter the connect sequence
    ForceReconnect,
    /// Close the transport normally and stop; suppresses further reconnects
    Teardown { reply: oneshot::Sender<()> },
}

/// What the run loop woke up for
enum Tick {
    Command(Option<Command>),
    Transport(DuplexEvent),
    RetryDue,
}

/// Owns the connect/backoff state machine and the transport handle
pub(crate) struct ConnectionSupervisor {
    config: SessionConfig,
    probe: Arc<dyn HealthProbe>,
    primary: Arc<dyn PrimaryTransport>,
    secondary: Arc<dyn SecondaryTransport>,
    shared: Arc<RwLock<SessionState>>,
    commands: mpsc::Receiver<Command>,
    conn: Option<Box<dyn DuplexConnection>>,
    attempt_count: u32,
    retry_at: Option<Instant>,
    manual_close: bool,
}

impl ConnectionSupervisor {
    pub(crate) fn new(
        config: SessionConfig,
        probe: Arc<dyn HealthProbe>,
        primary: Arc<dyn PrimaryTransport>,
        secondary: Arc<dyn SecondaryTransport>,
        shared: Arc<RwLock<SessionState>>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            config,
            probe,
            primary,
            secondary,
            shared,
            commands,
            conn: None,
            attempt_count: 0,
            retry_at: None,
            manual_close: false,
        }
    }

    /// Run until teardown. Begins the connect sequence immediately.
    pub(crate) async fn run(mut self) {
        self.begin_connect().await;

        loop {
            match self.next_tick().await {
                Tick::Command(None) => {
                    // All manager handles dropped: same as teardown
                    self.shutdown().await;
                    return;
                }
                Tick::Command(Some(Command::Teardown { reply })) => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    return;
                }
                Tick::Command(Some(Command::ForceReconnect)) => {
                    self.force_reconnect().await;
                }
                Tick::Command(Some(Command::Deliver {
                    message,
                    targets,
                    history,
                    reply,
                })) => {
                    let result = self.deliver(message, targets, history).await;
                    let _ = reply.send(result);
                }
                Tick::Transport(event) => self.handle_transport_event(event).await,
                Tick::RetryDue => {
                    self.retry_at = None;
                    self.begin_connect().await;
                }
            }
        }
    }

    async fn next_tick(&mut self) -> Tick {
        let retry_at = self.retry_at;
        let retry = async move {
            match retry_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(retry);

        match self.conn.as_mut() {
            Some(conn) => tokio::select! {
                cmd = self.commands.recv() => Tick::Command(cmd),
                event = conn.recv() => Tick::Transport(event),
                _ = &mut retry => Tick::RetryDue,
            },
            None => tokio::select! {
                cmd = self.commands.recv() => Tick::Command(cmd),
                _ = &mut retry => Tick::RetryDue,
            },
        }
    }

    /// One probe + open attempt. No-op while the channel is already open;
    /// only ever entered from the run loop, so a single attempt is in flight
    /// at any time.
    async fn begin_connect(&mut self) {
        if self.conn.is_some() {
            debug!("Connect requested while already open, ignoring");
            return;
        }

        self.update_status(|s| {
            s.state = ConnectionState::Probing;
            s.last_error = None;
        })
        .await;

        if let Err(e) = self.probe.check().await {
            warn!(error = %e, "Health probe failed");
            self.update_status(|s| {
                s.state = ConnectionState::Closed;
                s.last_error = Some(PROBE_FAILED_ERROR.to_string());
            })
            .await;
            self.schedule_retry().await;
            return;
        }

        self.update_status(|s| s.state = ConnectionState::Connecting)
            .await;

        match self.primary.open().await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.attempt_count = 0;
                info!("Duplex channel open");
                self.update_status(|s| {
                    s.state = ConnectionState::Open;
                    s.attempt_count = 0;
                    s.last_error = None;
                })
                .await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to open duplex channel");
                let detail = e.to_string();
                self.update_status(|s| {
                    s.state = ConnectionState::Closed;
                    s.last_error = Some(detail);
                })
                .await;
                self.schedule_retry().await;
            }
        }
    }

    /// Schedule the next automatic attempt, or give up once the budget is
    /// spent. The k-th scheduled delay is `base_delay * 2^k`.
    async fn schedule_retry(&mut self) {
        if self.manual_close {
            return;
        }
        if self.config.retry.is_exhausted(self.attempt_count) {
            error!(
                attempts = self.attempt_count,
                "Reconnect budget exhausted, giving up"
            );
            let message = SessionError::MaxRetriesExceeded(self.config.retry.max_retries);
            self.update_status(|s| {
                s.state = ConnectionState::Failed;
                s.last_error = Some(message.to_string());
            })
            .await;
            self.retry_at = None;
            return;
        }

        let delay = self.config.retry.delay_for(self.attempt_count);
        self.attempt_count += 1;
        let attempt = self.attempt_count;
        self.update_status(|s| s.attempt_count = attempt).await;
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
        self.retry_at = Some(Instant::now() + delay);
    }

    async fn handle_transport_event(&mut self, event: DuplexEvent) {
        match event {
            DuplexEvent::Frame(text) => self.handle_frame(&text).await,
            DuplexEvent::Error(detail) => {
                error!(error = %detail, "Transport error, force-closing channel");
                self.update_status(|s| {
                    s.state = ConnectionState::Failed;
                    s.last_error = Some(format!("Transport error: {detail}"));
                })
                .await;
                let reason = "Transport error";
                if let Some(mut conn) = self.conn.take() {
                    conn.close(CLOSE_NORMAL, reason).await;
                }
                // The forced close is recorded like any other close
                self.handle_closed(CLOSE_NORMAL, reason.to_string()).await;
            }
            DuplexEvent::Closed { code, reason } => {
                self.conn = None;
                self.handle_closed(code, reason).await;
            }
        }
    }

    /// Record a channel close and schedule the reconnect, unless the close
    /// was requested by teardown
    async fn handle_closed(&mut self, code: u16, reason: String) {
        if self.manual_close {
            debug!(code, "Channel closed after teardown");
            return;
        }
        let error = SessionError::TransportClosed {
            code,
            reason: if reason.is_empty() {
                "No reason".to_string()
            } else {
                reason
            },
        };
        warn!(error = %error, "Channel closed unexpectedly");
        self.update_status(|s| {
            s.state = ConnectionState::Closed;
            s.last_error = Some(error.to_string());
        })
        .await;
        self.schedule_retry().await;
    }

    /// Decode a raw frame and fold it into the shared state. Malformed
    /// frames are logged and dropped; connection state is untouched.
    async fn handle_frame(&self, text: &str) {
        match InboundFrame::parse(text) {
            Ok(frame) => {
                let mut state = self.shared.write().await;
                state.apply_inbound(frame);
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed inbound frame");
            }
        }
    }

    /// Route an outbound message: primary if open, else secondary fallback.
    /// The optimistic echo has already been appended by the caller.
    async fn deliver(
        &mut self,
        message: Message,
        targets: Vec<String>,
        history: Vec<Message>,
    ) -> Result<(), SessionError> {
        if let Some(conn) = self.conn.as_mut() {
            let frame = OutboundFrame::UserMessage {
                message: message.text.clone(),
                context: message.context.clone(),
                requested_agents: targets,
                uploaded_files: message.attachments.clone(),
                history,
            };
            match frame.encode() {
                Ok(encoded) => match conn.send(encoded).await {
                    Ok(()) => {
                        debug!(message_id = %message.id, "Outbound frame sent on duplex channel");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "Primary send failed, falling back to secondary transport");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Failed to encode outbound frame, falling back");
                }
            }
        }

        self.deliver_secondary(&message).await
    }

    async fn deliver_secondary(&self, message: &Message) -> Result<(), SessionError> {
        let response = self.secondary.send_chat(&message.text).await.map_err(|e| {
            error!(error = %e, "Secondary transport failed, delivery abandoned");
            SessionError::Delivery(format!(
                "both primary and secondary transports failed: {e}"
            ))
        })?;

        debug!(
            message_id = %message.id,
            responses = response.responses.len(),
            "Delivered via secondary transport"
        );

        let mut state = self.shared.write().await;
        for item in response.responses {
            state.apply_chat_response(item);
        }
        Ok(())
    }

    /// Teardown: cancel any pending retry, close the channel with a normal
    /// closure, and mark the state machine closed for good.
    async fn shutdown(&mut self) {
        info!("Tearing down session");
        self.manual_close = true;
        self.retry_at = None;
        if let Some(mut conn) = self.conn.take() {
            conn.close(CLOSE_NORMAL, TEARDOWN_REASON).await;
        }
        self.update_status(|s| s.state = ConnectionState::Closed)
            .await;
    }

    /// Reset the retry budget and reconnect, unless already open
    async fn force_reconnect(&mut self) {
        if self.conn.is_some() {
            debug!("Force reconnect requested while open, ignoring");
            return;
        }
        info!("Force reconnect requested");
        self.attempt_count = 0;
        self.manual_close = false;
        self.retry_at = None;
        self.update_status(|s| s.attempt_count = 0).await;
        self.begin_connect().await;
    }

    async fn update_status<F>(&self, f: F)
    where
        F: FnOnce(&mut ConnectionStatus),
    {
        let mut state = self.shared.write().await;
        f(&mut state.status);
    }
}
