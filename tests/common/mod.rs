//! Shared test support: scripted fake transports and polling helpers

#![allow(dead_code)]

use agent_session::protocol::{ChatResponse, ChatResponseItem};
use agent_session::transport::{
    DuplexConnection, DuplexEvent, HealthProbe, PrimaryTransport, SecondaryTransport,
    CLOSE_ABNORMAL,
};
use agent_session::{ConnectionState, SessionConfig, SessionError, SessionManager};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};

const POLL_INTERVAL: Duration = Duration::from_millis(2);
const POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Config with millisecond-scale backoff so tests run fast
///
/// Also installs the log subscriber so a failing test prints supervisor
/// activity under `RUST_LOG`.
pub fn test_config() -> SessionConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut config = SessionConfig::default();
    config.retry.max_retries = 2;
    config.retry.base_delay = Duration::from_millis(10);
    config
}

/// Poll `condition` until it holds or the timeout elapses
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll until the session reaches the given connection state
pub async fn wait_for_state(manager: &SessionManager, state: ConnectionState) {
    wait_until(&format!("connection state {state:?}"), || async {
        manager.connection().await.state == state
    })
    .await;
}

/// Health probe with a scripted prefix of results, then a fixed default
pub struct FakeProbe {
    script: Mutex<VecDeque<Result<(), SessionError>>>,
    default_ok: bool,
}

impl FakeProbe {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default_ok: true,
        })
    }

    pub fn unhealthy() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default_ok: false,
        })
    }

    /// Fails the first `n` checks, then succeeds
    pub fn failing_times(n: usize) -> Arc<Self> {
        let script = (0..n)
            .map(|_| Err(SessionError::Probe("connection refused".to_string())))
            .collect();
        Arc::new(Self {
            script: Mutex::new(script),
            default_ok: true,
        })
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn check(&self) -> Result<(), SessionError> {
        if let Some(result) = self.script.lock().await.pop_front() {
            return result;
        }
        if self.default_ok {
            Ok(())
        } else {
            Err(SessionError::Probe("connection refused".to_string()))
        }
    }
}

/// Outcome of one scripted connect attempt
pub enum ConnectOutcome {
    Fail(String),
    Connect(FakeConnection),
}

/// Primary transport serving a scripted sequence of connect outcomes
///
/// Once the script is exhausted, every further open attempt fails.
pub struct FakePrimary {
    script: Mutex<VecDeque<ConnectOutcome>>,
    opens: AtomicUsize,
}

impl FakePrimary {
    pub fn new(script: Vec<ConnectOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            opens: AtomicUsize::new(0),
        })
    }

    /// Pre-creates `n` connections; open hands them out in order
    pub fn with_connections(n: usize) -> (Arc<Self>, Vec<ConnectionHandle>) {
        let mut script = Vec::with_capacity(n);
        let mut handles = Vec::with_capacity(n);
        for _ in 0..n {
            let (conn, handle) = FakeConnection::pair();
            script.push(ConnectOutcome::Connect(conn));
            handles.push(handle);
        }
        (Self::new(script), handles)
    }

    pub fn never_connects() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrimaryTransport for FakePrimary {
    async fn open(&self) -> Result<Box<dyn DuplexConnection>, SessionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(ConnectOutcome::Connect(conn)) => Ok(Box::new(conn)),
            Some(ConnectOutcome::Fail(msg)) => Err(SessionError::TransportInit(msg)),
            None => Err(SessionError::TransportInit("connection refused".to_string())),
        }
    }
}

/// Scripted duplex connection; the paired [`ConnectionHandle`] injects events
/// and observes sends and closes
pub struct FakeConnection {
    events: mpsc::UnboundedReceiver<DuplexEvent>,
    sent_tx: mpsc::UnboundedSender<String>,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<std::sync::Mutex<Option<(u16, String)>>>,
}

pub struct ConnectionHandle {
    events: mpsc::UnboundedSender<DuplexEvent>,
    sent: Mutex<mpsc::UnboundedReceiver<String>>,
    fail_sends: Arc<AtomicBool>,
    closed: Arc<std::sync::Mutex<Option<(u16, String)>>>,
}

impl FakeConnection {
    pub fn pair() -> (FakeConnection, ConnectionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let fail_sends = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(std::sync::Mutex::new(None));
        (
            FakeConnection {
                events: events_rx,
                sent_tx,
                fail_sends: Arc::clone(&fail_sends),
                closed: Arc::clone(&closed),
            },
            ConnectionHandle {
                events: events_tx,
                sent: Mutex::new(sent_rx),
                fail_sends,
                closed,
            },
        )
    }
}

impl ConnectionHandle {
    pub fn emit(&self, event: DuplexEvent) {
        let _ = self.events.send(event);
    }

    pub fn emit_frame(&self, text: &str) {
        self.emit(DuplexEvent::Frame(text.to_string()));
    }

    pub fn emit_close(&self, code: u16, reason: &str) {
        self.emit(DuplexEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    /// Next frame sent on this connection; panics after two seconds
    pub async fn next_sent(&self) -> String {
        let mut sent = self.sent.lock().await;
        tokio::time::timeout(POLL_TIMEOUT, sent.recv())
            .await
            .expect("timed out waiting for a sent frame")
            .expect("connection dropped without sending")
    }

    /// Make every subsequent send on this connection fail
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Code and reason the supervisor closed this connection with, if any
    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DuplexConnection for FakeConnection {
    async fn send(&mut self, text: String) -> Result<(), SessionError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("send failed".to_string()));
        }
        let _ = self.sent_tx.send(text);
        Ok(())
    }

    async fn recv(&mut self) -> DuplexEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => DuplexEvent::Closed {
                code: CLOSE_ABNORMAL,
                reason: String::new(),
            },
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        *self.closed.lock().unwrap() = Some((code, reason.to_string()));
    }
}

/// Secondary transport with scripted responses and an optional gate that
/// holds the first call until released
pub struct FakeSecondary {
    script: Mutex<VecDeque<Result<ChatResponse, SessionError>>>,
    default_ok: bool,
    sent: std::sync::Mutex<Vec<String>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeSecondary {
    fn build(
        script: Vec<Result<ChatResponse, SessionError>>,
        default_ok: bool,
        gate: Option<oneshot::Receiver<()>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            default_ok,
            sent: std::sync::Mutex::new(Vec::new()),
            gate: Mutex::new(gate),
        })
    }

    /// Always succeeds with an empty response list
    pub fn empty() -> Arc<Self> {
        Self::build(Vec::new(), true, None)
    }

    /// Always fails
    pub fn failing() -> Arc<Self> {
        Self::build(Vec::new(), false, None)
    }

    /// First call returns the given `(agent, message)` responses, later
    /// calls return empty lists
    pub fn with_responses(items: &[(&str, &str)]) -> Arc<Self> {
        let responses = items
            .iter()
            .map(|(agent, message)| ChatResponseItem {
                agent: agent.to_string(),
                message: message.to_string(),
                timestamp: None,
            })
            .collect();
        Self::build(vec![Ok(ChatResponse { responses })], true, None)
    }

    /// First call blocks until the returned sender is used or dropped
    pub fn gated() -> (Arc<Self>, oneshot::Sender<()>) {
        let (release_tx, release_rx) = oneshot::channel();
        (Self::build(Vec::new(), true, Some(release_rx)), release_tx)
    }

    /// Messages delivered through this transport, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecondaryTransport for FakeSecondary {
    async fn send_chat(&self, message: &str) -> Result<ChatResponse, SessionError> {
        self.sent.lock().unwrap().push(message.to_string());
        if let Some(gate) = self.gate.lock().await.take() {
            let _ = gate.await;
        }
        if let Some(result) = self.script.lock().await.pop_front() {
            return result;
        }
        if self.default_ok {
            Ok(ChatResponse {
                responses: Vec::new(),
            })
        } else {
            Err(SessionError::Delivery("secondary unavailable".to_string()))
        }
    }
}
