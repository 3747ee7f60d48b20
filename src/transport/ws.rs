//! WebSocket implementation of the primary transport
//!
//! Connects to `<ws-base>/ws/<session_id>` with tokio-tungstenite. Ping,
//! pong, and binary frames are handled here and never surface to the
//! supervisor.

use super::{DuplexConnection, DuplexEvent, PrimaryTransport, CLOSE_ABNORMAL};
use crate::error::SessionError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Primary transport backed by a WebSocket connection
#[derive(Debug, Clone)]
pub struct WsPrimaryTransport {
    url: String,
}

impl WsPrimaryTransport {
    /// Create a transport for the given WebSocket URL
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl PrimaryTransport for WsPrimaryTransport {
    async fn open(&self) -> Result<Box<dyn DuplexConnection>, SessionError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SessionError::TransportInit(e.to_string()))?;
        debug!(url = %self.url, "WebSocket connection established");
        Ok(Box::new(WsConnection { stream }))
    }
}

/// An open WebSocket connection
pub struct WsConnection {
    stream: WsStream,
}

#[async_trait]
impl DuplexConnection for WsConnection {
    async fn send(&mut self, text: String) -> Result<(), SessionError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> DuplexEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return DuplexEvent::Frame(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.to_string()),
                        None => (CLOSE_ABNORMAL, String::new()),
                    };
                    return DuplexEvent::Closed { code, reason };
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!("Ignoring binary WebSocket frame");
                    continue;
                }
                // Ping/pong and raw frames are protocol plumbing
                Some(Ok(_)) => continue,
                Some(Err(e)) => return DuplexEvent::Error(e.to_string()),
                None => {
                    return DuplexEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    }
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn exchanges_frames_and_reports_close_code() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let inbound = ws.next().await.unwrap().unwrap();
            match inbound {
                Message::Text(text) => assert!(text.contains("user_message")),
                other => panic!("unexpected message: {:?}", other),
            }

            ws.send(Message::Text(r#"{"type":"noop"}"#.into()))
                .await
                .unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::from(4000),
                reason: "going away".to_string().into(),
            }))
            .await
            .unwrap();
        });

        let transport = WsPrimaryTransport::new(format!("ws://{addr}/ws/test-session"));
        let mut conn = transport.open().await.unwrap();

        conn.send(r#"{"type":"user_message","message":"hi"}"#.to_string())
            .await
            .unwrap();

        assert_eq!(
            conn.recv().await,
            DuplexEvent::Frame(r#"{"type":"noop"}"#.to_string())
        );
        match conn.recv().await {
            DuplexEvent::Closed { code, reason } => {
                assert_eq!(code, 4000);
                assert_eq!(reason, "going away");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        server.await.unwrap();
    }

    #[tokio::test]
    async fn open_fails_when_backend_unreachable() {
        let transport = WsPrimaryTransport::new("ws://127.0.0.1:1/ws/test".to_string());
        match transport.open().await {
            Ok(_) => panic!("expected open to fail"),
            Err(error) => assert!(matches!(error, SessionError::TransportInit(_))),
        }
    }
}
