//! HTTP transport implementations
//!
//! The backend liveness probe and the secondary request/response transport,
//! both built on a shared `reqwest::Client` for connection pooling.

use super::{HealthProbe, SecondaryTransport};
use crate::error::SessionError;
use crate::protocol::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use tracing::debug;

/// Liveness probe against `GET <api-base>/health`
///
/// Any 2xx status is success; everything else, including network errors, is
/// a probe failure.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    /// Create a probe for the given health endpoint URL
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> Result<(), SessionError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SessionError::Probe(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Probe(format!("HTTP {}", status.as_u16())));
        }

        debug!(url = %self.url, "Health probe succeeded");
        Ok(())
    }
}

/// Request/response fallback against `POST <api-base>/chat`
#[derive(Debug, Clone)]
pub struct RestSecondaryTransport {
    client: reqwest::Client,
    url: String,
}

impl RestSecondaryTransport {
    /// Create a transport for the given chat endpoint URL
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl SecondaryTransport for RestSecondaryTransport {
    async fn send_chat(&self, message: &str) -> Result<ChatResponse, SessionError> {
        let request = ChatRequest {
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SessionError::Delivery(format!("Failed to send chat request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(SessionError::Delivery(format!(
                "Chat endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Delivery(format!("Failed to parse chat response: {e}")))?;

        debug!(
            url = %self.url,
            responses = parsed.responses.len(),
            "Chat fallback delivered"
        );
        Ok(parsed)
    }
}
