//! Session configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults, covering backend endpoints, the reconnect policy,
//! outbound delivery, and presence inference.

use std::env;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_WS_BASE: &str = "ws://localhost:8000";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 500;
const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default phrase table for heuristic departure detection
const DEFAULT_DEPARTURE_PHRASES: &[&str] = &[
    "i'll step away",
    "leaving the chat",
    "signing off",
    "catch up with you all later",
    "i'll be offline",
];

/// Configuration for one session manager instance
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend endpoint configuration
    pub endpoints: EndpointConfig,
    /// Reconnect/backoff policy
    pub retry: RetryConfig,
    /// Outbound delivery configuration
    pub delivery: DeliveryConfig,
    /// Presence inference configuration
    pub presence: PresenceConfig,
}

/// Backend endpoints
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL for the health probe and the request/response fallback
    pub api_base: String,
    /// Base URL for the duplex channel
    pub ws_base: String,
}

/// Reconnect/backoff policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of automatic reconnect attempts before giving up
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
}

/// Outbound delivery configuration
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Number of recent log entries attached to outbound frames
    pub history_window: usize,
}

/// Presence inference configuration
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Ordered phrase table for departure detection
    /// (case-insensitive substring match)
    pub departure_phrases: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig {
                api_base: DEFAULT_API_BASE.to_string(),
                ws_base: DEFAULT_WS_BASE.to_string(),
            },
            retry: RetryConfig {
                max_retries: DEFAULT_MAX_RETRIES,
                base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            },
            delivery: DeliveryConfig {
                history_window: DEFAULT_HISTORY_WINDOW,
            },
            presence: PresenceConfig {
                departure_phrases: DEFAULT_DEPARTURE_PHRASES
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            },
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            endpoints: EndpointConfig {
                api_base: env::var("API_BASE_URL").unwrap_or(default.endpoints.api_base),
                ws_base: env::var("WS_BASE_URL").unwrap_or(default.endpoints.ws_base),
            },
            retry: RetryConfig {
                max_retries: env::var("MAX_RECONNECT_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.retry.max_retries),
                base_delay: env::var("RECONNECT_BASE_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(default.retry.base_delay),
            },
            delivery: DeliveryConfig {
                history_window: env::var("HISTORY_WINDOW")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.delivery.history_window),
            },
            presence: default.presence,
        }
    }
}

impl EndpointConfig {
    /// URL of the backend liveness probe
    pub fn health_url(&self) -> String {
        format!("{}/health", self.api_base.trim_end_matches('/'))
    }

    /// URL of the request/response chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.api_base.trim_end_matches('/'))
    }

    /// URL of the duplex channel for the given session
    pub fn ws_url(&self, session_id: &str) -> String {
        format!("{}/ws/{}", self.ws_base.trim_end_matches('/'), session_id)
    }
}

impl RetryConfig {
    /// Backoff delay for the given attempt number: `base_delay * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Whether the automatic retry budget is exhausted
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }
}
