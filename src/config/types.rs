use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// REST API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for the payment API (e.g., "https://api.example.com").
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Connection timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
}

/// Push-event channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Base URL of the event server; `http(s)` is mapped to `ws(s)`.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Socket.IO namespace carrying payment-intent events.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// How long to wait for the `authenticate` acknowledgement.
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// How long a caller waits for the connection task to answer a command.
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// First reconnect delay after a dropped connection.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    /// Upper bound for the doubling reconnect delay.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Capacity of the pushed-event fan-out buffer.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Credentials used for both the REST API and the event channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token (JWT) issued by the backend.
    #[serde(default)]
    pub token: Option<String>,
    /// Identifier of the authenticated user, sent on intent creation.
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_ws_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_namespace() -> String {
    "/payment-intents".to_string()
}

fn default_auth_timeout_ms() -> u64 {
    5_000
}

fn default_reply_timeout_ms() -> u64 {
    1_000
}

fn default_reconnect_base_ms() -> u64 {
    500
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_event_buffer() -> usize {
    64
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            namespace: default_namespace(),
            auth_timeout_ms: default_auth_timeout_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}
