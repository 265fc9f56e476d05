use serde::{Deserialize, Serialize};

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    pub endpoint: EndpointConfig,
    pub peer: ConnectionConfig,
    pub community: ConnectionConfig,
    pub reconcile: ReconcileMode,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            peer: ConnectionConfig::peer(),
            community: ConnectionConfig::community(),
            reconcile: ReconcileMode::AppendOnly,
        }
    }
}

/// Where the API and sockets live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// `host[:port]`, no scheme
    pub host: String,
    /// Page served over https, so sockets use wss
    pub secure: bool,
    pub api_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost:8000".to_string(),
            secure: false,
            api_base: "/api".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn ws_origin(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}", scheme, self.host)
    }

    pub fn http_origin(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.http_origin(),
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Per-surface connection behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Report a timeout if the transport has not opened by then
    pub open_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
    /// Send `{type:"auth", token}` right after the socket opens
    pub send_auth_frame: bool,
    /// Put the bearer token in the socket URL (browsers cannot set headers)
    pub token_in_query: bool,
    /// Tag outbound messages with a `client_ref` for echo correlation
    pub correlate_echoes: bool,
}

impl ConnectionConfig {
    pub fn peer() -> Self {
        Self {
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            reconnect: ReconnectPolicy::Never,
            send_auth_frame: true,
            token_in_query: true,
            correlate_echoes: false,
        }
    }

    pub fn community() -> Self {
        Self {
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            reconnect: ReconnectPolicy::Fixed {
                delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            },
            send_auth_frame: false,
            token_in_query: true,
            correlate_echoes: false,
        }
    }
}

pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// What to do after an unexpected close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconnectPolicy {
    /// Surface the error; the user reconnects by hand
    Never,
    /// Same delay every time, no attempt cap
    Fixed { delay_ms: u64 },
    /// Doubling delay capped at `max_ms`, optionally limited in attempts
    Backoff {
        initial_ms: u64,
        max_ms: u64,
        max_attempts: Option<u32>,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` when
    /// no attempt should be made.
    pub fn delay_for(&self, attempt: u32) -> Option<u64> {
        match self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Fixed { delay_ms } => Some(*delay_ms),
            ReconnectPolicy::Backoff {
                initial_ms,
                max_ms,
                max_attempts,
            } => {
                if attempt == 0 || max_attempts.is_some_and(|max| attempt > max) {
                    return None;
                }
                let exponent = (attempt - 1).min(32);
                let delay = initial_ms.saturating_mul(1u64 << exponent);
                Some(delay.min(*max_ms))
            }
        }
    }
}

/// How live socket messages are merged into a session's log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileMode {
    /// Every live message is appended in arrival order; an optimistic local
    /// copy and its server echo both stay visible.
    AppendOnly,
    /// Server echoes replace the optimistic entry carrying the same
    /// `client_ref`, and live messages whose server id is already present
    /// are dropped.
    Correlated,
}
