use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Server rejected request (HTTP {status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}

impl ChatError {
    /// Classify a non-success REST response.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ChatError::AuthRequired,
            404 => ChatError::NotFound(
                body_message(body).unwrap_or_else(|| "Resource not found".to_string()),
            ),
            _ => ChatError::ServerRejected {
                status,
                message: body_message(body)
                    .unwrap_or_else(|| format!("Request failed (HTTP {})", status)),
            },
        }
    }

    /// Text for the inline danger banner.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::AuthRequired => "Please log in to continue.".to_string(),
            ChatError::NotFound(what) => what.clone(),
            ChatError::Transport(msg) => msg.clone(),
            ChatError::Validation(msg) => msg.clone(),
            ChatError::ServerRejected { message, .. } => message.clone(),
            ChatError::NotConnected => "Not connected. Please wait and try again.".to_string(),
            ChatError::Timeout(_) => "Connection timed out. Please try again.".to_string(),
            ChatError::Network(_) => "Network error. Please try again.".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the UI should offer a retry control.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Transport(_)
            | ChatError::Network(_)
            | ChatError::Timeout(_)
            | ChatError::NotConnected => true,
            ChatError::ServerRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Errors that should send the user back to the login page.
    pub fn requires_login(&self) -> bool {
        matches!(self, ChatError::AuthRequired)
    }
}

/// Pull a human-readable message out of an error body: JSON `error` or
/// `message` field first, then the raw text.
fn body_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return ["error", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }
    Some(trimmed.to_string())
}
