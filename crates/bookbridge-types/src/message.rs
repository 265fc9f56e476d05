use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::user::CurrentUser;

/// Where a displayed message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Loaded once from `GET /api/chats/{id}`
    History,
    /// Delivered over the socket
    Live,
    /// Rendered locally before the server acknowledged it
    Optimistic,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<EntityId>,
    pub sender_id: EntityId,
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Derived: `sender_id == current user id`
    pub is_self: bool,
    pub origin: MessageOrigin,
    /// Client-generated correlation id, only set on optimistic messages and
    /// on server echoes that carry it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
}

impl Message {
    /// Ordering key: creation time, ties broken by id
    pub fn sort_key(&self) -> (DateTime<Utc>, &EntityId) {
        (self.created_at, &self.id)
    }

    pub fn is_optimistic(&self) -> bool {
        self.origin == MessageOrigin::Optimistic
    }

    /// Display name, falling back the way the chat widgets always have.
    pub fn display_name<'a>(&'a self, user: &'a CurrentUser) -> &'a str {
        if self.is_self {
            &user.username
        } else if self.sender_name.is_empty() {
            "User"
        } else {
            &self.sender_name
        }
    }
}

/// A message the caller just handed to the connection, before any echo.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub content: String,
    pub session_id: Option<EntityId>,
    pub client_ref: String,
    pub sent_at: DateTime<Utc>,
}
