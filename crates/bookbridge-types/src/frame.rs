//! Real-time protocol frames.
//!
//! Peer chat frames are enveloped by a `type` tag. Community frames are bare
//! message objects. Inbound parsing is lenient about which optional fields
//! are present because the backend has shipped several variants of the
//! message payload (top-level `sender_name`, or nested under `data`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::EntityId;
use crate::message::{Message, MessageOrigin};
use crate::user::CurrentUser;

/// Server → client frame on the peer chat socket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerFrame {
    Message(WireMessage),
    ChatCreated {
        chat_id: EntityId,
    },
    /// Informational; history is loaded over REST
    History {
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        messages: Option<Value>,
    },
    Error {
        #[serde(default)]
        content: String,
    },
    ConnectionSuccess {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

impl PeerFrame {
    pub fn parse(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Nested payload some backends put next to the message body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMessageData {
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub message_id: Option<EntityId>,
}

/// A chat message as delivered over a socket. Community frames are exactly
/// this object without a `type` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default, alias = "message_id")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub chat_id: Option<EntityId>,
    #[serde(default)]
    pub sender_id: Option<EntityId>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_ref: Option<String>,
    #[serde(default)]
    pub data: Option<WireMessageData>,
}

impl WireMessage {
    pub fn parse(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Normalize into a display message. `received_at` stands in for a
    /// missing timestamp. Unnumbered messages get a synthesized id from the
    /// timestamp and `seq`, which the caller keeps unique per stream.
    pub fn into_message(self, user: &CurrentUser, received_at: DateTime<Utc>, seq: u64) -> Message {
        let data = self.data.unwrap_or_default();
        let created_at = self.timestamp.unwrap_or(received_at);
        let id = self.id.or(data.message_id).unwrap_or_else(|| {
            EntityId::new(format!("live-{}-{}", created_at.timestamp_millis(), seq))
        });
        let sender_id = self.sender_id.unwrap_or_default();
        let sender_name = self
            .sender_name
            .or(data.sender_name)
            .unwrap_or_default();

        Message {
            is_self: sender_id == user.id,
            id,
            session_id: self.chat_id,
            sender_id,
            sender_name,
            content: self.content,
            created_at,
            origin: MessageOrigin::Live,
            client_ref: self.client_ref,
        }
    }
}

/// Client → server frame, shared by both sockets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Auth {
        token: String,
    },
    Message {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<EntityId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },
}

impl OutboundFrame {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
