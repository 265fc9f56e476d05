use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::message::{Message, MessageOrigin};
use crate::user::{CurrentUser, Role};

/// A buyer/seller conversation about one book, as the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Server-assigned; `0` while the server has not created it yet
    pub id: EntityId,
    pub book_id: EntityId,
    pub book_title: String,
    pub counterpart_user_id: EntityId,
    pub counterpart_name: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    /// A placeholder for a conversation the first socket connection will create.
    pub fn pending(book_id: impl Into<EntityId>, counterpart_user_id: impl Into<EntityId>) -> Self {
        Self {
            id: EntityId::from(0u64),
            book_id: book_id.into(),
            book_title: String::new(),
            counterpart_user_id: counterpart_user_id.into(),
            counterpart_name: String::new(),
            messages: Vec::new(),
            created_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }

    /// Project a `GET /api/chats` record onto the current user's point of
    /// view: buyers talk to the seller, everybody else talks to the buyer.
    pub fn from_record(record: ChatSessionRecord, user: &CurrentUser) -> Self {
        let (counterpart_user_id, counterpart_name) = match user.role {
            Role::Buyer => (record.seller_id, record.seller_name),
            Role::Seller | Role::Admin => (record.buyer_id, record.buyer_name),
        };
        let messages = record
            .messages
            .into_iter()
            .map(|m| m.into_message(MessageOrigin::History, user))
            .collect();

        Self {
            id: record.chat_id,
            book_id: record.book_id,
            book_title: record.book_title,
            counterpart_user_id,
            counterpart_name,
            messages,
            created_at: record.created_at,
        }
    }

    /// Latest message preview for the session list
    pub fn preview(&self) -> Option<&Message> {
        self.messages.iter().max_by(|a, b| a.sort_key().cmp(&b.sort_key()))
    }
}

/// Wire shape of one entry of `GET /api/chats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionRecord {
    #[serde(alias = "id")]
    pub chat_id: EntityId,
    pub book_id: EntityId,
    #[serde(default)]
    pub book_title: String,
    #[serde(default)]
    pub buyer_id: EntityId,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub seller_id: EntityId,
    #[serde(default)]
    pub seller_name: String,
    #[serde(default, deserialize_with = "crate::session::null_as_empty")]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Wire shape of a stored message (history and session previews)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: EntityId,
    #[serde(default)]
    pub chat_id: Option<EntityId>,
    pub sender_id: EntityId,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn into_message(self, origin: MessageOrigin, user: &CurrentUser) -> Message {
        Message {
            is_self: self.sender_id == user.id,
            id: self.id,
            session_id: self.chat_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            content: self.content,
            created_at: self.created_at,
            origin,
            client_ref: None,
        }
    }
}

/// Go marshals a nil slice as `null`.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
