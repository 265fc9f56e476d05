//! Message reconciler: merges REST history with the live socket stream.
//!
//! History seeds the view once. Live messages are appended in arrival order.
//! Locally sent messages are shown immediately as optimistic entries.
//!
//! In `AppendOnly` mode nothing is ever matched up: a server echo of an
//! optimistic message shows up as a second entry. `Correlated` mode
//! replaces the optimistic entry with its echo and drops live messages
//! whose server id is already displayed.

use std::collections::HashSet;

use bookbridge_types::{
    EntityId,
    config::ReconcileMode,
    message::{Message, MessageOrigin, OutboundMessage},
    session::MessageRecord,
    user::CurrentUser,
};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct MessageReconciler {
    mode: ReconcileMode,
    session_id: Option<EntityId>,
    messages: Vec<Message>,
    seeded: bool,
    local_seq: u64,
}

impl MessageReconciler {
    pub fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            session_id: None,
            messages: Vec::new(),
            seeded: false,
            local_seq: 0,
        }
    }

    pub fn for_session(mode: ReconcileMode, session_id: EntityId) -> Self {
        let mut reconciler = Self::new(mode);
        reconciler.session_id = Some(session_id);
        reconciler
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    pub fn session_id(&self) -> Option<&EntityId> {
        self.session_id.as_ref()
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Start over for another session (or none)
    pub fn reset(&mut self, session_id: Option<EntityId>) {
        self.session_id = session_id;
        self.messages.clear();
        self.seeded = false;
    }

    /// Seed from a `GET /api/chats/{id}` body. Accepts a bare array or an
    /// object with a `messages` array; anything else seeds nothing. Only
    /// the first call per session has an effect.
    ///
    /// Live or optimistic messages that arrived before the history stay
    /// after it.
    pub fn seed_history(&mut self, value: Value, user: &CurrentUser) -> usize {
        if self.seeded {
            log::debug!("History already loaded, ignoring second seed");
            return 0;
        }
        self.seeded = true;

        let records = match value {
            Value::Array(records) => records,
            Value::Object(mut object) => match object.remove("messages") {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let mut history: Vec<Message> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<MessageRecord>(record) {
                Ok(record) => Some(record.into_message(MessageOrigin::History, user)),
                Err(e) => {
                    log::warn!("Skipping unreadable history message: {}", e);
                    None
                }
            })
            .collect();
        history.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        // One entry per id, the earliest wins.
        let mut seen = HashSet::new();
        history.retain(|message| seen.insert(message.id.clone()));

        let count = history.len();
        let live = std::mem::take(&mut self.messages);
        self.messages = history;
        for message in live {
            self.insert_live(message);
        }
        count
    }

    /// Show a just-sent message before the server has seen it.
    pub fn push_optimistic(&mut self, outbound: &OutboundMessage, user: &CurrentUser) -> &Message {
        self.local_seq += 1;
        let message = Message {
            id: EntityId::new(format!(
                "local-{}-{}",
                outbound.sent_at.timestamp_millis(),
                self.local_seq
            )),
            session_id: outbound.session_id.clone(),
            sender_id: user.id.clone(),
            sender_name: user.username.clone(),
            content: outbound.content.clone(),
            created_at: outbound.sent_at,
            is_self: true,
            origin: MessageOrigin::Optimistic,
            client_ref: Some(outbound.client_ref.clone()),
        };
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Apply a socket message. Returns whether the displayed list changed.
    pub fn apply_live(&mut self, message: Message) -> bool {
        self.insert_live(message)
    }

    fn insert_live(&mut self, message: Message) -> bool {
        if self.mode == ReconcileMode::AppendOnly || message.is_optimistic() {
            self.messages.push(message);
            return true;
        }

        if message.id.is_numeric() && self.messages.iter().any(|m| m.id == message.id) {
            log::debug!("Dropping duplicate message {}", message.id);
            return false;
        }

        if let Some(index) = self.matching_optimistic(&message) {
            self.messages[index] = message;
            return true;
        }

        self.messages.push(message);
        true
    }

    /// The optimistic entry a live self-message confirms: same `client_ref`
    /// when the server echoes it, otherwise the oldest pending entry with
    /// the same content.
    fn matching_optimistic(&self, message: &Message) -> Option<usize> {
        if let Some(client_ref) = &message.client_ref {
            if let Some(index) = self
                .messages
                .iter()
                .position(|m| m.is_optimistic() && m.client_ref.as_ref() == Some(client_ref))
            {
                return Some(index);
            }
        }
        if !message.is_self {
            return None;
        }
        self.messages
            .iter()
            .position(|m| m.is_optimistic() && m.content == message.content)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Optimistic entries not (yet) replaced by a server copy
    pub fn pending_optimistic(&self) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.is_optimistic()).collect()
    }

    /// Optimistic entries that are displayed next to a live self-sent copy
    /// with the same content.
    pub fn duplicate_candidates(&self) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.is_optimistic())
            .filter(|optimistic| {
                self.messages.iter().any(|m| {
                    m.origin == MessageOrigin::Live && m.is_self && m.content == optimistic.content
                })
            })
            .collect()
    }
}

impl Default for MessageReconciler {
    fn default() -> Self {
        Self::new(ReconcileMode::AppendOnly)
    }
}
