//! Session store: the cached list of chat sessions and the active one.
//!
//! The list is only ever replaced wholesale, so a snapshot handed out by
//! `sessions()` stays valid while the store refreshes underneath it.

use std::cell::RefCell;
use std::rc::Rc;

use bookbridge_types::{
    EntityId, Result,
    session::{ChatSession, ChatSessionRecord},
    user::CurrentUser,
};
use serde_json::Value;

use crate::ports::ChatApiPort;

#[derive(Clone)]
pub struct SessionStore {
    inner: Rc<RefCell<Inner>>,
}

struct Inner {
    user: CurrentUser,
    sessions: Rc<[ChatSession]>,
    active: Option<EntityId>,
}

impl SessionStore {
    pub fn new(user: CurrentUser) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                user,
                sessions: Rc::from(Vec::new()),
                active: None,
            })),
        }
    }

    pub fn user(&self) -> CurrentUser {
        self.inner.borrow().user.clone()
    }

    /// Fetch `GET /api/chats` and replace the cached list.
    ///
    /// Transport and HTTP failures propagate; a malformed body does not.
    pub async fn refresh(&self, api: &dyn ChatApiPort) -> Result<usize> {
        let value = api.list_chats().await?;
        Ok(self.replace_from_value(value))
    }

    /// Replace the cached list from a raw listing. Anything that is not an
    /// array becomes an empty list; unreadable records are skipped.
    pub fn replace_from_value(&self, value: Value) -> usize {
        let user = self.user();
        let records = match value {
            Value::Array(records) => records,
            Value::Null => Vec::new(),
            other => {
                log::warn!("Chat list is not an array ({}), showing none", type_name(&other));
                Vec::new()
            }
        };

        let sessions: Vec<ChatSession> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<ChatSessionRecord>(record) {
                Ok(record) => Some(ChatSession::from_record(record, &user)),
                Err(e) => {
                    log::warn!("Skipping unreadable chat record: {}", e);
                    None
                }
            })
            .collect();

        let count = sessions.len();
        self.inner.borrow_mut().sessions = Rc::from(sessions);
        log::info!("Loaded {} chat sessions", count);
        count
    }

    /// Snapshot of the cached list
    pub fn sessions(&self) -> Rc<[ChatSession]> {
        self.inner.borrow().sessions.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &EntityId) -> Option<ChatSession> {
        self.inner
            .borrow()
            .sessions
            .iter()
            .find(|s| &s.id == id)
            .cloned()
    }

    /// First session about `book_id` with `counterpart_id`. Ids compare in
    /// normalized form, so `5` and `"5"` are the same id.
    pub fn find_by_book_and_counterpart(
        &self,
        book_id: impl Into<EntityId>,
        counterpart_id: impl Into<EntityId>,
    ) -> Option<ChatSession> {
        let book_id = book_id.into();
        let counterpart_id = counterpart_id.into();
        self.inner
            .borrow()
            .sessions
            .iter()
            .find(|s| s.book_id == book_id && s.counterpart_user_id == counterpart_id)
            .cloned()
    }

    /// The server created `session_id`: refresh so it shows up, then make it
    /// the active session. Returns it when the refreshed list contains it.
    pub async fn upsert_from_server_event(
        &self,
        session_id: &EntityId,
        api: &dyn ChatApiPort,
    ) -> Result<Option<ChatSession>> {
        self.refresh(api).await?;
        let session = self.get(session_id);
        match &session {
            Some(_) => self.set_active(Some(session_id.clone())),
            None => log::warn!("Created chat {} missing from refreshed list", session_id),
        }
        Ok(session)
    }

    pub fn set_active(&self, id: Option<EntityId>) {
        self.inner.borrow_mut().active = id;
    }

    pub fn clear_active(&self) {
        self.set_active(None);
    }

    pub fn active(&self) -> Option<EntityId> {
        self.inner.borrow().active.clone()
    }

    pub fn active_session(&self) -> Option<ChatSession> {
        let id = self.active()?;
        self.get(&id)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
