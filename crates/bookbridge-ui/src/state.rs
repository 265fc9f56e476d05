//! UI-level state that drives rendering.
//! This is a read-only projection of the chat core, updated each frame by
//! draining the EventBus.

use std::rc::Rc;

use bookbridge_core::assistant::AssistantChat;
use bookbridge_core::reconciler::MessageReconciler;
use bookbridge_types::{
    ChatError, EntityId, Result,
    config::ReconcileMode,
    connection::{ChatSurface, ConnectionState},
    event::ChatEvent,
    message::OutboundMessage,
    session::ChatSession,
    user::CurrentUser,
};

/// Which panel is in front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chats,
    Community,
    Assistant,
}

/// Progress of a REST load the user is waiting on
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    /// Inline message; the panel offers a retry control
    Failed(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Dismissible inline error
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub text: String,
    pub retryable: bool,
    pub requires_login: bool,
}

impl Banner {
    pub fn from_error(error: &ChatError) -> Self {
        Self {
            text: error.user_message(),
            retryable: error.is_retryable(),
            requires_login: error.requires_login(),
        }
    }
}

/// Everything one chat surface renders
pub struct ChatView {
    pub surface: ChatSurface,
    pub connection: ConnectionState,
    pub reconciler: MessageReconciler,
    pub history: LoadState,
    pub banner: Option<Banner>,
    pub reconnect_notice: Option<String>,
    /// Only cleared after a send succeeds
    pub input_text: String,
}

impl ChatView {
    pub fn new(surface: ChatSurface, mode: ReconcileMode) -> Self {
        Self {
            surface,
            connection: ConnectionState::Disconnected,
            reconciler: MessageReconciler::new(mode),
            history: LoadState::Idle,
            banner: None,
            reconnect_notice: None,
            input_text: String::new(),
        }
    }

    pub fn can_send(&self) -> bool {
        self.connection.accepts_sends()
    }

    pub fn show_error(&mut self, error: &ChatError) {
        self.banner = Some(Banner::from_error(error));
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Switch the view to another session; messages start over.
    pub fn switch_session(&mut self, session_id: Option<EntityId>) {
        self.reconciler.reset(session_id);
        self.history = LoadState::Idle;
        self.banner = None;
        self.reconnect_notice = None;
    }

    /// Project the outcome of a send. On success the message is shown
    /// optimistically and the input cleared; on failure the input is left
    /// as typed so the user can retry.
    pub fn apply_send_result(&mut self, result: Result<OutboundMessage>, user: &CurrentUser) -> bool {
        match result {
            Ok(outbound) => {
                self.reconciler.push_optimistic(&outbound, user);
                self.input_text.clear();
                true
            }
            Err(e) => {
                log::warn!("{} send failed: {}", self.surface.label(), e);
                self.show_error(&e);
                false
            }
        }
    }

    fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::StateChanged { state, .. } => {
                self.connection = state;
                if state.accepts_sends() {
                    self.reconnect_notice = None;
                }
            }
            ChatEvent::MessageReceived { message, .. } => {
                self.reconciler.apply_live(message);
            }
            ChatEvent::Error { error, .. } => self.show_error(&error),
            ChatEvent::ReconnectScheduled { attempt, delay_ms, .. } => {
                self.reconnect_notice = Some(format!(
                    "Reconnecting in {}s (attempt {})",
                    delay_ms.div_ceil(1000),
                    attempt
                ));
            }
            ChatEvent::HistoryNotice { count, .. } => {
                log::debug!("{} server history notice: {} messages", self.surface.label(), count);
            }
            ChatEvent::SessionCreated { .. } => {}
        }
    }
}

/// State visible to UI panels
pub struct UiState {
    pub user: Option<CurrentUser>,
    pub tab: Tab,
    pub peer: ChatView,
    pub community: ChatView,
    /// Snapshot of the session store
    pub sessions: Rc<[ChatSession]>,
    pub sessions_load: LoadState,
    pub active_session: Option<EntityId>,
    /// Set when the server created a session; the app refreshes the list
    pub created_session: Option<EntityId>,
    pub assistant: AssistantChat,
    pub assistant_input: String,
    /// Status line text
    pub status_text: String,
}

impl UiState {
    pub fn new(mode: ReconcileMode) -> Self {
        Self {
            user: None,
            tab: Tab::Chats,
            peer: ChatView::new(ChatSurface::Peer, mode),
            community: ChatView::new(ChatSurface::Community, mode),
            sessions: Rc::from(Vec::new()),
            sessions_load: LoadState::Idle,
            active_session: None,
            created_session: None,
            assistant: AssistantChat::new(),
            assistant_input: String::new(),
            status_text: "Ready".to_string(),
        }
    }

    pub fn view(&self, surface: ChatSurface) -> &ChatView {
        match surface {
            ChatSurface::Peer => &self.peer,
            ChatSurface::Community => &self.community,
        }
    }

    pub fn view_mut(&mut self, surface: ChatSurface) -> &mut ChatView {
        match surface {
            ChatSurface::Peer => &mut self.peer,
            ChatSurface::Community => &mut self.community,
        }
    }

    /// Process events from the EventBus and update UI state
    pub fn process_events(&mut self, events: Vec<ChatEvent>) {
        for event in events {
            match &event {
                ChatEvent::SessionCreated { session_id } => {
                    self.active_session = Some(session_id.clone());
                    self.created_session = Some(session_id.clone());
                    self.status_text = "Chat started".to_string();
                    continue;
                }
                ChatEvent::StateChanged { surface, state } => {
                    self.status_text = format!("{}: {}", surface.label(), state.label());
                }
                ChatEvent::Error { error, .. } if error.requires_login() => {
                    self.status_text = "Please log in".to_string();
                }
                _ => {}
            }
            let Some(surface) = event.surface() else {
                continue;
            };
            self.view_mut(surface).apply(event);
        }
    }

    pub fn set_sessions(&mut self, sessions: Rc<[ChatSession]>) {
        self.sessions = sessions;
        self.sessions_load = LoadState::Loaded;
    }

    pub fn active(&self) -> Option<&ChatSession> {
        let id = self.active_session.as_ref()?;
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(ReconcileMode::AppendOnly)
    }
}
