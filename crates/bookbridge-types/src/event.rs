use crate::connection::{ChatSurface, ConnectionState};
use crate::error::ChatError;
use crate::id::EntityId;
use crate::message::Message;

/// Events emitted by the chat core.
/// The UI drains these each frame and projects them into view state.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A surface's connection moved to a new state
    StateChanged { surface: ChatSurface, state: ConnectionState },

    /// A message frame arrived on a surface's socket
    MessageReceived { surface: ChatSurface, message: Message },

    /// The server created the pending peer session
    SessionCreated { session_id: EntityId },

    /// The server pushed its own history frame (informational)
    HistoryNotice { surface: ChatSurface, count: usize },

    /// A failure the user should see inline
    Error { surface: ChatSurface, error: ChatError },

    /// An automatic reconnect was scheduled
    ReconnectScheduled { surface: ChatSurface, attempt: u32, delay_ms: u64 },
}

impl ChatEvent {
    pub fn surface(&self) -> Option<ChatSurface> {
        match self {
            ChatEvent::StateChanged { surface, .. }
            | ChatEvent::MessageReceived { surface, .. }
            | ChatEvent::HistoryNotice { surface, .. }
            | ChatEvent::Error { surface, .. }
            | ChatEvent::ReconnectScheduled { surface, .. } => Some(*surface),
            ChatEvent::SessionCreated { .. } => Some(ChatSurface::Peer),
        }
    }
}
