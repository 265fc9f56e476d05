use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::session::ChatSession;

/// Which chat UI a connection belongs to. Each surface owns its own
/// connection; they never share a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatSurface {
    /// Buyer/seller conversation about one book
    Peer,
    /// Site-wide community room
    Community,
}

impl ChatSurface {
    pub fn label(&self) -> &str {
        match self {
            ChatSurface::Peer => "Chat",
            ChatSurface::Community => "Community",
        }
    }
}

/// Lifecycle of one real-time connection.
///
/// `Disconnected → Connecting → Open → {Closing → Disconnected | Failed}`.
/// `Authenticated` is entered after the auth frame goes out on an open
/// socket and accepts sends exactly like `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Authenticated,
    Closing,
    Failed,
}

impl ConnectionState {
    pub fn accepts_sends(&self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Authenticated)
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Authenticated
        )
    }

    pub fn label(&self) -> &str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Open => "Connected",
            ConnectionState::Authenticated => "Connected",
            ConnectionState::Closing => "Closing...",
            ConnectionState::Failed => "Connection lost",
        }
    }
}

/// What a connection should be opened against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// A peer chat: an existing session (non-zero id) or a pending one
    /// identified by book and counterpart. Book and counterpart are
    /// optional here so that incomplete targets can be rejected before any
    /// transport exists.
    Peer {
        session_id: EntityId,
        book_id: Option<EntityId>,
        counterpart_id: Option<EntityId>,
    },
    Community,
}

impl ConnectTarget {
    pub fn session(session: &ChatSession) -> Self {
        ConnectTarget::Peer {
            session_id: session.id.clone(),
            book_id: Some(session.book_id.clone()),
            counterpart_id: Some(session.counterpart_user_id.clone()),
        }
    }

    pub fn pending(book_id: impl Into<EntityId>, counterpart_id: impl Into<EntityId>) -> Self {
        ConnectTarget::Peer {
            session_id: EntityId::from(0u64),
            book_id: Some(book_id.into()),
            counterpart_id: Some(counterpart_id.into()),
        }
    }

    pub fn surface(&self) -> ChatSurface {
        match self {
            ConnectTarget::Peer { .. } => ChatSurface::Peer,
            ConnectTarget::Community => ChatSurface::Community,
        }
    }

    pub fn session_id(&self) -> Option<&EntityId> {
        match self {
            ConnectTarget::Peer { session_id, .. } if !session_id.is_pending() => Some(session_id),
            _ => None,
        }
    }
}
