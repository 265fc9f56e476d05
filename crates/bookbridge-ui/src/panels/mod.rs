//! egui panels. Panels never call the core directly; they return an action
//! and the app decides what to do with it.

pub mod chat;
pub mod community;
pub mod assistant;

use bookbridge_types::EntityId;

/// What the user asked for this frame
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    /// Send the peer chat input
    SendPeer(String),
    /// Send the community chat input
    SendCommunity(String),
    SelectSession(EntityId),
    RetrySessions,
    RetryHistory,
    ReconnectPeer,
    ReconnectCommunity,
    AskAssistant(String),
    Login,
}
