//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `bookbridge-core` (pure Rust).
//! Implementations live in `bookbridge-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::rc::Rc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use bookbridge_types::{
    EntityId, Result,
    catalog::{BookSummary, ChatbotReply},
};

// ─── Transport Port ──────────────────────────────────────────

/// Something that happened on a socket
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Text(String),
    Error(String),
    Closed { code: u16, was_clean: bool },
}

/// Callback the transport invokes for every socket event, in arrival order.
pub type TransportSink = Rc<dyn Fn(TransportEvent)>;

/// One live socket
pub trait Transport {
    fn send_text(&self, text: &str) -> Result<()>;

    /// Begin closing. Events arriving afterwards may still reach the sink.
    fn close(&self);
}

/// Opens sockets
pub trait TransportPort {
    /// Start connecting. Returns immediately; progress arrives via `sink`.
    fn connect(&self, url: &str, sink: TransportSink) -> Result<Box<dyn Transport>>;
}

// ─── Clock Port ──────────────────────────────────────────────

/// Handle to a scheduled callback, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub trait ClockPort {
    fn now(&self) -> DateTime<Utc>;

    /// Run `callback` once after `delay_ms`.
    fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerHandle;

    /// Cancel a pending callback. Unknown or already-fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

// ─── Chat API Port ───────────────────────────────────────────

/// The REST endpoints the chat surfaces consume.
///
/// Chat listings and histories come back as raw JSON so the store and the
/// reconciler decide how to treat malformed payloads.
#[async_trait(?Send)]
pub trait ChatApiPort {
    /// `GET /api/chats`
    async fn list_chats(&self) -> Result<Value>;

    /// `GET /api/chats/{id}`
    async fn chat_history(&self, chat_id: &EntityId) -> Result<Value>;

    /// `GET /api/books/{id}`
    async fn book(&self, book_id: &EntityId) -> Result<BookSummary>;

    /// `GET /api/books`
    async fn books(&self) -> Result<Vec<BookSummary>>;

    /// `POST /api/chatbot`: works with or without a token
    async fn chatbot(&self, query: &str) -> Result<ChatbotReply>;
}

// ─── Storage Port ────────────────────────────────────────────

#[async_trait(?Send)]
pub trait StoragePort {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys with a given prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}
