//! BookBridge chat core.
//!
//! Everything here runs on one logical thread: UI callbacks, socket
//! callbacks and timers interleave but never run in parallel, so shared
//! state is `Rc<RefCell<_>>` and ports are `?Send`.

pub mod ports;
pub mod event_bus;
pub mod endpoint;
pub mod connection;
pub mod session_store;
pub mod reconciler;
pub mod auth;
pub mod cart;
pub mod assistant;

#[cfg(test)]
mod tests;
