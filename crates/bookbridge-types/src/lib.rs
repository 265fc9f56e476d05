pub mod id;
pub mod user;
pub mod message;
pub mod session;
pub mod connection;
pub mod frame;
pub mod event;
pub mod catalog;
pub mod config;
pub mod error;


pub use error::ChatError;
pub use id::EntityId;
pub type Result<T> = std::result::Result<T, ChatError>;
