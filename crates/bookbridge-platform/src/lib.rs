//! Browser adapters for the bookbridge-core ports.
//!
//! Everything here talks to `web-sys`/`gloo` and only compiles to something
//! useful under wasm32-unknown-unknown; `MemoryStorage` is the exception
//! and is also what tests use.

pub mod transport;
pub mod api;
pub mod clock;
pub mod location;
pub mod storage;

pub use api::RestChatApi;
pub use clock::BrowserClock;
pub use location::{endpoint_from_location, navigate, query_param};
pub use transport::WebSocketTransportFactory;
