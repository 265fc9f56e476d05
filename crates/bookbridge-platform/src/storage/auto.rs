//! Auto-detect the best available storage backend.
//!
//! Priority: localStorage → Memory (fallback). The login, cart and chat
//! pages share their keys through localStorage, so memory only helps when
//! it is unavailable (private mode, sandboxed iframes, tests).

use std::rc::Rc;
use bookbridge_core::ports::StoragePort;
use super::{LocalStorage, MemoryStorage};

/// Open the best available storage backend.
/// Returns a trait object so callers are backend-agnostic.
pub fn auto_detect_storage() -> Rc<dyn StoragePort> {
    match LocalStorage::open() {
        Ok(local) => {
            log::info!("Storage backend: localStorage");
            Rc::new(local)
        }
        Err(e) => {
            log::warn!("localStorage unavailable ({}), falling back to memory", e);
            Rc::new(MemoryStorage::new())
        }
    }
}
