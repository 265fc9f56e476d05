//! Queue of `ChatEvent`s between the connection managers and the UI.
//!
//! Socket callbacks and timers run outside egui's frame loop, so they only
//! enqueue here; the app drains the queue at the top of each frame.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bookbridge_types::event::ChatEvent;

/// Clone-cheap handle; every clone feeds the same queue.
#[derive(Clone, Default)]
pub struct EventBus {
    queue: Rc<RefCell<VecDeque<ChatEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ChatEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Everything emitted since the last drain, oldest first.
    pub fn drain(&self) -> Vec<ChatEvent> {
        std::mem::take(&mut *self.queue.borrow_mut()).into()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}
