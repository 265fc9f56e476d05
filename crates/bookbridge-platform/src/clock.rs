//! Wall clock and `setTimeout`-backed timers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use gloo_timers::callback::Timeout;

use bookbridge_core::ports::{ClockPort, TimerHandle};

pub struct BrowserClock {
    next_id: Cell<u64>,
    timers: Rc<RefCell<HashMap<u64, Timeout>>>,
}

impl BrowserClock {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            timers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Default for BrowserClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for BrowserClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let timers = self.timers.clone();
        let millis = u32::try_from(delay_ms).unwrap_or(u32::MAX);
        let timeout = Timeout::new(millis, move || {
            // Already fired: forget instead of dropping so nothing is cleared
            // from inside its own callback.
            if let Some(fired) = timers.borrow_mut().remove(&id) {
                let _ = fired.forget();
            }
            callback();
        });
        self.timers.borrow_mut().insert(id, timeout);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        // Dropping a gloo Timeout clears it.
        self.timers.borrow_mut().remove(&handle.0);
    }
}
