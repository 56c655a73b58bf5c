//! Listener registry
//!
//! One ordered listener list per [`Event`]. Dispatch runs listeners in
//! registration order and isolates each call, so a failing listener is
//! logged and skipped without affecting the rest.

use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::error;

use super::event::Event;

/// Shared reference to a listener callback
///
/// Removal compares references, so keep a clone of the `Rc` to
/// unregister later.
pub type Listener = Rc<dyn Fn(&Value) -> anyhow::Result<()>>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Value) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// Fixed table of listener lists indexed by event
pub struct ListenerRegistry {
    slots: [Vec<Listener>; Event::COUNT],
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Append a listener; duplicates are kept
    pub fn add(&mut self, event: Event, listener: Listener) {
        self.slots[event.index()].push(listener);
    }

    /// Remove every registration of `listener` for `event`
    ///
    /// Returns the number of registrations removed.
    pub fn remove(&mut self, event: Event, listener: &Listener) -> usize {
        let slot = &mut self.slots[event.index()];
        let before = slot.len();
        slot.retain(|registered| !Rc::ptr_eq(registered, listener));
        before - slot.len()
    }

    /// Number of listeners registered for `event`
    pub fn len(&self, event: Event) -> usize {
        self.slots[event.index()].len()
    }

    /// Invoke every listener for `event` with `payload`
    ///
    /// Returns how many listeners failed.
    pub fn dispatch(&self, event: Event, payload: &Value) -> u64 {
        let mut failures = 0;

        for listener in &self.slots[event.index()] {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(event = %event, error = %e, "Listener failed");
                }
                Err(panic) => {
                    failures += 1;
                    error!(
                        event = %event,
                        reason = panic_message(&*panic),
                        "Listener panicked"
                    );
                }
            }
        }

        failures
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
