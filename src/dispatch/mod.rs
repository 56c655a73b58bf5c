//! Event dispatch
//!
//! Closed set of channel events and the ordered listener table.

mod event;
mod registry;

pub use event::Event;
pub use registry::{listener, Listener, ListenerRegistry};
