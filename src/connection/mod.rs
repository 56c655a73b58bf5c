//! Connection management
//!
//! Connection state machine, reconnect policy and the manager that ties
//! them to a transport and the listener registry.

mod manager;
mod state;

pub use manager::ConnectionManager;
pub use state::{ConnectionState, RetryPolicy};
