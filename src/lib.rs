//! Notify Channel - real-time notification client
//!
//! Keeps a WebSocket connection to a notification server alive, retries
//! with a fixed-delay bounded policy, and dispatches inbound messages to
//! typed in-process listeners.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod transport;
pub mod util;

pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState, RetryPolicy};
pub use dispatch::{listener, Event, Listener};
pub use error::{Error, Result};
pub use protocol::Outgoing;

/// Client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
