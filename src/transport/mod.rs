//! Transport layer
//!
//! A transport opens links to the server. Each link reports what happens to
//! it as [`LinkEvent`]s on a channel owned by the connection manager, and is
//! driven through the [`TransportHandle`] returned by [`Transport::open`].

pub mod websocket;

use tokio::sync::mpsc;

use crate::error::Result;

pub use websocket::WsTransport;

/// Identifies one opened link; increases with every open
pub type LinkId = u64;

/// Something that happened on a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Link is established
    Opened,
    /// Text frame received
    Text(String),
    /// Runtime error; a `Closed` follows when the link goes down
    Error(String),
    /// Link is gone; always the last event of a link
    Closed,
}

/// A transport event tagged with the link it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub link: LinkId,
    pub event: TransportEvent,
}

/// Sender side of the manager's event channel
pub type EventSender = mpsc::UnboundedSender<LinkEvent>;

/// Opens links to a URL
pub trait Transport {
    type Handle: TransportHandle;

    /// Start opening a link
    ///
    /// Must return without waiting for the handshake. The outcome is
    /// reported later through `events` under `link`. An `Err` means the
    /// open could not even be started and no event will follow.
    fn open(&mut self, url: &str, link: LinkId, events: EventSender) -> Result<Self::Handle>;
}

/// Control side of an open link
pub trait TransportHandle {
    /// Queue a text frame for transmission
    fn send_text(&mut self, text: String) -> Result<()>;

    /// Request closure; completion is reported as `Closed`
    fn close(&mut self);
}
