//! WebSocket transport using tokio-tungstenite
//!
//! Each link runs in its own task: it performs the handshake, forwards
//! inbound frames as [`TransportEvent`]s and drains a command queue for
//! outbound frames and close requests.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use super::{EventSender, LinkEvent, LinkId, Transport, TransportEvent, TransportHandle};
use crate::error::{Error, Result};

/// Transport opening WebSocket links on the current tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

enum Command {
    Text(String),
    Close,
}

/// Handle to a running WebSocket link
///
/// Dropping the handle closes the link.
pub struct WsHandle {
    link: LinkId,
    commands: mpsc::UnboundedSender<Command>,
}

impl Transport for WsTransport {
    type Handle = WsHandle;

    fn open(&mut self, url: &str, link: LinkId, events: EventSender) -> Result<WsHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Transport(format!("no async runtime available: {}", e)))?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_link(url.to_string(), link, events, command_rx));

        Ok(WsHandle { link, commands })
    }
}

impl TransportHandle for WsHandle {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.commands
            .send(Command::Text(text))
            .map_err(|_| Error::Transport(format!("link {} is no longer running", self.link)))
    }

    fn close(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

async fn run_link(
    url: String,
    link: LinkId,
    events: EventSender,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(LinkEvent { link, event });
    };

    let handshake = connect_async(url.as_str());
    tokio::pin!(handshake);

    // A close requested mid-handshake abandons the attempt
    let stream = loop {
        tokio::select! {
            result = &mut handshake => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    debug!(link, error = %e, "WebSocket handshake failed");
                    emit(TransportEvent::Error(e.to_string()));
                    emit(TransportEvent::Closed);
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Text(text)) => {
                    debug!(link, len = text.len(), "Dropping frame queued before open");
                    continue;
                }
                Some(Command::Close) | None => {
                    debug!(link, "Close requested during handshake");
                    emit(TransportEvent::Closed);
                    return;
                }
            },
        }
    };

    emit(TransportEvent::Opened);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(link, ?frame, "Received close frame");
                    break;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(link, len = data.len(), "Ignoring binary frame");
                }
                // Ping/pong is answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emit(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },
            command = commands.recv() => match command {
                Some(Command::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        emit(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(link, error = %e, "Failed to send close frame");
                    }
                    break;
                }
            },
        }
    }

    emit(TransportEvent::Closed);
}
