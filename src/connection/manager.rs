//! Connection manager
//!
//! Owns the link to the notification server, runs the reconnect policy and
//! dispatches inbound messages to listeners.
//!
//! The manager is driven from a single task. Transport activity reaches it
//! only as tagged events on its channel, which [`ConnectionManager::turn`]
//! drains one at a time together with the pending reconnect deadline, so
//! state is never touched concurrently.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::state::{ConnectionState, RetryPolicy};
use crate::config::{validate_url, Config};
use crate::dispatch::{Event, Listener, ListenerRegistry};
use crate::error::Result;
use crate::metrics::ChannelStats;
use crate::protocol::{self, Outgoing};
use crate::transport::{
    EventSender, LinkEvent, LinkId, Transport, TransportEvent, TransportHandle, WsTransport,
};

/// Resilient connection to the notification server
pub struct ConnectionManager<T: Transport = WsTransport> {
    url: String,
    transport: T,
    /// Handle of the current link, if one is open or opening
    link: Option<T::Handle>,
    /// Id of the most recently opened link
    link_id: LinkId,
    state: ConnectionState,
    policy: RetryPolicy,
    /// Whether `disconnect()` leaves automatic reconnects enabled
    retry_after_disconnect: bool,
    /// Set by `shutdown()`, cleared by a manual `connect()`
    retries_suspended: bool,
    /// Close of the current link has been requested but not reported yet
    closing: bool,
    /// A manual `connect()` arrived while the link was closing
    reopen_on_close: bool,
    /// Deadline of the single scheduled reconnect
    pending_retry: Option<Instant>,
    listeners: ListenerRegistry,
    stats: ChannelStats,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
}

enum Wake {
    Link(Option<LinkEvent>),
    Retry,
}

impl ConnectionManager<WsTransport> {
    /// Create a manager for `url` using the WebSocket transport
    pub fn new(url: &str, policy: RetryPolicy) -> Result<Self> {
        Self::with_transport(url, policy, WsTransport::new())
    }

    /// Create a manager from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut manager = Self::new(&config.server.endpoint(), config.reconnect.policy())?;
        manager.set_retry_after_disconnect(config.reconnect.retry_after_disconnect);
        Ok(manager)
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager for `url` using a custom transport
    pub fn with_transport(url: &str, policy: RetryPolicy, transport: T) -> Result<Self> {
        let url = validate_url(url)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            url: url.to_string(),
            transport,
            link: None,
            link_id: 0,
            state: ConnectionState::Disconnected,
            policy,
            retry_after_disconnect: true,
            retries_suspended: false,
            closing: false,
            reopen_on_close: false,
            pending_retry: None,
            listeners: ListenerRegistry::new(),
            stats: ChannelStats::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Deadline of the scheduled reconnect, if any
    pub fn pending_retry(&self) -> Option<Instant> {
        self.pending_retry
    }

    /// Check if a link handle is held (open, opening or closing)
    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    /// Number of listeners registered for `event`
    pub fn listener_count(&self, event: Event) -> usize {
        self.listeners.len(event)
    }

    /// Replace the reconnect policy, discarding used attempts
    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Choose whether a close requested via [`disconnect`](Self::disconnect)
    /// is retried like an unexpected one (the default)
    pub fn set_retry_after_disconnect(&mut self, enabled: bool) {
        self.retry_after_disconnect = enabled;
    }

    /// Register a listener
    pub fn on(&mut self, event: Event, listener: Listener) -> &mut Self {
        self.listeners.add(event, listener);
        self
    }

    /// Register a listener by event name; unknown names are ignored
    pub fn on_named(&mut self, name: &str, listener: Listener) -> &mut Self {
        match name.parse::<Event>() {
            Ok(event) => self.on(event, listener),
            Err(e) => {
                warn!(error = %e, "Ignoring listener registration");
                self
            }
        }
    }

    /// Unregister every registration of `listener` for `event`
    pub fn off(&mut self, event: Event, listener: &Listener) -> &mut Self {
        let removed = self.listeners.remove(event, listener);
        debug!(event = %event, removed, "Listener removed");
        self
    }

    /// Open a link unless one is already opening or open
    ///
    /// Lifts a suspension set by [`shutdown`](Self::shutdown), cancels any
    /// scheduled reconnect and, from `Failed`, restores the full attempt
    /// budget. Called while the current link is closing, the new link is
    /// opened as soon as the close is reported.
    pub fn connect(&mut self) {
        if self.state.is_active() {
            if self.closing {
                debug!(state = %self.state, "Link closing, reconnecting once closed");
                self.retries_suspended = false;
                self.pending_retry = None;
                self.reopen_on_close = true;
            } else {
                debug!(state = %self.state, "Connect ignored, link already active");
            }
            return;
        }

        if self.state == ConnectionState::Failed {
            self.policy.reset();
        }
        self.retries_suspended = false;
        self.pending_retry = None;

        self.open_link();
    }

    /// Request closure of the current link
    ///
    /// The close is reported like any other, so unless disabled with
    /// [`set_retry_after_disconnect`](Self::set_retry_after_disconnect) it
    /// schedules a reconnect.
    pub fn disconnect(&mut self) {
        if !self.retry_after_disconnect {
            self.suspend_retries();
        }
        self.close_link();
    }

    /// Close the current link and stop reconnecting until the next
    /// manual [`connect`](Self::connect)
    pub fn shutdown(&mut self) {
        self.suspend_retries();
        self.close_link();
    }

    /// Send a text frame or a JSON value
    ///
    /// Returns `false` when not connected or when the frame could not be
    /// handed to the transport.
    pub fn send(&mut self, data: impl Into<Outgoing>) -> bool {
        if !self.ensure_connected() {
            return false;
        }

        match data.into().into_text() {
            Ok(text) => self.transmit(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                self.stats.send_rejected();
                false
            }
        }
    }

    /// Serialize `value` to JSON and send it
    pub fn send_json<S: Serialize + ?Sized>(&mut self, value: &S) -> bool {
        if !self.ensure_connected() {
            return false;
        }

        match serde_json::to_string(value) {
            Ok(text) => self.transmit(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound message");
                self.stats.send_rejected();
                false
            }
        }
    }

    /// Wait for the next transport event or reconnect deadline and process it
    ///
    /// Cancel-safe: dropping the future before it completes loses nothing.
    pub async fn turn(&mut self) {
        let deadline = self.pending_retry;

        let wake = tokio::select! {
            event = self.events_rx.recv() => Wake::Link(event),
            _ = retry_timer(deadline) => Wake::Retry,
        };

        match wake {
            Wake::Link(Some(event)) => self.process_link_event(event),
            // The manager holds a sender, so the channel never closes
            Wake::Link(None) => {}
            Wake::Retry => self.fire_retry(),
        }
    }

    fn ensure_connected(&mut self) -> bool {
        if self.state.is_connected() {
            return true;
        }
        warn!(state = %self.state, "Not connected, cannot send message");
        self.stats.send_rejected();
        false
    }

    fn transmit(&mut self, text: String) -> bool {
        let Some(link) = self.link.as_mut() else {
            warn!("No link available for sending");
            self.stats.send_rejected();
            return false;
        };

        match link.send_text(text) {
            Ok(()) => {
                self.stats.frame_sent();
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to send message");
                self.stats.send_rejected();
                false
            }
        }
    }

    fn open_link(&mut self) {
        self.link_id += 1;
        self.closing = false;
        self.reopen_on_close = false;
        self.state = ConnectionState::Connecting;
        info!(url = %self.url, link = self.link_id, "Connecting");

        match self
            .transport
            .open(&self.url, self.link_id, self.events_tx.clone())
        {
            Ok(handle) => self.link = Some(handle),
            Err(e) => {
                error!(error = %e, "Failed to start connection");
                self.link = None;
                self.state = ConnectionState::Disconnected;
                self.stats.open_failed();
                self.schedule_reconnect();
            }
        }
    }

    fn close_link(&mut self) {
        match self.link.as_mut() {
            Some(link) => {
                info!(link = self.link_id, "Closing connection");
                self.closing = true;
                self.reopen_on_close = false;
                link.close();
            }
            None => debug!("No link to close"),
        }
    }

    fn suspend_retries(&mut self) {
        self.retries_suspended = true;
        if self.pending_retry.take().is_some() {
            debug!("Cancelled scheduled reconnect");
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.retries_suspended {
            debug!("Automatic reconnect suspended");
            return;
        }

        match self.policy.next_attempt() {
            Some(attempt) => {
                let delay = self.policy.interval();
                self.pending_retry = Some(Instant::now() + delay);
                self.stats.reconnect_scheduled();
                info!(
                    attempt,
                    max_attempts = self.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
            }
            None => {
                self.pending_retry = None;
                self.state = ConnectionState::Failed;
                error!(
                    max_attempts = self.policy.max_attempts(),
                    "Reached maximum reconnect attempts, giving up"
                );
            }
        }
    }

    fn fire_retry(&mut self) {
        self.pending_retry = None;

        if self.state.is_active() || self.retries_suspended {
            debug!(state = %self.state, "Dropping stale reconnect");
            return;
        }

        debug!(attempt = self.policy.attempts_used(), "Reconnect timer fired");
        self.open_link();
    }

    fn process_link_event(&mut self, LinkEvent { link, event }: LinkEvent) {
        if link != self.link_id || self.link.is_none() {
            debug!(link, current = self.link_id, "Ignoring event from stale link");
            return;
        }

        match event {
            TransportEvent::Opened => self.handle_open(),
            TransportEvent::Text(text) => self.handle_text(&text),
            TransportEvent::Error(reason) => self.handle_error(reason),
            TransportEvent::Closed => self.handle_close(),
        }
    }

    fn handle_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.policy.reset();
        self.pending_retry = None;
        self.stats.connected();
        info!(url = %self.url, "Connection established");

        self.dispatch(Event::Connect, &Value::Null);
    }

    fn handle_text(&mut self, text: &str) {
        self.stats.frame_received();

        let frame = match protocol::parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Failed to parse inbound message");
                self.stats.parse_failed();
                return;
            }
        };

        self.dispatch(Event::Message, &frame);

        if let Some((event, payload)) = protocol::route(&frame) {
            debug!(event = %event, "Dispatching notification");
            self.dispatch(event, &payload);
        }
    }

    fn handle_error(&mut self, reason: String) {
        warn!(error = %reason, "Transport error");
        self.stats.transport_error();
        self.dispatch(Event::Error, &Value::String(reason));
    }

    fn handle_close(&mut self) {
        self.link = None;
        self.state = ConnectionState::Disconnected;
        self.closing = false;
        self.stats.closed();
        info!(link = self.link_id, "Connection closed");

        self.dispatch(Event::Disconnect, &Value::Null);

        if std::mem::take(&mut self.reopen_on_close) {
            self.pending_retry = None;
            self.open_link();
        } else {
            self.schedule_reconnect();
        }
    }

    fn dispatch(&mut self, event: Event, payload: &Value) {
        let failures = self.listeners.dispatch(event, payload);
        if failures > 0 {
            self.stats.listeners_failed(failures);
        }
    }
}

async fn retry_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
