//! Channel counters
//!
//! Owned by a single connection manager and updated from its task, so
//! plain integers suffice.

use serde::Serialize;

/// Counters for one connection manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    // Connection churn
    pub connects: u64,
    pub closes: u64,
    pub open_failures: u64,
    pub reconnects_scheduled: u64,

    // Inbound traffic
    pub frames_received: u64,
    pub parse_failures: u64,
    pub transport_errors: u64,
    pub listener_failures: u64,

    // Outbound traffic
    pub frames_sent: u64,
    pub sends_rejected: u64,
}

impl ChannelStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn connected(&mut self) {
        self.connects += 1;
    }

    #[inline]
    pub fn closed(&mut self) {
        self.closes += 1;
    }

    #[inline]
    pub fn open_failed(&mut self) {
        self.open_failures += 1;
    }

    #[inline]
    pub fn reconnect_scheduled(&mut self) {
        self.reconnects_scheduled += 1;
    }

    #[inline]
    pub fn frame_received(&mut self) {
        self.frames_received += 1;
    }

    #[inline]
    pub fn parse_failed(&mut self) {
        self.parse_failures += 1;
    }

    #[inline]
    pub fn transport_error(&mut self) {
        self.transport_errors += 1;
    }

    #[inline]
    pub fn listeners_failed(&mut self, count: u64) {
        self.listener_failures += count;
    }

    #[inline]
    pub fn frame_sent(&mut self) {
        self.frames_sent += 1;
    }

    #[inline]
    pub fn send_rejected(&mut self) {
        self.sends_rejected += 1;
    }

    /// Render the counters as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
