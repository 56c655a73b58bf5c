//! Connection state and retry policy

use std::fmt;
use std::time::Duration;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link; a reconnect may be pending
    Disconnected,
    /// A link is being opened
    Connecting,
    /// The link is open
    Connected,
    /// Retries exhausted; only a manual connect resumes
    Failed,
}

impl ConnectionState {
    /// Check if a link is being opened or is open
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    /// Check if the link is open
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Fixed-delay, attempt-bounded reconnect policy
///
/// `attempts_used` never exceeds `max_attempts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
    attempts_used: u32,
}

impl RetryPolicy {
    /// Create a policy; a zero interval is raised to one millisecond
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval: interval.max(Duration::from_millis(1)),
            attempts_used: 0,
        }
    }

    /// Claim the next attempt, returning its 1-based number
    ///
    /// Returns `None` once every attempt is used.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.attempts_used < self.max_attempts {
            self.attempts_used += 1;
            Some(self.attempts_used)
        } else {
            None
        }
    }

    /// Forget used attempts
    pub fn reset(&mut self) {
        self.attempts_used = 0;
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(3000))
    }
}
