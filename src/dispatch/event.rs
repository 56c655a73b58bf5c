//! Channel event kinds

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Events a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Every successfully parsed inbound message, unmodified
    Message,
    /// Connection opened
    Connect,
    /// Connection closed
    Disconnect,
    /// Transport-level runtime error
    Error,
    /// Recent history records
    History,
    /// A processing job started (also raised for screenshot notices)
    ProcessStart,
    /// A processing job finished
    ProcessComplete,
    /// A processing job failed
    ProcessError,
    /// Text recognition finished for a job
    OcrComplete,
}

impl Event {
    /// Number of event kinds
    pub const COUNT: usize = 9;

    /// All event kinds in table order
    pub const ALL: [Event; Event::COUNT] = [
        Event::Message,
        Event::Connect,
        Event::Disconnect,
        Event::Error,
        Event::History,
        Event::ProcessStart,
        Event::ProcessComplete,
        Event::ProcessError,
        Event::OcrComplete,
    ];

    /// Registration name
    pub fn name(self) -> &'static str {
        match self {
            Event::Message => "message",
            Event::Connect => "connect",
            Event::Disconnect => "disconnect",
            Event::Error => "error",
            Event::History => "history",
            Event::ProcessStart => "processStart",
            Event::ProcessComplete => "processComplete",
            Event::ProcessError => "processError",
            Event::OcrComplete => "ocrComplete",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Event {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .iter()
            .copied()
            .find(|event| event.name() == s)
            .ok_or_else(|| Error::UnknownEvent(s.to_string()))
    }
}
