//! Scripted in-memory transport shared by the integration tests

#![allow(dead_code)]

use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

use notify_channel::transport::{
    EventSender, LinkEvent, LinkId, Transport, TransportEvent, TransportHandle,
};
use notify_channel::{listener, ConnectionManager, Error, Listener, Result, RetryPolicy};

pub const URL: &str = "ws://notify.test/ws";

#[derive(Default)]
struct Script {
    opens: Vec<Instant>,
    links: Vec<(LinkId, EventSender)>,
    sent: Vec<String>,
    close_requests: usize,
    refuse_opens: bool,
    reject_sends: bool,
}

/// Transport whose links are driven by the test
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following open fail synchronously
    pub fn refuse_opens(&self, refuse: bool) {
        self.script.borrow_mut().refuse_opens = refuse;
    }

    /// Make every following send fail at the transport
    pub fn reject_sends(&self, reject: bool) {
        self.script.borrow_mut().reject_sends = reject;
    }

    /// Report `event` on the most recently opened link
    pub fn emit(&self, event: TransportEvent) {
        let script = self.script.borrow();
        let (link, events) = script.links.last().expect("no link opened yet");
        events
            .send(LinkEvent { link: *link, event })
            .expect("manager dropped");
    }

    /// Report `event` on the `index`-th opened link
    pub fn emit_on(&self, index: usize, event: TransportEvent) {
        let script = self.script.borrow();
        let (link, events) = &script.links[index];
        events
            .send(LinkEvent { link: *link, event })
            .expect("manager dropped");
    }

    pub fn emit_text(&self, text: &str) {
        self.emit(TransportEvent::Text(text.to_string()));
    }

    /// Number of open attempts, including refused ones
    pub fn open_count(&self) -> usize {
        self.script.borrow().opens.len()
    }

    /// Time of each open attempt
    pub fn opened_at(&self) -> Vec<Instant> {
        self.script.borrow().opens.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.script.borrow().sent.clone()
    }

    pub fn close_requests(&self) -> usize {
        self.script.borrow().close_requests
    }
}

pub struct ScriptedHandle {
    link: LinkId,
    events: EventSender,
    script: Rc<RefCell<Script>>,
}

impl Transport for ScriptedTransport {
    type Handle = ScriptedHandle;

    fn open(&mut self, _url: &str, link: LinkId, events: EventSender) -> Result<ScriptedHandle> {
        let mut script = self.script.borrow_mut();
        script.opens.push(Instant::now());

        if script.refuse_opens {
            return Err(Error::Transport("connection refused".to_string()));
        }

        script.links.push((link, events.clone()));
        Ok(ScriptedHandle {
            link,
            events,
            script: self.script.clone(),
        })
    }
}

impl TransportHandle for ScriptedHandle {
    fn send_text(&mut self, text: String) -> Result<()> {
        let mut script = self.script.borrow_mut();
        if script.reject_sends {
            return Err(Error::Transport("send buffer closed".to_string()));
        }
        script.sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.script.borrow_mut().close_requests += 1;
        let _ = self.events.send(LinkEvent {
            link: self.link,
            event: TransportEvent::Closed,
        });
    }
}

/// Manager over a scripted transport sharing state with `transport`
pub fn manager(
    transport: &ScriptedTransport,
    max_attempts: u32,
    interval: Duration,
) -> ConnectionManager<ScriptedTransport> {
    ConnectionManager::with_transport(
        URL,
        RetryPolicy::new(max_attempts, interval),
        transport.clone(),
    )
    .expect("valid url")
}

/// Listener recording every payload it receives
pub fn recorder() -> (Listener, Rc<RefCell<Vec<Value>>>) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let listener = listener(move |payload| {
        sink.borrow_mut().push(payload.clone());
        Ok(())
    });
    (listener, calls)
}
