//! Inbound dispatch and outbound send integration tests

mod support;

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use notify_channel::protocol::{SCREENSHOT_ID_PREFIX, SCREENSHOT_STATUS};
use notify_channel::transport::TransportEvent;
use notify_channel::{listener, ConnectionManager, ConnectionState, Event};
use support::{manager, recorder, ScriptedTransport};

const SPECIALIZED: [Event; 5] = [
    Event::History,
    Event::ProcessStart,
    Event::ProcessComplete,
    Event::ProcessError,
    Event::OcrComplete,
];

async fn connected(transport: &ScriptedTransport) -> ConnectionManager<ScriptedTransport> {
    let mut channel = manager(transport, 5, Duration::from_millis(100));
    channel.connect();
    transport.emit(TransportEvent::Opened);
    channel.turn().await;
    assert_eq!(channel.state(), ConnectionState::Connected);
    channel
}

#[tokio::test]
async fn test_process_complete_delivered_once() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_message, messages) = recorder();
    let (on_complete, completions) = recorder();
    channel
        .on(Event::Message, on_message)
        .on(Event::ProcessComplete, on_complete);

    transport.emit_text(r#"{"type":"process_complete","payload":{"id":1}}"#);
    channel.turn().await;

    assert_eq!(*completions.borrow(), vec![json!({"id": 1})]);
    assert_eq!(
        *messages.borrow(),
        vec![json!({"type": "process_complete", "payload": {"id": 1}})]
    );
}

#[tokio::test]
async fn test_screenshot_raises_process_start() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_start, starts) = recorder();
    channel.on(Event::ProcessStart, on_start);

    transport.emit_text(r#"{"type":"screenshot"}"#);
    channel.turn().await;

    let starts = starts.borrow();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0]["status"], SCREENSHOT_STATUS);

    let id = starts[0]["id"].as_str().unwrap();
    let stamp = id.strip_prefix(SCREENSHOT_ID_PREFIX).unwrap();
    assert!(stamp.parse::<u64>().is_ok(), "id {}", id);
}

#[tokio::test]
async fn test_each_kind_maps_to_its_event() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let recorders: Vec<_> = SPECIALIZED
        .iter()
        .map(|event| {
            let (l, calls) = recorder();
            channel.on(*event, l);
            (*event, calls)
        })
        .collect();

    for (kind, n) in [
        ("history", 1),
        ("process_start", 2),
        ("process_error", 3),
        ("ocr_complete", 4),
    ] {
        transport.emit_text(&json!({"type": kind, "payload": n}).to_string());
        channel.turn().await;
    }

    for (event, calls) in &recorders {
        let expected: Vec<Value> = match event {
            Event::History => vec![json!(1)],
            Event::ProcessStart => vec![json!(2)],
            Event::ProcessError => vec![json!(3)],
            Event::OcrComplete => vec![json!(4)],
            _ => vec![],
        };
        assert_eq!(*calls.borrow(), expected, "{}", event);
    }
}

#[tokio::test]
async fn test_off_before_trigger_delivers_nothing() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_history, calls) = recorder();
    channel.on(Event::History, on_history.clone());
    channel.off(Event::History, &on_history);
    assert_eq!(channel.listener_count(Event::History), 0);

    transport.emit_text(r#"{"type":"history","payload":[]}"#);
    channel.turn().await;

    assert!(calls.borrow().is_empty());
}

#[tokio::test]
async fn test_malformed_text_dispatches_nothing() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_message, messages) = recorder();
    channel.on(Event::Message, on_message);
    let specialized: Vec<_> = SPECIALIZED
        .iter()
        .map(|event| {
            let (l, calls) = recorder();
            channel.on(*event, l);
            calls
        })
        .collect();

    for text in ["{not json", "", "{\"type\":\"history\""] {
        transport.emit_text(text);
        channel.turn().await;
    }

    assert!(messages.borrow().is_empty());
    assert!(specialized.iter().all(|calls| calls.borrow().is_empty()));
    assert_eq!(channel.stats().parse_failures, 3);
    assert_eq!(channel.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_unknown_type_reaches_message_listeners_only() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_message, messages) = recorder();
    let (on_start, starts) = recorder();
    channel
        .on(Event::Message, on_message)
        .on(Event::ProcessStart, on_start);

    transport.emit_text(r#"{"type":"heartbeat","payload":{"seq":9}}"#);
    channel.turn().await;

    assert_eq!(messages.borrow().len(), 1);
    assert!(starts.borrow().is_empty());
}

#[tokio::test]
async fn test_transport_error_is_dispatched_without_reconnect() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_error, errors) = recorder();
    channel.on(Event::Error, on_error);

    transport.emit(TransportEvent::Error("connection reset".to_string()));
    channel.turn().await;

    assert_eq!(*errors.borrow(), vec![json!("connection reset")]);
    assert_eq!(channel.state(), ConnectionState::Connected);
    assert!(channel.pending_retry().is_none());
    assert_eq!(channel.policy().attempts_used(), 0);
}

#[tokio::test]
async fn test_failing_listener_does_not_block_siblings() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_complete, completions) = recorder();
    channel
        .on(
            Event::ProcessComplete,
            listener(|_| anyhow::bail!("render failed")),
        )
        .on(
            Event::ProcessComplete,
            listener(|payload| {
                let id = payload["id"].as_i64().unwrap_or_default();
                if id > 0 {
                    panic!("unexpected id {}", id);
                }
                Ok(())
            }),
        )
        .on(Event::ProcessComplete, on_complete);

    transport.emit_text(r#"{"type":"process_complete","payload":{"id":5}}"#);
    channel.turn().await;

    assert_eq!(*completions.borrow(), vec![json!({"id": 5})]);
    assert_eq!(channel.stats().listener_failures, 2);
    assert_eq!(channel.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_named_registration_chains() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_ocr, ocr) = recorder();
    let (on_unknown, unknown) = recorder();
    channel
        .on_named("ocrComplete", on_ocr)
        .on_named("ocr_complete", on_unknown);

    transport.emit_text(r#"{"type":"ocr_complete","payload":{"id":"p1","text":"hi"}}"#);
    channel.turn().await;

    assert_eq!(*ocr.borrow(), vec![json!({"id": "p1", "text": "hi"})]);
    assert!(unknown.borrow().is_empty());
}

#[tokio::test]
async fn test_send_requires_connection() {
    let transport = ScriptedTransport::new();
    let mut channel = manager(&transport, 5, Duration::from_millis(100));

    assert!(!channel.send("hello"));
    assert!(transport.sent().is_empty());

    channel.connect();
    transport.emit(TransportEvent::Opened);
    channel.turn().await;

    assert!(channel.send("hello"));
    assert!(channel.send(json!({"op": "refresh"})));
    assert!(channel.send_json(&vec![1, 2, 3]));
    assert_eq!(transport.sent(), vec!["hello", r#"{"op":"refresh"}"#, "[1,2,3]"]);
    assert_eq!(channel.stats().frames_sent, 3);

    transport.emit(TransportEvent::Closed);
    channel.turn().await;
    assert!(!channel.send("late"));
    assert_eq!(transport.sent().len(), 3);
}

#[tokio::test]
async fn test_transport_send_failure_reports_false() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    transport.reject_sends(true);
    assert!(!channel.send("hello"));
    assert!(!channel.send_json(&json!({"op": "refresh"})));
    assert!(transport.sent().is_empty());
    assert_eq!(channel.stats().sends_rejected, 2);
    assert_eq!(channel.stats().frames_sent, 0);
    assert_eq!(channel.state(), ConnectionState::Connected);

    transport.reject_sends(false);
    assert!(channel.send("hello"));
    assert_eq!(transport.sent(), vec!["hello"]);
}

#[tokio::test]
async fn test_unserializable_json_is_not_sent() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    // JSON object keys must be strings
    let mut grid = BTreeMap::new();
    grid.insert((0u8, 1u8), "cell");

    assert!(!channel.send_json(&grid));
    assert!(transport.sent().is_empty());
    assert_eq!(channel.stats().sends_rejected, 1);
    assert_eq!(channel.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_disconnect_event_once_per_close() {
    let transport = ScriptedTransport::new();
    let mut channel = connected(&transport).await;

    let (on_disconnect, disconnects) = recorder();
    channel.on(Event::Disconnect, on_disconnect);

    transport.emit(TransportEvent::Closed);
    channel.turn().await;

    assert_eq!(*disconnects.borrow(), vec![Value::Null]);
    assert_eq!(channel.stats().closes, 1);
}
