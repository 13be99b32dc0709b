//! Stream backend tests over the in-memory transport

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::backend::{ChannelConnector, Endpoint};
use crate::protocol::StreamEvent;
use crate::stream::{EventStream, StreamHandle};

fn endpoint() -> Endpoint {
    Endpoint::new("ws://localhost:8000", "task-42").unwrap()
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn system_frame(id: &str) -> String {
    format!(r#"{{"id":"{}","msg_type":"system","type":"info","content":"step {}"}}"#, id, id)
}

/// Open a stream that records every signal it receives
fn recording_stream(connector: Arc<ChannelConnector>) -> (EventStream, Arc<Mutex<Vec<StreamEvent>>>) {
    let signals = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&signals);
    let stream = EventStream::open(endpoint(), connector, Box::new(move |ev| sink.lock().push(ev))).unwrap();
    (stream, signals)
}

fn event_ids(signals: &[StreamEvent]) -> Vec<String> {
    signals
        .iter()
        .filter_map(|s| match s {
            StreamEvent::Event(e) => Some(e.id().to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_delivers_in_arrival_order() {
    let connector = Arc::new(ChannelConnector::new());
    let feed = connector.push_session();
    let (mut stream, signals) = recording_stream(connector);

    for i in 0..20 {
        assert!(feed.send(system_frame(&i.to_string())));
    }

    assert!(wait_until(|| event_ids(&signals.lock()).len() == 20));
    stream.close();

    let signals = signals.lock();
    assert_eq!(signals[0], StreamEvent::Connected);
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(event_ids(&signals), expected);
}

#[test]
fn test_no_callbacks_after_close_with_queued_payloads() {
    let connector = Arc::new(ChannelConnector::new());
    let feed = connector.push_session();
    let count = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&count);
    let mut stream = EventStream::open(
        endpoint(),
        connector,
        Box::new(move |ev| {
            if matches!(ev, StreamEvent::Event(_)) {
                *counter.lock() += 1;
                // Slow consumer so frames pile up in the transport
                thread::sleep(Duration::from_millis(2));
            }
        }),
    )
    .unwrap();

    for i in 0..500 {
        feed.send(system_frame(&i.to_string()));
    }
    assert!(wait_until(|| *count.lock() >= 1));

    stream.close();
    let at_close = *count.lock();
    assert!(at_close < 500);

    // Frames are still queued; none of them may reach the callback
    thread::sleep(Duration::from_millis(200));
    assert_eq!(*count.lock(), at_close);
}

#[test]
fn test_malformed_payload_is_a_distinct_signal() {
    let connector = Arc::new(ChannelConnector::new());
    let feed = connector.push_session();
    let (mut stream, signals) = recording_stream(connector);

    feed.send("not json");
    feed.send(r#"{"id":"x","msg_type":"agent","agent_type":"PlannerAgent"}"#);
    feed.send(system_frame("ok"));

    assert!(wait_until(|| signals.lock().len() == 4));
    stream.close();

    let signals = signals.lock();
    assert!(matches!(&signals[1], StreamEvent::Malformed { raw, .. } if raw == "not json"));
    assert!(matches!(&signals[2], StreamEvent::Malformed { .. }));
    assert_eq!(event_ids(&signals), vec!["ok"]);
}

#[test]
fn test_close_from_inside_callback() {
    let connector = Arc::new(ChannelConnector::new());
    let feed = connector.push_session();
    let slot: Arc<Mutex<Option<StreamHandle>>> = Arc::new(Mutex::new(None));
    let count = Arc::new(Mutex::new(0usize));

    let handle_slot = Arc::clone(&slot);
    let counter = Arc::clone(&count);
    let mut stream = EventStream::open(
        endpoint(),
        connector,
        Box::new(move |ev| {
            if matches!(ev, StreamEvent::Event(_)) {
                *counter.lock() += 1;
                if let Some(handle) = handle_slot.lock().as_ref() {
                    handle.close();
                }
            }
        }),
    )
    .unwrap();
    *slot.lock() = Some(stream.handle());

    feed.send(system_frame("1"));
    feed.send(system_frame("2"));
    feed.send(system_frame("3"));

    assert!(wait_until(|| stream.is_closed()));
    stream.close();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(*count.lock(), 1);
}

#[test]
fn test_transport_error_then_disconnect() {
    let connector = Arc::new(ChannelConnector::new());
    let feed = connector.push_session();
    let (_stream, signals) = recording_stream(connector);

    feed.fail("boom");

    assert!(wait_until(|| signals.lock().len() == 3));
    let signals = signals.lock();
    assert_eq!(signals[1], StreamEvent::Error("Transport error: boom".into()));
    assert_eq!(signals[2], StreamEvent::Disconnected("Read error".into()));
}

#[test]
fn test_server_close_reports_disconnect() {
    let connector = Arc::new(ChannelConnector::new());
    let feed = connector.push_session();
    let (_stream, signals) = recording_stream(connector);

    feed.send(system_frame("last"));
    drop(feed);

    assert!(wait_until(|| signals.lock().len() == 3));
    let signals = signals.lock();
    assert_eq!(event_ids(&signals), vec!["last"]);
    assert_eq!(
        signals[2],
        StreamEvent::Disconnected("Connection closed by server".into())
    );
}

#[test]
fn test_close_before_connect_completes() {
    // No session queued: connect fails fast, close must still be clean
    let connector = Arc::new(ChannelConnector::new());
    let (mut stream, _signals) = recording_stream(connector);
    stream.close();
    assert!(stream.is_closed());
}
