//! Append-only master sequence of received events.
//!
//! `EventLog` is a cheap clonable handle; the stream backend's ingestion
//! callback and the owning store share one instance. Every append and every
//! read goes through a single mutex, so readers always see whole events.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::Event;

/// Connection status of the current viewing session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No stream has been opened
    #[default]
    Idle,
    /// Stream opened, transport not yet established
    Connecting,
    Connected,
    /// Transport ended (server close, read error, or `end()`)
    Disconnected(String),
    /// Transport could not be established
    Failed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

#[derive(Default)]
struct LogInner {
    events: Vec<Event>,
    status: ConnectionStatus,
    last_error: Option<String>,
    malformed: usize,
}

/// Shared handle to the session's event sequence and connection status
#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<LogInner>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Duplicate ids are kept; the log is a record, not a keyed table.
    pub fn append(&self, event: Event) {
        self.inner.lock().events.push(event);
    }

    /// Clone of the full sequence in arrival order
    pub fn snapshot(&self) -> Vec<Event> {
        self.inner.lock().events.clone()
    }

    /// Run `f` against the sequence without cloning it.
    pub fn with_events<R>(&self, f: impl FnOnce(&[Event]) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.events)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().events.is_empty()
    }

    /// Reset the sequence and all session bookkeeping.
    pub fn clear(&self) {
        *self.inner.lock() = LogInner::default();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().status.clone()
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.inner.lock().status = status;
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn record_error(&self, error: String) {
        self.inner.lock().last_error = Some(error);
    }

    /// Count a rejected payload and remember why it was rejected.
    pub fn record_malformed(&self, error: String) {
        let mut inner = self.inner.lock();
        inner.malformed += 1;
        inner.last_error = Some(error);
    }

    pub fn malformed_count(&self) -> usize {
        self.inner.lock().malformed
    }
}
