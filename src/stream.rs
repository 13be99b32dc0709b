//! Live event stream bound to one task endpoint.
//!
//! Architecture:
//! - `EventStream::open` spawns a backend thread running a tokio runtime
//! - the backend reads frames, decodes them and hands each signal to the
//!   registered callback, one at a time, in arrival order
//! - owner -> backend communication goes over a crossbeam channel
//! - a delivery gate guarantees that once `close()` returns, the callback never
//!   runs again, even for frames the transport had already buffered

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::{run_backend, Connector, Endpoint};
use crate::error::StreamError;
use crate::protocol::{StreamAction, StreamEvent};

/// Callback invoked once per stream signal
pub type StreamCallback = Box<dyn FnMut(StreamEvent) + Send>;

/// Serializes callback invocations against `close()`.
///
/// The callback lives inside the mutex: delivering holds the lock for the
/// whole invocation, and closing takes the same lock before flipping the flag.
pub struct DeliveryGate {
    callback: Mutex<StreamCallback>,
    closed: AtomicBool,
    backend_thread: OnceLock<ThreadId>,
}

impl DeliveryGate {
    fn new(callback: StreamCallback) -> Self {
        Self {
            callback: Mutex::new(callback),
            closed: AtomicBool::new(false),
            backend_thread: OnceLock::new(),
        }
    }

    fn bind_current_thread(&self) {
        let _ = self.backend_thread.set(thread::current().id());
    }

    fn on_backend_thread(&self) -> bool {
        self.backend_thread.get() == Some(&thread::current().id())
    }

    /// Invoke the callback unless the stream is closed. Returns false if closed.
    pub fn deliver(&self, event: StreamEvent) -> bool {
        let mut guard = self.callback.lock();
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let callback = &mut *guard;
        callback(event);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop delivery. Blocks until an in-flight callback on another thread has
    /// returned; from inside the callback itself it only flips the flag.
    fn close(&self) {
        if self.on_backend_thread() {
            self.closed.store(true, Ordering::SeqCst);
        } else {
            let _in_flight = self.callback.lock();
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}

/// Clonable handle that can close a stream from anywhere, including its own callback
#[derive(Clone)]
pub struct StreamHandle {
    gate: Arc<DeliveryGate>,
    action_tx: Sender<StreamAction>,
}

impl StreamHandle {
    /// Stop delivery and ask the backend to close the transport. Idempotent.
    pub fn close(&self) {
        if self.gate.is_closed() {
            return;
        }
        self.gate.close();
        // The backend may already have exited; nothing to do then
        let _ = self.action_tx.send(StreamAction::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }
}

/// A live stream of events for one endpoint
pub struct EventStream {
    endpoint: Endpoint,
    handle: StreamHandle,
    backend: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Connect to `endpoint` on a backend thread and start delivering signals
    /// to `callback`.
    pub fn open(
        endpoint: Endpoint,
        connector: Arc<dyn Connector>,
        callback: StreamCallback,
    ) -> Result<Self, StreamError> {
        let gate = Arc::new(DeliveryGate::new(callback));
        let (action_tx, action_rx) = unbounded::<StreamAction>();

        let backend_gate = Arc::clone(&gate);
        let backend_endpoint = endpoint.clone();
        let backend = thread::Builder::new()
            .name(format!("taskfeed-stream-{}", endpoint.task_id()))
            .spawn(move || {
                backend_gate.bind_current_thread();
                run_backend(backend_endpoint, connector, action_rx, backend_gate);
            })
            .map_err(|e| StreamError::Runtime(format!("Failed to spawn stream thread: {}", e)))?;

        info!(%endpoint, "event stream opened");
        Ok(Self {
            endpoint,
            handle: StreamHandle { gate, action_tx },
            backend: Some(backend),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Terminate delivery. After this returns no callback invocation happens.
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        let first = !self.handle.is_closed();
        self.handle.close();
        if first {
            debug!(endpoint = %self.endpoint, "event stream closed");
        }
        self.join_backend();
    }

    /// Wait for the backend thread to exit. Skipped when called from the
    /// backend thread itself.
    fn join_backend(&mut self) {
        if self.handle.gate.on_backend_thread() {
            return;
        }
        if let Some(backend) = self.backend.take() {
            let _ = backend.join();
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close();
    }
}
