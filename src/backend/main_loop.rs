//! Backend event loop: connect, read frames, decode, deliver.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use tokio::runtime::Builder;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::transport::{Connector, Endpoint, Transport};
use crate::protocol::{decode_event, StreamAction, StreamEvent};
use crate::stream::DeliveryGate;

/// How long a single read may block before pending actions are checked
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Upper bound on a graceful transport shutdown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the stream backend on a dedicated tokio runtime until the transport
/// ends or the owner asks to close.
pub fn run_backend(
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    action_rx: Receiver<StreamAction>,
    gate: Arc<DeliveryGate>,
) {
    let rt = match Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            gate.deliver(StreamEvent::Error(format!(
                "Failed to create Tokio runtime: {}",
                e
            )));
            gate.deliver(StreamEvent::Disconnected("Stream runtime unavailable".into()));
            return;
        }
    };

    rt.block_on(async move {
        let connected = tokio::select! {
            result = connector.connect(&endpoint) => Some(result),
            _ = close_requested(&action_rx) => None,
        };

        let mut transport = match connected {
            Some(Ok(transport)) => transport,
            Some(Err(e)) => {
                gate.deliver(StreamEvent::Error(e.to_string()));
                gate.deliver(StreamEvent::Disconnected("Connection failed".into()));
                return;
            }
            None => {
                debug!(%endpoint, "closed before connecting");
                return;
            }
        };

        if gate.deliver(StreamEvent::Connected) {
            read_loop(transport.as_mut(), &action_rx, &gate).await;
        }

        if timeout(CLOSE_TIMEOUT, transport.close()).await.is_err() {
            debug!(%endpoint, "transport close timed out");
        }
    });
}

async fn read_loop(transport: &mut dyn Transport, action_rx: &Receiver<StreamAction>, gate: &DeliveryGate) {
    loop {
        // Check for actions from the owner (non-blocking)
        match action_rx.try_recv() {
            Ok(StreamAction::Close) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => {}
        }

        // Read with a short timeout so close requests are observed promptly
        match timeout(READ_POLL_INTERVAL, transport.next_frame()).await {
            Ok(Some(Ok(raw))) => {
                let event = match decode_event(&raw) {
                    Ok(event) => StreamEvent::Event(event),
                    Err(e) => StreamEvent::Malformed {
                        raw,
                        error: e.to_string(),
                    },
                };
                if !gate.deliver(event) {
                    // Closed while this frame was in flight; drop it and the rest
                    return;
                }
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "transport read failed");
                gate.deliver(StreamEvent::Error(e.to_string()));
                gate.deliver(StreamEvent::Disconnected("Read error".into()));
                return;
            }
            Ok(None) => {
                gate.deliver(StreamEvent::Disconnected(
                    "Connection closed by server".into(),
                ));
                return;
            }
            Err(_) => {
                // Timeout - this is normal, just loop
            }
        }
    }
}

/// Resolves once the owner asks to close (or drops its action sender).
async fn close_requested(action_rx: &Receiver<StreamAction>) {
    loop {
        match action_rx.try_recv() {
            Ok(StreamAction::Close) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => tokio::time::sleep(READ_POLL_INTERVAL).await,
        }
    }
}
