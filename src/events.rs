//! Stream signal processing (decoded events, malformed frames, connectivity).

use tracing::{debug, info, warn};

use crate::buffer::{ConnectionStatus, EventLog};
use crate::protocol::StreamEvent;

/// Route one signal from the stream backend into the session log.
///
/// Decoded events are appended; everything else becomes observable status so
/// the UI layer can show connectivity without the stream ever failing loudly.
pub fn process_stream_event(log: &EventLog, event: StreamEvent) {
    match event {
        StreamEvent::Connected => {
            info!("stream connected");
            log.set_status(ConnectionStatus::Connected);
        }

        StreamEvent::Event(event) => {
            debug!(id = event.id(), kind = event.kind(), "ingesting event");
            log.append(event);
        }

        StreamEvent::Malformed { raw, error } => {
            warn!(%error, len = raw.len(), "dropping malformed payload");
            log.record_malformed(format!("Malformed payload: {}", error));
        }

        StreamEvent::Error(msg) => {
            warn!(error = %msg, "stream error");
            // A connect failure leaves us without a transport at all.
            if matches!(log.status(), ConnectionStatus::Connecting) {
                log.set_status(ConnectionStatus::Failed(msg.clone()));
            }
            log.record_error(msg);
        }

        StreamEvent::Disconnected(reason) => {
            info!(%reason, "stream disconnected");
            if !matches!(log.status(), ConnectionStatus::Failed(_)) {
                log.set_status(ConnectionStatus::Disconnected(reason));
            }
        }
    }
}

/// Build the boxed ingestion callback handed to an [`crate::stream::EventStream`].
pub fn ingestion_callback(log: EventLog) -> Box<dyn FnMut(StreamEvent) + Send> {
    Box::new(move |event| process_stream_event(&log, event))
}
