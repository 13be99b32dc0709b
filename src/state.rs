//! Session state for one task view.
//!
//! `MessageStore` owns the master sequence and the stream feeding it. It is
//! an explicit context object: the host creates one, calls `begin` when a
//! task is opened and `end` when the view goes away, and reads the derived
//! views in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{Connector, Endpoint};
use crate::buffer::{ConnectionStatus, EventLog};
use crate::config::Settings;
use crate::error::{SessionError, SnapshotError};
use crate::events::ingestion_callback;
use crate::protocol::{CoderEvent, Event, FileRef, WriterEvent};
use crate::render::ProseRenderer;
use crate::snapshot::{encode_snapshot, load_snapshot, write_snapshot};
use crate::stream::EventStream;
use crate::views;

pub struct MessageStore {
    connector: Arc<dyn Connector>,
    settings: Settings,
    log: EventLog,
    stream: Option<EventStream>,
    task_id: Option<String>,
}

impl MessageStore {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_settings(connector, Settings::default())
    }

    pub fn with_settings(connector: Arc<dyn Connector>, settings: Settings) -> Self {
        Self {
            connector,
            settings,
            log: EventLog::new(),
            stream: None,
            task_id: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start a session for `task_id`: drop the previous session's stream and
    /// events, replay the configured fixture, then open the live stream.
    ///
    /// On error the previous session is left untouched.
    pub fn begin(&mut self, task_id: &str) -> Result<(), SessionError> {
        let endpoint = Endpoint::new(&self.settings.ws_base_url, task_id)?;
        let fixture = match &self.settings.fixture {
            Some(path) => load_snapshot(path)?,
            None => Vec::new(),
        };

        // Closing blocks until the old callback is idle, so nothing from the
        // previous session can land after the clear below.
        self.end();
        self.log.clear();
        self.task_id = Some(task_id.to_string());

        if !fixture.is_empty() {
            info!(count = fixture.len(), "seeding session from fixture");
            self.seed(fixture);
        }

        self.log.set_status(ConnectionStatus::Connecting);
        let stream = EventStream::open(
            endpoint,
            Arc::clone(&self.connector),
            ingestion_callback(self.log.clone()),
        );
        match stream {
            Ok(stream) => {
                info!(task_id, "session started");
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to open event stream");
                self.log.set_status(ConnectionStatus::Failed(e.to_string()));
                self.log.record_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Append one event. Duplicate ids are kept.
    pub fn ingest(&self, event: Event) {
        self.log.append(event);
    }

    /// Replay a captured sequence in order.
    pub fn seed(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.ingest(event);
        }
    }

    /// Close the live stream. Events are retained until the next `begin`.
    pub fn end(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            if matches!(
                self.log.status(),
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            ) {
                self.log
                    .set_status(ConnectionStatus::Disconnected("Session ended".into()));
            }
            info!(endpoint = %stream.endpoint(), "session ended");
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| !s.is_closed())
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.log.status()
    }

    pub fn last_error(&self) -> Option<String> {
        self.log.last_error()
    }

    pub fn malformed_count(&self) -> usize {
        self.log.malformed_count()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Full copy of the master sequence
    pub fn events(&self) -> Vec<Event> {
        self.log.snapshot()
    }

    pub fn chat_view(&self) -> Vec<Event> {
        self.log
            .with_events(|events| views::chat_view(events).into_iter().cloned().collect())
    }

    pub fn coder_view(&self) -> Vec<CoderEvent> {
        self.log
            .with_events(|events| views::coder_view(events).into_iter().cloned().collect())
    }

    pub fn writer_view(&self) -> Vec<WriterEvent> {
        self.log
            .with_events(|events| views::writer_view(events).into_iter().cloned().collect())
    }

    pub fn current_files(&self) -> Vec<FileRef> {
        self.log.with_events(views::current_files)
    }

    /// Render the writer view as HTML sections.
    pub fn render_writer_feed(&self, renderer: &ProseRenderer) -> String {
        let events = self.events();
        renderer.render_writer_feed(&events)
    }

    /// Serialize the master sequence as a JSON array.
    pub fn export_snapshot(&self) -> Result<String, SnapshotError> {
        self.log.with_events(encode_snapshot)
    }

    /// Write a timestamped snapshot file into `dir`.
    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf, SnapshotError> {
        let events = self.events();
        let path = write_snapshot(dir, self.task_id().unwrap_or_default(), &events)?;
        info!(path = %path.display(), count = events.len(), "snapshot exported");
        Ok(path)
    }
}

impl Drop for MessageStore {
    fn drop(&mut self) {
        self.end();
    }
}
