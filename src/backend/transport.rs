//! Transport seams and the in-memory channel transport.
//!
//! The backend loop only ever talks to a [`Transport`] produced by a
//! [`Connector`]; the WebSocket implementation lives in `connection`, and the
//! channel implementation here drives tests, demos and replays.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::validation;

/// Where a task's stream lives: `<base_url>/task/<task_id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    task_id: String,
}

impl Endpoint {
    /// Validate and build an endpoint for `task_id` under `base_url`.
    pub fn new(base_url: &str, task_id: &str) -> Result<Self, StreamError> {
        validation::validate_ws_base_url(base_url).map_err(StreamError::InvalidEndpoint)?;
        validation::validate_task_id(task_id).map_err(StreamError::InvalidEndpoint)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            task_id: task_id.to_string(),
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn url(&self) -> String {
        format!("{}/task/{}", self.base_url, self.task_id)
    }

    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("wss://")
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url())
    }
}

/// A live, ordered source of raw payloads
#[async_trait]
pub trait Transport: Send {
    /// Next raw payload. `None` once the peer has closed the channel.
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the channel. Must tolerate being called on an already closed transport.
    async fn close(&mut self);
}

/// Resolves an [`Endpoint`] into a live [`Transport`]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, StreamError>;
}

/// One item pushed through a [`ChannelTransport`]
#[derive(Debug, Clone)]
pub enum ChannelFrame {
    Payload(String),
    Error(String),
}

/// Producer side of an in-memory transport
#[derive(Clone)]
pub struct ChannelFeed {
    tx: mpsc::UnboundedSender<ChannelFrame>,
}

impl ChannelFeed {
    /// Queue a raw payload. Returns false once the transport is gone.
    pub fn send(&self, raw: impl Into<String>) -> bool {
        self.tx.send(ChannelFrame::Payload(raw.into())).is_ok()
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        self.tx.send(ChannelFrame::Error(error.into())).is_ok()
    }
}

/// Transport backed by an unbounded tokio channel
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<ChannelFrame>,
}

impl ChannelTransport {
    /// Create a transport and its feed. Dropping every feed closes the transport.
    pub fn pair() -> (ChannelFeed, ChannelTransport) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelFeed { tx }, ChannelTransport { rx })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>> {
        match self.rx.recv().await? {
            ChannelFrame::Payload(raw) => Some(Ok(raw)),
            ChannelFrame::Error(e) => Some(Err(StreamError::Transport(e))),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Hands out pre-built channel transports, one per connect, in order
#[derive(Default)]
pub struct ChannelConnector {
    pending: Mutex<VecDeque<ChannelTransport>>,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare the transport for the next connect and return its feed.
    pub fn push_session(&self) -> ChannelFeed {
        let (feed, transport) = ChannelTransport::pair();
        self.pending.lock().push_back(transport);
        feed
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, StreamError> {
        let next = self.pending.lock().pop_front();
        match next {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(StreamError::Connect(format!(
                "no transport available for {}",
                endpoint
            ))),
        }
    }
}
