//! Taskfeed client library.
//!
//! Follows a running multi-agent task over its event stream, keeps the
//! session's events in an append-only store with derived views, and renders
//! writer prose (with embedded math) to HTML.

pub mod backend;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod protocol;
pub mod render;
pub mod snapshot;
pub mod state;
pub mod stream;
pub mod validation;
pub mod views;

#[cfg(test)]
mod backend_tests;

pub use buffer::ConnectionStatus;
pub use error::{ConfigError, SessionError, SnapshotError, StreamError};
pub use protocol::{Event, FileRef, StreamEvent};
pub use render::{MathRenderer, ProseRenderer};
pub use state::MessageStore;
pub use stream::{EventStream, StreamHandle};
