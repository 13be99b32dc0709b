//! Derived views over the master event sequence.
//!
//! All functions are pure: they borrow the sequence, never mutate it, and are
//! recomputed on every call.

use crate::protocol::{CoderEvent, Event, FileRef, WriterEvent};

/// Events for the chat feed: every system notice plus coder steps that carry
/// prose. Writer and user events never appear here.
pub fn chat_view(events: &[Event]) -> Vec<&Event> {
    events
        .iter()
        .filter(|event| match event {
            Event::System(_) => true,
            Event::Coder(c) => c.content.as_deref().is_some_and(|s| !s.is_empty()),
            Event::Writer(_) | Event::User(_) => false,
        })
        .collect()
}

/// Coder steps with code or content, in arrival order.
pub fn coder_view(events: &[Event]) -> Vec<&CoderEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Coder(c) if c.code.is_some() || c.content.is_some() => Some(c),
            _ => None,
        })
        .collect()
}

/// Writer messages that carry content.
pub fn writer_view(events: &[Event]) -> Vec<&WriterEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Writer(w) if w.content.is_some() => Some(w),
            _ => None,
        })
        .collect()
}

/// File list of the newest coder step that reported a non-empty one.
///
/// A newer list replaces an older one outright; lists are never merged.
pub fn current_files(events: &[Event]) -> Vec<FileRef> {
    events
        .iter()
        .rev()
        .find_map(|event| match event {
            Event::Coder(CoderEvent {
                files: Some(files), ..
            }) if !files.is_empty() => Some(files.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
