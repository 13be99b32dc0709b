//! Event types shared between the stream backend and the message store.
//!
//! The wire shape nests agent messages under `msg_type: "agent"` with an
//! `agent_type` discriminator. In memory that nesting is flattened into a
//! single four-way [`Event`] so every classification site matches exhaustively.

use serde::{Deserialize, Serialize};

/// Severity of a system notice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

/// Outcome of executing a code cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeResult {
    #[serde(rename = "res_type", alias = "msg_type")]
    pub result_type: String,
    #[serde(rename = "msg")]
    pub message: String,
}

/// Opaque descriptor of a file produced by the coding agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(pub String);

impl FileRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEvent {
    pub id: String,
    pub severity: Severity,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoderEvent {
    pub id: String,
    pub code: Option<String>,
    pub code_result: Option<CodeResult>,
    pub content: Option<String>,
    pub files: Option<Vec<FileRef>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterEvent {
    pub id: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEvent {
    pub id: String,
    pub content: String,
}

/// One immutable record of the task's message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireEvent", into = "WireEvent")]
pub enum Event {
    System(SystemEvent),
    Coder(CoderEvent),
    Writer(WriterEvent),
    User(UserEvent),
}

impl Event {
    pub fn id(&self) -> &str {
        match self {
            Event::System(e) => &e.id,
            Event::Coder(e) => &e.id,
            Event::Writer(e) => &e.id,
            Event::User(e) => &e.id,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Event::System(e) => e.content.as_deref(),
            Event::Coder(e) => e.content.as_deref(),
            Event::Writer(e) => e.content.as_deref(),
            Event::User(e) => Some(&e.content),
        }
    }

    /// Short label used in logs and terminal output.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::System(_) => "system",
            Event::Coder(_) => "coder",
            Event::Writer(_) => "writer",
            Event::User(_) => "user",
        }
    }
}

// Wire representation: `msg_type` first, then `agent_type` for agent messages.

#[derive(Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "lowercase")]
enum WireEvent {
    System {
        id: String,
        #[serde(rename = "type", default)]
        severity: Severity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Agent(WireAgent),
    User {
        id: String,
        content: String,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "agent_type")]
enum WireAgent {
    CoderAgent {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code_result: Option<CodeResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        files: Option<Vec<FileRef>>,
    },
    WriterAgent {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::System {
                id,
                severity,
                content,
            } => Event::System(SystemEvent {
                id,
                severity,
                content,
            }),
            WireEvent::Agent(WireAgent::CoderAgent {
                id,
                content,
                code,
                code_result,
                files,
            }) => Event::Coder(CoderEvent {
                id,
                code,
                code_result,
                content,
                files,
            }),
            WireEvent::Agent(WireAgent::WriterAgent { id, content }) => {
                Event::Writer(WriterEvent { id, content })
            }
            WireEvent::User { id, content } => Event::User(UserEvent { id, content }),
        }
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        match event {
            Event::System(e) => WireEvent::System {
                id: e.id,
                severity: e.severity,
                content: e.content,
            },
            Event::Coder(e) => WireEvent::Agent(WireAgent::CoderAgent {
                id: e.id,
                content: e.content,
                code: e.code,
                code_result: e.code_result,
                files: e.files,
            }),
            Event::Writer(e) => WireEvent::Agent(WireAgent::WriterAgent {
                id: e.id,
                content: e.content,
            }),
            Event::User(e) => WireEvent::User {
                id: e.id,
                content: e.content,
            },
        }
    }
}

/// Decode one raw payload into an [`Event`].
///
/// This is the single decoder for live frames, fixtures and exported snapshots.
pub fn decode_event(raw: &str) -> Result<Event, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Actions sent from the owner to the stream backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAction {
    /// Stop reading, close the transport and exit the backend loop
    Close,
}

/// Signals delivered by the stream backend to the registered callback
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Transport established
    Connected,
    /// A decoded event payload
    Event(Event),
    /// A frame that could not be decoded as an event
    Malformed { raw: String, error: String },
    /// Transport error (connect failure, read error)
    Error(String),
    /// Transport ended
    Disconnected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_system_event() {
        let ev = decode_event(r#"{"id":"s1","msg_type":"system","type":"warning","content":"low memory"}"#)
            .unwrap();
        assert_eq!(
            ev,
            Event::System(SystemEvent {
                id: "s1".into(),
                severity: Severity::Warning,
                content: Some("low memory".into()),
            })
        );
    }

    #[test]
    fn test_system_severity_defaults_to_info() {
        let ev = decode_event(r#"{"id":"s2","msg_type":"system","content":"started"}"#).unwrap();
        match ev {
            Event::System(s) => assert_eq!(s.severity, Severity::Info),
            other => panic!("expected system event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_coder_event_with_result_and_files() {
        let raw = r#"{
            "id": "c1",
            "msg_type": "agent",
            "agent_type": "CoderAgent",
            "code": "print(1)",
            "code_result": {"res_type": "stdout", "msg": "1"},
            "files": ["data/out.csv", "fig1.png"]
        }"#;
        let Event::Coder(c) = decode_event(raw).unwrap() else {
            panic!("expected coder event");
        };
        assert_eq!(c.id, "c1");
        assert_eq!(c.code.as_deref(), Some("print(1)"));
        assert_eq!(c.content, None);
        let result = c.code_result.unwrap();
        assert_eq!(result.result_type, "stdout");
        assert_eq!(result.message, "1");
        assert_eq!(
            c.files.unwrap(),
            vec![FileRef::from("data/out.csv"), FileRef::from("fig1.png")]
        );
    }

    #[test]
    fn test_code_result_accepts_legacy_field_name() {
        let raw = r#"{"id":"c2","msg_type":"agent","agent_type":"CoderAgent",
            "code_result":{"msg_type":"error","msg":"boom"}}"#;
        let Event::Coder(c) = decode_event(raw).unwrap() else {
            panic!("expected coder event");
        };
        assert_eq!(c.code_result.unwrap().result_type, "error");
    }

    #[test]
    fn test_decode_writer_and_user_events() {
        let w = decode_event(r##"{"id":"w1","msg_type":"agent","agent_type":"WriterAgent","content":"# Intro"}"##)
            .unwrap();
        assert!(matches!(w, Event::Writer(ref e) if e.content.as_deref() == Some("# Intro")));

        let u = decode_event(r#"{"id":"u1","msg_type":"user","content":"hello"}"#).unwrap();
        assert_eq!(u.content(), Some("hello"));
        assert_eq!(u.kind(), "user");
    }

    #[test]
    fn test_null_optional_fields_decode_as_none() {
        let w = decode_event(r#"{"id":"w2","msg_type":"agent","agent_type":"WriterAgent","content":null}"#)
            .unwrap();
        assert_eq!(w.content(), None);
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        assert!(decode_event("not json").is_err());
        assert!(decode_event(r#"{"msg_type":"system","content":"no id"}"#).is_err());
        assert!(decode_event(r#"{"id":"x","msg_type":"robot"}"#).is_err());
        assert!(decode_event(r#"{"id":"x","msg_type":"agent","agent_type":"ModelerAgent"}"#).is_err());
        assert!(decode_event(r#"{"id":"x","msg_type":"user"}"#).is_err());
    }

    #[test]
    fn test_encoding_uses_wire_shape() {
        let ev = Event::Coder(CoderEvent {
            id: "c3".into(),
            code: Some("x = 1".into()),
            ..Default::default()
        });
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["msg_type"], "agent");
        assert_eq!(value["agent_type"], "CoderAgent");
        assert_eq!(value["code"], "x = 1");
        assert!(value.get("content").is_none());
        assert!(value.get("files").is_none());
    }
}
