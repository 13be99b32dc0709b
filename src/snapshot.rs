//! Snapshot export and fixture loading.
//!
//! A snapshot is the full master sequence as a pretty-printed JSON array of
//! wire-format events. It decodes through the same serde impl as live frames,
//! so replaying it reproduces the exact sequence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::SnapshotError;
use crate::protocol::Event;

/// Length of the task-id prefix used in export file names
const FILE_ID_PREFIX_LEN: usize = 8;

pub fn encode_snapshot(events: &[Event]) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(events).map_err(SnapshotError::Encode)
}

pub fn decode_snapshot(data: &str) -> Result<Vec<Event>, SnapshotError> {
    serde_json::from_str(data).map_err(SnapshotError::Decode)
}

/// Load a captured sequence from disk.
pub fn load_snapshot(path: &Path) -> Result<Vec<Event>, SnapshotError> {
    let data = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_snapshot(&data)
}

/// File name for an export: `YYYYMMDD-HHMMSS-<task-id prefix>.json`
pub fn export_file_name(task_id: &str) -> String {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let prefix: String = task_id.chars().take(FILE_ID_PREFIX_LEN).collect();
    if prefix.is_empty() {
        format!("{}.json", stamp)
    } else {
        format!("{}-{}.json", stamp, prefix)
    }
}

/// Write `events` into `dir` and return the created file's path.
pub fn write_snapshot(dir: &Path, task_id: &str, events: &[Event]) -> Result<PathBuf, SnapshotError> {
    let data = encode_snapshot(events)?;
    fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(export_file_name(task_id));
    fs::write(&path, data).map_err(|source| SnapshotError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CodeResult, CoderEvent, FileRef, Severity, SystemEvent, UserEvent, WriterEvent};

    fn sample() -> Vec<Event> {
        vec![
            Event::System(SystemEvent {
                id: "s1".into(),
                severity: Severity::Success,
                content: Some("任务开始处理".into()),
            }),
            Event::Coder(CoderEvent {
                id: "c1".into(),
                code: Some("df = pd.read_csv('data.csv')\nprint(df.head())".into()),
                code_result: Some(CodeResult {
                    result_type: "stdout".into(),
                    message: "   a  b\n0  1  2".into(),
                }),
                content: None,
                files: Some(vec![FileRef::from("data.csv")]),
            }),
            Event::Writer(WriterEvent {
                id: "w1".into(),
                content: Some("\\[ E = mc^2 \\]".into()),
            }),
            Event::Writer(WriterEvent {
                id: "w1".into(),
                content: None,
            }),
            Event::User(UserEvent {
                id: "u1".into(),
                content: "continue".into(),
            }),
        ]
    }

    #[test]
    fn test_snapshot_round_trip_preserves_order_and_fields() {
        let events = sample();
        let encoded = encode_snapshot(&events).unwrap();
        assert_eq!(decode_snapshot(&encoded).unwrap(), events);
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(encode_snapshot(&[]).unwrap(), "[]");
        assert!(decode_snapshot("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed_entries() {
        let result = decode_snapshot(r#"[{"id":"a","msg_type":"system"},{"msg_type":"user"}]"#);
        assert!(matches!(result, Err(SnapshotError::Decode(_))));
    }

    #[test]
    fn test_export_file_name_shape() {
        let name = export_file_name("ebc154d4-aaaa-bbbb");
        assert!(name.ends_with("-ebc154d4.json"), "{}", name);
        // YYYYMMDD-HHMMSS
        assert_eq!(name.find('-'), Some(8));
        assert_eq!(&name[15..16], "-");
    }

    #[test]
    fn test_write_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let path = write_snapshot(&target, "task42", &sample()).unwrap();
        assert!(path.starts_with(&target));
        assert_eq!(load_snapshot(&path).unwrap(), sample());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_snapshot(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(SnapshotError::Io { .. })));
    }
}
