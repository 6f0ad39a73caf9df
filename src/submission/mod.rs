//! JSONL submission batches for the host CLI.
//!
//! Each non-blank line is one `Submission`: a caller, an optional timestamp and
//! the operation fields flattened alongside them.

use std::{
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Address, Timestamp};
use crate::ledger::Operation;

/// One line of a batch. The caller field stands in for the authenticated
/// identity a real submission layer would provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub caller: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(flatten)]
    pub op: Operation,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: malformed submission: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses a whole batch, pairing each submission with its 1-based line number.
/// Blank lines are skipped; the first malformed line fails the batch.
pub fn parse_submissions<R: BufRead>(
    reader: R,
    path: &Path,
) -> Result<Vec<(usize, Submission)>, BatchError> {
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let sub = serde_json::from_str(&line).map_err(|source| BatchError::Malformed {
            line: idx + 1,
            source,
        })?;
        out.push((idx + 1, sub));
    }
    Ok(out)
}

pub fn read_submissions(path: &Path) -> Result<Vec<(usize, Submission)>, BatchError> {
    let file = fs::File::open(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_submissions(BufReader::new(file), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALLER: &str = "0x0303030303030303030303030303030303030303";

    fn parse(text: &str) -> Result<Vec<(usize, Submission)>, BatchError> {
        parse_submissions(text.as_bytes(), Path::new("batch.jsonl"))
    }

    #[test]
    fn flattened_operation_and_optional_timestamp() {
        let text = format!(
            "{{\"caller\":\"{CALLER}\",\"type\":\"cast_vote\",\"post_id\":\"p1\",\"is_funny\":true}}\n\
             {{\"caller\":\"{CALLER}\",\"timestamp\":42,\"type\":\"pause\"}}\n"
        );
        let subs = parse(&text).unwrap();
        assert_eq!(
            subs,
            vec![
                (
                    1,
                    Submission {
                        caller: Address::from_bytes([3u8; 20]),
                        timestamp: None,
                        op: Operation::CastVote {
                            post_id: "p1".into(),
                            is_funny: true,
                        },
                    }
                ),
                (
                    2,
                    Submission {
                        caller: Address::from_bytes([3u8; 20]),
                        timestamp: Some(42),
                        op: Operation::Pause,
                    }
                ),
            ]
        );
    }

    #[test]
    fn blank_lines_are_skipped_but_counted() {
        let text = format!(
            "\n   \n{{\"caller\":\"{CALLER}\",\"type\":\"register_post\",\"post_id\":\"p1\",\"content_hash\":\"h\"}}\n\n"
        );
        let subs = parse(&text).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].0, 3);
        assert_eq!(subs[0].1.op.name(), "register_post");
    }

    #[test]
    fn malformed_line_fails_the_whole_batch() {
        let text = format!(
            "{{\"caller\":\"{CALLER}\",\"type\":\"pause\"}}\n\
             {{\"caller\":\"{CALLER}\",\"type\":\"unpause\"}}\n\
             {{\"caller\":\"{CALLER}\",\"type\":\"pause\"}}\n"
        );
        match parse(&text) {
            Err(BatchError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed line 2, got {other:?}"),
        }

        let missing_caller = "{\"type\":\"pause\"}\n";
        assert!(matches!(
            parse(missing_caller),
            Err(BatchError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn serialized_submission_reads_back() {
        let sub = Submission {
            caller: Address::from_bytes([3u8; 20]),
            timestamp: Some(9),
            op: Operation::ChangeVote {
                post_id: "p1".into(),
                new_vote: false,
            },
        };
        let line = serde_json::to_string(&sub).unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["type"], "change_vote");
        assert_eq!(json["caller"], CALLER);
        assert_eq!(parse(&line).unwrap(), vec![(1, sub)]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_submissions(&dir.path().join("none.jsonl")),
            Err(BatchError::Io { .. })
        ));
    }
}
