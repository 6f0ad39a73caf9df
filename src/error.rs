use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Address, PostId};

/// Rejection of a single ledger operation. State is untouched whenever one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller {caller} is not the owner")]
    NotOwner { caller: Address },

    #[error("post {post_id} already exists")]
    AlreadyExists { post_id: PostId },

    #[error("post {post_id} not found")]
    NotFound { post_id: PostId },

    #[error("{voter} already voted on post {post_id}")]
    AlreadyVoted { voter: Address, post_id: PostId },

    #[error("{voter} has not voted on post {post_id}")]
    NotVoted { voter: Address, post_id: PostId },

    #[error("ledger is paused")]
    Paused,

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Stable classification handed back to the submission layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotOwner,
    AlreadyExists,
    NotFound,
    AlreadyVoted,
    NotVoted,
    Paused,
    InvalidInput,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotOwner { .. } => ErrorKind::NotOwner,
            LedgerError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::AlreadyVoted { .. } => ErrorKind::AlreadyVoted,
            LedgerError::NotVoted { .. } => ErrorKind::NotVoted,
            LedgerError::Paused => ErrorKind::Paused,
            LedgerError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Reasons a persisted snapshot cannot be turned back into a ledger.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("state root mismatch: recorded {recorded}, recomputed {recomputed}")]
    RootMismatch { recorded: String, recomputed: String },

    #[error("duplicate post {0}")]
    DuplicatePost(PostId),

    #[error("duplicate vote by {voter} on post {post_id}")]
    DuplicateVote { voter: Address, post_id: PostId },

    #[error("vote by {voter} references unknown post {post_id}")]
    OrphanVote { voter: Address, post_id: PostId },

    #[error("vote index for {0} does not match its vote records")]
    IndexMismatch(Address),

    #[error("{events} notifications recorded at height {height}")]
    EventsExceedHeight { events: u64, height: u64 },

    #[error("notification references unknown post {0}")]
    OrphanEvent(PostId),

    #[error("counter {name} is {recorded}, records give {derived}")]
    CounterMismatch {
        name: &'static str,
        recorded: u64,
        derived: u64,
    },
}
