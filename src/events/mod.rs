//! Domain notifications emitted by committed ledger operations.
//!
//! The log is append-only; external indexers read it with a sequence cursor
//! (see [`NotificationLog::since`]).

use serde::{Deserialize, Serialize};

use crate::identity::{Address, PostId, Timestamp};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    PostRegistered {
        post_id: PostId,
        creator: Address,
        content_hash: String,
        timestamp: Timestamp,
    },
    VoteCast {
        voter: Address,
        post_id: PostId,
        is_funny: bool,
        timestamp: Timestamp,
    },
    VoteChanged {
        voter: Address,
        post_id: PostId,
        old_vote: bool,
        new_vote: bool,
        timestamp: Timestamp,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::PostRegistered { .. } => "PostRegistered",
            LedgerEvent::VoteCast { .. } => "VoteCast",
            LedgerEvent::VoteChanged { .. } => "VoteChanged",
        }
    }

    pub fn post_id(&self) -> &str {
        match self {
            LedgerEvent::PostRegistered { post_id, .. }
            | LedgerEvent::VoteCast { post_id, .. }
            | LedgerEvent::VoteChanged { post_id, .. } => post_id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotificationLog {
    entries: Vec<LedgerEvent>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<LedgerEvent>) -> Self {
        Self { entries }
    }

    /// Appends and returns the sequence number assigned to the event.
    pub(crate) fn push(&mut self, event: LedgerEvent) -> u64 {
        self.entries.push(event);
        (self.entries.len() - 1) as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEvent] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LedgerEvent> {
        self.entries.last()
    }

    pub fn since(&self, seq: u64) -> Vec<SequencedEvent> {
        self.entries
            .iter()
            .enumerate()
            .skip(usize::try_from(seq).unwrap_or(usize::MAX))
            .map(|(idx, event)| SequencedEvent {
                seq: idx as u64,
                event: event.clone(),
            })
            .collect()
    }
}
