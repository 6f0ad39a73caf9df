use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, SnapshotError};
use crate::identity::{Address, PostId, Timestamp};
use crate::posts::PostRegistry;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRecord {
    pub is_funny: bool,
    pub timestamp: Timestamp,
}

/// Flattened `(voter, post)` record as it appears in snapshots.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntry {
    pub voter: Address,
    pub post_id: PostId,
    pub is_funny: bool,
    pub timestamp: Timestamp,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub funny_votes: u64,
    pub not_funny_votes: u64,
    pub total_votes: u64,
}

impl Tally {
    fn bucket(&mut self, is_funny: bool) -> &mut u64 {
        if is_funny {
            &mut self.funny_votes
        } else {
            &mut self.not_funny_votes
        }
    }

    fn add(&mut self, is_funny: bool) {
        *self.bucket(is_funny) += 1;
        self.total_votes += 1;
    }

    /// Moves one vote out of the `from` bucket. `total_votes` is unchanged.
    fn flip(&mut self, from: bool) {
        *self.bucket(from) -= 1;
        *self.bucket(!from) += 1;
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    NotVoted,
    VotedFunny,
    VotedNotFunny,
}

impl From<Option<&VoteRecord>> for VoteState {
    fn from(record: Option<&VoteRecord>) -> Self {
        match record {
            None => VoteState::NotVoted,
            Some(r) if r.is_funny => VoteState::VotedFunny,
            Some(_) => VoteState::VotedNotFunny,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteChange {
    pub old_vote: bool,
    pub new_vote: bool,
}

impl VoteChange {
    pub fn is_noop(&self) -> bool {
        self.old_vote == self.new_vote
    }
}

/// Vote records, per-post tallies, the per-voter index and the global vote counter.
///
/// Every mutation validates first and only then writes, so a returned error
/// always leaves the ledger exactly as it was.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteLedger {
    records: BTreeMap<Address, BTreeMap<PostId, VoteRecord>>,
    tallies: BTreeMap<PostId, Tally>,
    user_posts: BTreeMap<Address, Vec<PostId>>,
    total_votes: u64,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, voter: &Address, post_id: &str) -> Option<&VoteRecord> {
        self.records.get(voter).and_then(|by_post| by_post.get(post_id))
    }

    pub fn has_voted(&self, voter: &Address, post_id: &str) -> bool {
        self.record(voter, post_id).is_some()
    }

    pub fn state(&self, voter: &Address, post_id: &str) -> VoteState {
        self.record(voter, post_id).into()
    }

    pub fn tally(&self, post_id: &str) -> Tally {
        self.tallies.get(post_id).copied().unwrap_or_default()
    }

    pub fn total_votes(&self) -> u64 {
        self.total_votes
    }

    pub fn voted_posts(&self, voter: &Address) -> &[PostId] {
        self.user_posts
            .get(voter)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn check_cast(
        &self,
        posts: &PostRegistry,
        voter: &Address,
        post_id: &str,
    ) -> Result<(), LedgerError> {
        if !posts.exists(post_id) {
            return Err(LedgerError::NotFound {
                post_id: post_id.to_string(),
            });
        }
        if self.has_voted(voter, post_id) {
            return Err(LedgerError::AlreadyVoted {
                voter: *voter,
                post_id: post_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn cast(
        &mut self,
        posts: &PostRegistry,
        voter: Address,
        post_id: &str,
        is_funny: bool,
        timestamp: Timestamp,
    ) -> Result<VoteRecord, LedgerError> {
        self.check_cast(posts, &voter, post_id)?;

        let record = VoteRecord {
            is_funny,
            timestamp,
        };
        self.records
            .entry(voter)
            .or_default()
            .insert(post_id.to_string(), record);
        self.tallies
            .entry(post_id.to_string())
            .or_default()
            .add(is_funny);
        self.total_votes += 1;
        self.user_posts
            .entry(voter)
            .or_default()
            .push(post_id.to_string());
        Ok(record)
    }

    pub fn change(
        &mut self,
        voter: Address,
        post_id: &str,
        new_vote: bool,
        timestamp: Timestamp,
    ) -> Result<VoteChange, LedgerError> {
        let record = self
            .records
            .get_mut(&voter)
            .and_then(|by_post| by_post.get_mut(post_id))
            .ok_or_else(|| LedgerError::NotVoted {
                voter,
                post_id: post_id.to_string(),
            })?;

        let change = VoteChange {
            old_vote: record.is_funny,
            new_vote,
        };
        record.is_funny = new_vote;
        record.timestamp = timestamp;

        if !change.is_noop() {
            self.tallies
                .entry(post_id.to_string())
                .or_default()
                .flip(change.old_vote);
        }
        Ok(change)
    }

    pub fn entries(&self) -> Vec<VoteEntry> {
        self.records
            .iter()
            .flat_map(|(voter, by_post)| {
                by_post.iter().map(move |(post_id, record)| VoteEntry {
                    voter: *voter,
                    post_id: post_id.clone(),
                    is_funny: record.is_funny,
                    timestamp: record.timestamp,
                })
            })
            .collect()
    }

    pub fn user_index(&self) -> &BTreeMap<Address, Vec<PostId>> {
        &self.user_posts
    }

    /// Rebuilds records and re-derives tallies and the global counter from them.
    pub(crate) fn rebuild(
        posts: &PostRegistry,
        entries: Vec<VoteEntry>,
        user_posts: BTreeMap<Address, Vec<PostId>>,
    ) -> Result<Self, SnapshotError> {
        let mut ledger = VoteLedger::new();
        for entry in entries {
            if !posts.exists(&entry.post_id) {
                return Err(SnapshotError::OrphanVote {
                    voter: entry.voter,
                    post_id: entry.post_id,
                });
            }
            let by_post = ledger.records.entry(entry.voter).or_default();
            if by_post.contains_key(&entry.post_id) {
                return Err(SnapshotError::DuplicateVote {
                    voter: entry.voter,
                    post_id: entry.post_id,
                });
            }
            by_post.insert(
                entry.post_id.clone(),
                VoteRecord {
                    is_funny: entry.is_funny,
                    timestamp: entry.timestamp,
                },
            );
            ledger
                .tallies
                .entry(entry.post_id)
                .or_default()
                .add(entry.is_funny);
            ledger.total_votes += 1;
        }

        let voters: BTreeSet<&Address> = ledger.records.keys().chain(user_posts.keys()).collect();
        for voter in voters {
            let indexed = user_posts.get(voter).map(Vec::as_slice).unwrap_or(&[]);
            let unique: BTreeSet<&str> = indexed.iter().map(String::as_str).collect();
            let recorded: BTreeSet<&str> = ledger
                .records
                .get(voter)
                .map(|by_post| by_post.keys().map(String::as_str).collect())
                .unwrap_or_default();
            if unique.len() != indexed.len() || unique != recorded {
                return Err(SnapshotError::IndexMismatch(*voter));
            }
        }
        ledger.user_posts = user_posts
            .into_iter()
            .filter(|(_, posts)| !posts.is_empty())
            .collect();
        Ok(ledger)
    }
}
