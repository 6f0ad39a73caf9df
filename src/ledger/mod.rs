use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::access::AccessControl;
use crate::error::{LedgerError, SnapshotError};
use crate::events::{LedgerEvent, NotificationLog};
use crate::identity::{Address, PostId, Timestamp};
use crate::posts::{Post, PostRegistry};
use crate::query::QueryLayer;
use crate::votes::{VoteEntry, VoteLedger};

/// Authenticated caller and call time, supplied by the host for every operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub timestamp: Timestamp,
}

impl CallContext {
    pub fn new(caller: Address, timestamp: Timestamp) -> Self {
        Self { caller, timestamp }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    RegisterPost {
        post_id: PostId,
        content_hash: String,
    },
    CastVote {
        post_id: PostId,
        is_funny: bool,
    },
    ChangeVote {
        post_id: PostId,
        new_vote: bool,
    },
    Pause,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RegisterPost { .. } => "register_post",
            Operation::CastVote { .. } => "cast_vote",
            Operation::ChangeVote { .. } => "change_vote",
            Operation::Pause => "pause",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LedgerMeta {
    /// Number of committed operations.
    pub height: u64,
    pub last_timestamp: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: LedgerMeta,
    pub owner: Address,
    pub paused: bool,
    pub posts: Vec<Post>,
    pub votes: Vec<VoteEntry>,
    pub user_votes: BTreeMap<Address, Vec<PostId>>,
    pub total_posts: u64,
    pub total_votes: u64,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "crate::ledger::serde_root")]
    pub state_root: [u8; 32],
}

/// The single sequential authority. Each entry point either commits in full
/// (state, height, one notification) or returns an error with nothing changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerState {
    meta: LedgerMeta,
    access: AccessControl,
    posts: PostRegistry,
    votes: VoteLedger,
    log: NotificationLog,
}

impl LedgerState {
    pub fn new(owner: Address) -> Self {
        Self {
            meta: LedgerMeta::default(),
            access: AccessControl::new(owner),
            posts: PostRegistry::new(),
            votes: VoteLedger::new(),
            log: NotificationLog::new(),
        }
    }

    pub fn meta(&self) -> &LedgerMeta {
        &self.meta
    }

    pub fn query(&self) -> QueryLayer<'_> {
        QueryLayer::new(&self.access, &self.posts, &self.votes)
    }

    pub fn events(&self) -> &NotificationLog {
        &self.log
    }

    pub fn apply(
        &mut self,
        ctx: &CallContext,
        op: &Operation,
    ) -> Result<Option<LedgerEvent>, LedgerError> {
        let result = match op {
            Operation::RegisterPost {
                post_id,
                content_hash,
            } => self.register_post(ctx, post_id, content_hash).map(Some),
            Operation::CastVote { post_id, is_funny } => {
                self.cast_vote(ctx, post_id, *is_funny).map(Some)
            }
            Operation::ChangeVote { post_id, new_vote } => {
                self.change_vote(ctx, post_id, *new_vote).map(Some)
            }
            Operation::Pause => self.pause(ctx).map(|_| None),
        };
        if let Err(err) = &result {
            warn!(
                op = op.name(),
                caller = %ctx.caller,
                kind = ?err.kind(),
                error = %err,
                "Operation rejected"
            );
        }
        result
    }

    pub fn register_post(
        &mut self,
        ctx: &CallContext,
        post_id: &str,
        content_hash: &str,
    ) -> Result<LedgerEvent, LedgerError> {
        self.access.ensure_not_paused()?;
        let post = self
            .posts
            .register(post_id, content_hash, ctx.caller, ctx.timestamp)?;
        let event = LedgerEvent::PostRegistered {
            post_id: post.post_id.clone(),
            creator: post.creator,
            content_hash: post.content_hash.clone(),
            timestamp: post.timestamp,
        };
        info!(post_id, creator = %ctx.caller, "Post registered");
        Ok(self.commit(ctx, event))
    }

    pub fn cast_vote(
        &mut self,
        ctx: &CallContext,
        post_id: &str,
        is_funny: bool,
    ) -> Result<LedgerEvent, LedgerError> {
        self.access.ensure_not_paused()?;
        let record = self
            .votes
            .cast(&self.posts, ctx.caller, post_id, is_funny, ctx.timestamp)?;
        let event = LedgerEvent::VoteCast {
            voter: ctx.caller,
            post_id: post_id.to_string(),
            is_funny: record.is_funny,
            timestamp: record.timestamp,
        };
        info!(post_id, voter = %ctx.caller, is_funny, "Vote cast");
        Ok(self.commit(ctx, event))
    }

    pub fn change_vote(
        &mut self,
        ctx: &CallContext,
        post_id: &str,
        new_vote: bool,
    ) -> Result<LedgerEvent, LedgerError> {
        self.access.ensure_not_paused()?;
        let change = self
            .votes
            .change(ctx.caller, post_id, new_vote, ctx.timestamp)?;
        if change.is_noop() {
            debug!(post_id, voter = %ctx.caller, new_vote, "Vote unchanged, timestamp refreshed");
        } else {
            info!(post_id, voter = %ctx.caller, new_vote, "Vote changed");
        }
        let event = LedgerEvent::VoteChanged {
            voter: ctx.caller,
            post_id: post_id.to_string(),
            old_vote: change.old_vote,
            new_vote: change.new_vote,
            timestamp: ctx.timestamp,
        };
        Ok(self.commit(ctx, event))
    }

    /// Owner-only and never blocked by the pause flag itself. Emits no notification.
    pub fn pause(&mut self, ctx: &CallContext) -> Result<(), LedgerError> {
        if self.access.pause(&ctx.caller)? {
            info!(owner = %ctx.caller, "Ledger paused");
        } else {
            debug!(owner = %ctx.caller, "Ledger already paused");
        }
        self.bump(ctx);
        Ok(())
    }

    fn bump(&mut self, ctx: &CallContext) {
        self.meta.height += 1;
        self.meta.last_timestamp = ctx.timestamp;
    }

    fn commit(&mut self, ctx: &CallContext, event: LedgerEvent) -> LedgerEvent {
        self.bump(ctx);
        self.log.push(event.clone());
        event
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.meta, &self.access, &self.posts, &self.votes, &self.log)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            owner: self.access.owner(),
            paused: self.access.is_paused(),
            posts: self.posts.iter().cloned().collect(),
            votes: self.votes.entries(),
            user_votes: self.votes.user_index().clone(),
            total_posts: self.posts.len() as u64,
            total_votes: self.votes.total_votes(),
            events: self.log.entries().to_vec(),
            state_root: self.state_root(),
        }
    }

    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, SnapshotError> {
        let mut posts = PostRegistry::new();
        for post in snapshot.posts {
            let post_id = post.post_id.clone();
            if !posts.insert_restored(post) {
                return Err(SnapshotError::DuplicatePost(post_id));
            }
        }
        let votes = VoteLedger::rebuild(&posts, snapshot.votes, snapshot.user_votes)?;

        let derived_posts = posts.len() as u64;
        if snapshot.total_posts != derived_posts {
            return Err(SnapshotError::CounterMismatch {
                name: "total_posts",
                recorded: snapshot.total_posts,
                derived: derived_posts,
            });
        }
        if snapshot.total_votes != votes.total_votes() {
            return Err(SnapshotError::CounterMismatch {
                name: "total_votes",
                recorded: snapshot.total_votes,
                derived: votes.total_votes(),
            });
        }

        let events = snapshot.events.len() as u64;
        if events > snapshot.meta.height {
            return Err(SnapshotError::EventsExceedHeight {
                events,
                height: snapshot.meta.height,
            });
        }
        if let Some(event) = snapshot.events.iter().find(|e| !posts.exists(e.post_id())) {
            return Err(SnapshotError::OrphanEvent(event.post_id().to_string()));
        }

        let state = Self {
            meta: snapshot.meta,
            access: AccessControl::restored(snapshot.owner, snapshot.paused),
            posts,
            votes,
            log: NotificationLog::from_entries(snapshot.events),
        };
        let recomputed = state.state_root();
        if recomputed != snapshot.state_root {
            return Err(SnapshotError::RootMismatch {
                recorded: hex::encode(snapshot.state_root),
                recomputed: hex::encode(recomputed),
            });
        }
        Ok(state)
    }
}

fn put_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn compute_state_root(
    meta: &LedgerMeta,
    access: &AccessControl,
    posts: &PostRegistry,
    votes: &VoteLedger,
    log: &NotificationLog,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();

    let mut hasher = Sha256::new();
    hasher.update(b"meta");
    hasher.update(meta.height.to_le_bytes());
    hasher.update(meta.last_timestamp.to_le_bytes());
    leaves.push(hasher.finalize().into());

    let mut hasher = Sha256::new();
    hasher.update(b"access");
    hasher.update(access.owner().as_bytes());
    hasher.update([access.is_paused() as u8]);
    leaves.push(hasher.finalize().into());

    let mut hasher = Sha256::new();
    hasher.update(b"counters");
    hasher.update((posts.len() as u64).to_le_bytes());
    hasher.update(votes.total_votes().to_le_bytes());
    // log length: an odd trailing leaf is duplicated by build_merkle
    hasher.update((log.len() as u64).to_le_bytes());
    leaves.push(hasher.finalize().into());

    for post in posts.iter() {
        let mut hasher = Sha256::new();
        hasher.update(b"post");
        put_str(&mut hasher, &post.post_id);
        hasher.update(post.creator.as_bytes());
        put_str(&mut hasher, &post.content_hash);
        hasher.update(post.timestamp.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for entry in votes.entries() {
        let mut hasher = Sha256::new();
        hasher.update(b"vote");
        hasher.update(entry.voter.as_bytes());
        put_str(&mut hasher, &entry.post_id);
        hasher.update([entry.is_funny as u8]);
        hasher.update(entry.timestamp.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (voter, post_ids) in votes.user_index() {
        let mut hasher = Sha256::new();
        hasher.update(b"index");
        hasher.update(voter.as_bytes());
        for post_id in post_ids {
            put_str(&mut hasher, post_id);
        }
        leaves.push(hasher.finalize().into());
    }
    for event in log.entries() {
        leaves.push(event_leaf(event));
    }
    build_merkle(leaves)
}

fn event_leaf(event: &LedgerEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"event");
    match event {
        LedgerEvent::PostRegistered {
            post_id,
            creator,
            content_hash,
            timestamp,
        } => {
            hasher.update([0u8]);
            put_str(&mut hasher, post_id);
            hasher.update(creator.as_bytes());
            put_str(&mut hasher, content_hash);
            hasher.update(timestamp.to_le_bytes());
        }
        LedgerEvent::VoteCast {
            voter,
            post_id,
            is_funny,
            timestamp,
        } => {
            hasher.update([1u8]);
            hasher.update(voter.as_bytes());
            put_str(&mut hasher, post_id);
            hasher.update([*is_funny as u8]);
            hasher.update(timestamp.to_le_bytes());
        }
        LedgerEvent::VoteChanged {
            voter,
            post_id,
            old_vote,
            new_vote,
            timestamp,
        } => {
            hasher.update([2u8]);
            hasher.update(voter.as_bytes());
            put_str(&mut hasher, post_id);
            hasher.update([*old_vote as u8, *new_vote as u8]);
            hasher.update(timestamp.to_le_bytes());
        }
    }
    hasher.finalize().into()
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"meme-court-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

pub(crate) mod serde_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| D::Error::custom(format!("state root is {} bytes", b.len())))
    }
}
