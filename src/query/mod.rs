use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::identity::{Address, PostId, Timestamp};
use crate::posts::{Post, PostRegistry};
use crate::votes::{VoteLedger, VoteState};

/// `getPostStats` result. Unregistered posts come back all-zero with `exists == false`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostStats {
    pub funny_votes: u64,
    pub not_funny_votes: u64,
    pub total_votes: u64,
    pub exists: bool,
}

/// `getVote` result. `is_funny` and `timestamp` are zero-valued when `has_voted` is false.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteView {
    pub is_funny: bool,
    pub timestamp: Timestamp,
    pub has_voted: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Totals {
    pub total_posts: u64,
    pub total_votes: u64,
}

/// Read-only projections. Never consults the pause guard.
pub struct QueryLayer<'a> {
    access: &'a AccessControl,
    posts: &'a PostRegistry,
    votes: &'a VoteLedger,
}

impl<'a> QueryLayer<'a> {
    pub fn new(access: &'a AccessControl, posts: &'a PostRegistry, votes: &'a VoteLedger) -> Self {
        Self {
            access,
            posts,
            votes,
        }
    }

    pub fn post_stats(&self, post_id: &str) -> PostStats {
        if !self.posts.exists(post_id) {
            return PostStats::default();
        }
        let tally = self.votes.tally(post_id);
        PostStats {
            funny_votes: tally.funny_votes,
            not_funny_votes: tally.not_funny_votes,
            total_votes: tally.total_votes,
            exists: true,
        }
    }

    pub fn post(&self, post_id: &str) -> Option<&'a Post> {
        self.posts.get(post_id)
    }

    pub fn user_vote_count(&self, user: &Address) -> u64 {
        self.votes.voted_posts(user).len() as u64
    }

    pub fn user_voted_posts(&self, user: &Address) -> Vec<PostId> {
        self.votes.voted_posts(user).to_vec()
    }

    pub fn vote(&self, voter: &Address, post_id: &str) -> VoteView {
        match self.votes.record(voter, post_id) {
            Some(record) => VoteView {
                is_funny: record.is_funny,
                timestamp: record.timestamp,
                has_voted: true,
            },
            None => VoteView::default(),
        }
    }

    pub fn has_voted(&self, voter: &Address, post_id: &str) -> bool {
        self.votes.has_voted(voter, post_id)
    }

    pub fn vote_state(&self, voter: &Address, post_id: &str) -> VoteState {
        self.votes.state(voter, post_id)
    }

    pub fn total_posts(&self) -> u64 {
        self.posts.len() as u64
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.total_votes()
    }

    pub fn totals(&self) -> Totals {
        Totals {
            total_posts: self.total_posts(),
            total_votes: self.total_votes(),
        }
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn is_paused(&self) -> bool {
        self.access.is_paused()
    }
}
