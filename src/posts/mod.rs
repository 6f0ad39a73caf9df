use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::identity::{Address, PostId, Timestamp};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub post_id: PostId,
    pub creator: Address,
    pub content_hash: String,
    pub timestamp: Timestamp,
}

/// Registered posts. Entries are never removed or edited once inserted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostRegistry {
    posts: BTreeMap<PostId, Post>,
}

impl PostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, post_id: &str) -> bool {
        self.posts.contains_key(post_id)
    }

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.posts.get(post_id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    pub fn check_register(&self, post_id: &str, content_hash: &str) -> Result<(), LedgerError> {
        if post_id.is_empty() {
            return Err(LedgerError::InvalidInput("post id must not be empty"));
        }
        if content_hash.is_empty() {
            return Err(LedgerError::InvalidInput("content hash must not be empty"));
        }
        if self.exists(post_id) {
            return Err(LedgerError::AlreadyExists {
                post_id: post_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn register(
        &mut self,
        post_id: &str,
        content_hash: &str,
        creator: Address,
        timestamp: Timestamp,
    ) -> Result<&Post, LedgerError> {
        self.check_register(post_id, content_hash)?;
        let post = Post {
            post_id: post_id.to_string(),
            creator,
            content_hash: content_hash.to_string(),
            timestamp,
        };
        Ok(self.posts.entry(post.post_id.clone()).or_insert(post))
    }

    /// Used by snapshot restore; reports whether the id was free.
    pub(crate) fn insert_restored(&mut self, post: Post) -> bool {
        if self.posts.contains_key(&post.post_id) {
            return false;
        }
        self.posts.insert(post.post_id.clone(), post);
        true
    }
}
