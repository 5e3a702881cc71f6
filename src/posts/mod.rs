//! Posts and the persistence collaborator the pipeline writes back to.

pub mod enrich;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::{Category, PostAnalysis};
use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author: String,
    pub likes: u64,
    pub flagged: bool,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "anonymous")]
    pub author: String,
}

fn anonymous() -> String {
    "Anonymous".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub post_id: u64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    #[serde(default = "anonymous")]
    pub author: String,
    #[serde(default)]
    pub content: String,
}

/// Like count after a toggle, and whether the caller now likes the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub likes: u64,
    pub liked: bool,
}

/// Partial field set applied by id. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdate {
    pub flagged: Option<bool>,
    pub summary: Option<String>,
    pub category: Option<Category>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.flagged.is_none() && self.summary.is_none() && self.category.is_none()
    }

    /// Background-enrichment policy:
    /// - flag only ever set to `true`
    /// - summary only when one was produced
    /// - category only replaces a user-chosen `General`, and only with a
    ///   non-`General` suggestion
    pub fn from_analysis(analysis: &PostAnalysis, chosen: Category) -> Self {
        Self {
            flagged: analysis.flagged.then_some(true),
            summary: analysis.summary.clone(),
            category: (chosen == Category::General && analysis.category != Category::General)
                .then_some(analysis.category),
        }
    }

    fn apply(&self, post: &mut Post) {
        if let Some(f) = self.flagged {
            post.flagged = f;
        }
        if let Some(s) = &self.summary {
            post.summary = Some(s.clone());
        }
        if let Some(c) = self.category {
            post.category = c;
        }
    }
}

#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, new: NewPost) -> Result<Post>;
    async fn get(&self, id: u64) -> Result<Option<Post>>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Post>>;
    /// Errors with `NotFound` if no post has this id.
    async fn update(&self, id: u64, update: PostUpdate) -> Result<()>;
    /// Toggles `user`'s like. A second like from the same user takes it back;
    /// the post's author cannot like it at all.
    async fn like(&self, id: u64, user: &str) -> Result<LikeState>;
    /// Removes the post and its comments. Only the author may delete.
    async fn delete(&self, id: u64, requester: &str) -> Result<()>;
    async fn add_comment(&self, post_id: u64, new: NewComment) -> Result<Comment>;
    /// Oldest first.
    async fn list_comments(&self, post_id: u64) -> Result<Vec<Comment>>;
}

pub type SharedPostStore = Arc<dyn PostStore>;

#[derive(Debug)]
struct Entry {
    post: Post,
    likers: BTreeSet<String>,
    comments: Vec<Comment>,
}

#[derive(Debug, Default)]
pub struct InMemoryPostStore {
    inner: RwLock<BTreeMap<u64, Entry>>,
    next_id: AtomicU64,
    next_comment_id: AtomicU64,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend(anyhow!("post store lock poisoned"))
}

#[async_trait::async_trait]
impl PostStore for InMemoryPostStore {
    async fn create(&self, new: NewPost) -> Result<Post> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let post = Post {
            id,
            title: new.title,
            content: new.content,
            category: new.category,
            author: new.author,
            likes: 0,
            flagged: false,
            summary: None,
            created_at: Utc::now(),
        };
        self.inner.write().map_err(poisoned)?.insert(
            id,
            Entry {
                post: post.clone(),
                likers: BTreeSet::new(),
                comments: Vec::new(),
            },
        );
        Ok(post)
    }

    async fn get(&self, id: u64) -> Result<Option<Post>> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .get(&id)
            .map(|e| e.post.clone()))
    }

    async fn list(&self) -> Result<Vec<Post>> {
        let g = self.inner.read().map_err(poisoned)?;
        Ok(g.values().rev().map(|e| e.post.clone()).collect())
    }

    async fn update(&self, id: u64, update: PostUpdate) -> Result<()> {
        let mut g = self.inner.write().map_err(poisoned)?;
        let entry = g.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        update.apply(&mut entry.post);
        Ok(())
    }

    async fn like(&self, id: u64, user: &str) -> Result<LikeState> {
        let mut g = self.inner.write().map_err(poisoned)?;
        let entry = g.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if entry.post.author == user {
            return Err(StoreError::SelfLike);
        }
        let liked = if entry.likers.remove(user) {
            false
        } else {
            entry.likers.insert(user.to_string());
            true
        };
        entry.post.likes = entry.likers.len() as u64;
        Ok(LikeState {
            likes: entry.post.likes,
            liked,
        })
    }

    async fn delete(&self, id: u64, requester: &str) -> Result<()> {
        let mut g = self.inner.write().map_err(poisoned)?;
        let entry = g.get(&id).ok_or(StoreError::NotFound(id))?;
        if entry.post.author != requester {
            return Err(StoreError::NotAuthor);
        }
        g.remove(&id);
        Ok(())
    }

    async fn add_comment(&self, post_id: u64, new: NewComment) -> Result<Comment> {
        let mut g = self.inner.write().map_err(poisoned)?;
        let entry = g.get_mut(&post_id).ok_or(StoreError::NotFound(post_id))?;
        let comment = Comment {
            id: self.next_comment_id.fetch_add(1, Ordering::Relaxed) + 1,
            post_id,
            author: new.author,
            content: new.content,
            created_at: Utc::now(),
        };
        entry.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: u64) -> Result<Vec<Comment>> {
        let g = self.inner.read().map_err(poisoned)?;
        let entry = g.get(&post_id).ok_or(StoreError::NotFound(post_id))?;
        Ok(entry.comments.clone())
    }
}
