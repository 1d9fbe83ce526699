use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::*;
use crate::pagination::{Page, PostSort};

pub mod hierarchy;

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[cfg(feature = "postgres-store")]
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    /// A draft's parent is missing or lives in another thread; nothing was written.
    #[error("parent post not found in thread {thread}")]
    ParentNotFound { thread: Id },
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// `Conflict` when the nickname or the email is taken.
    async fn create_user(&self, user: User) -> RepoResult<User>;
    async fn get_user(&self, nickname: &str) -> RepoResult<User>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<User>;
    /// Every user whose nickname or email collides with the given pair.
    async fn list_users_by_nickname_or_email(&self, nickname: &str, email: &str) -> RepoResult<Vec<User>>;
    async fn update_user(&self, user: User) -> RepoResult<User>;
    /// Nicknames from `nicknames` that belong to no user, in input order, deduplicated.
    async fn missing_users(&self, nicknames: &[String]) -> RepoResult<Vec<String>>;
    /// Users that created a thread or a post in `forum`, ordered by nickname.
    async fn list_forum_users(&self, forum: &str, page: &Page<String>) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait ForumRepo: Send + Sync {
    async fn create_forum(&self, new: NewForum) -> RepoResult<Forum>;
    async fn get_forum(&self, slug: &str) -> RepoResult<Forum>;
}

#[async_trait]
pub trait ThreadRepo: Send + Sync {
    /// `new.created` must already be resolved; bumps the forum's thread counter.
    async fn create_thread(&self, forum: &str, new: NewThread) -> RepoResult<Thread>;
    async fn get_thread(&self, thread: &ThreadRef) -> RepoResult<Thread>;
    async fn update_thread(&self, id: Id, title: &str, message: &str) -> RepoResult<Thread>;
    /// Threads of `forum` ordered by `created`, ties by id.
    async fn list_forum_threads(&self, forum: &str, page: &Page<DateTime<Utc>>) -> RepoResult<Vec<Thread>>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Upserts `(nickname, thread)` and folds the voice change into the thread total.
    async fn upsert_vote(&self, thread: Id, vote: &Vote) -> RepoResult<Thread>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Inserts the whole batch or nothing. Fails with `ParentNotFound` when a
    /// parent is absent from `thread`.
    async fn insert_posts(&self, thread: &Thread, drafts: Vec<NewPost>) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    /// Replaces the message and marks the post edited.
    async fn update_post_message(&self, id: Id, message: &str) -> RepoResult<Post>;
    /// Parent ids referenced by `drafts` that match no post at all.
    async fn missing_parents(&self, drafts: &[NewPost]) -> RepoResult<Vec<Id>>;
    async fn list_thread_posts(&self, thread: Id, sort: PostSort, page: &Page<Id>) -> RepoResult<Vec<Post>>;
}

#[async_trait]
pub trait ServiceRepo: Send + Sync {
    async fn clear(&self) -> RepoResult<()>;
    async fn status(&self) -> RepoResult<Status>;
}

pub trait Repo: UserRepo + ForumRepo + ThreadRepo + VoteRepo + PostRepo + ServiceRepo {}

impl<T> Repo for T where T: UserRepo + ForumRepo + ThreadRepo + VoteRepo + PostRepo + ServiceRepo {}
