use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::error::{ApiError, Entity, OrMissing};
use crate::models::{timestamp, NewThread, Thread, ThreadRef, UpdateThread, Vote};
use crate::repo::{Repo, RepoError};

use super::resolve_thread;

#[derive(Clone)]
pub struct ThreadUsecase {
    repo: Arc<dyn Repo>,
}

impl ThreadUsecase {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Creates a thread in `forum`. The stored forum slug and author nickname
    /// replace whatever the client sent; an empty slug means none.
    pub async fn create(&self, forum: &str, new: NewThread) -> Result<Thread, ApiError> {
        new.validate()?;
        let forum = self.repo.get_forum(forum).await.or_missing(Entity::Forum, "slug", forum)?;
        let author = self.repo.get_user(&new.author).await.or_missing(Entity::User, "nickname", &new.author)?;
        let new = NewThread {
            title: new.title,
            author: author.nickname,
            message: new.message,
            slug: new.slug.filter(|s| !s.is_empty()),
            created: Some(new.created.unwrap_or_else(timestamp)),
        };
        let slug = new.slug.clone();
        match self.repo.create_thread(&forum.slug, new).await {
            Ok(thread) => {
                info!(id = thread.id, forum = %thread.forum, "thread created");
                Ok(thread)
            }
            Err(RepoError::Conflict) => {
                let Some(slug) = slug else {
                    return Err(ApiError::Internal("thread conflict without a slug".into()));
                };
                let existing = self.repo.get_thread(&ThreadRef::Slug(slug)).await?;
                Err(ApiError::already_exists(&existing))
            }
            Err(e) => Err(e).or_missing(Entity::Forum, "slug", &forum.slug),
        }
    }

    pub async fn details(&self, slug_or_id: &str) -> Result<Thread, ApiError> {
        resolve_thread(&self.repo, slug_or_id).await
    }

    /// Empty fields keep their stored value.
    pub async fn update(&self, slug_or_id: &str, upd: UpdateThread) -> Result<Thread, ApiError> {
        let thread = resolve_thread(&self.repo, slug_or_id).await?;
        let title = if upd.title.is_empty() { thread.title } else { upd.title };
        let message = if upd.message.is_empty() { thread.message } else { upd.message };
        self.repo
            .update_thread(thread.id, &title, &message)
            .await
            .or_missing(Entity::Thread, "id", thread.id)
    }

    /// After the body's shape, thread first, then voter, then voice: the
    /// first failing check wins.
    pub async fn vote(&self, slug_or_id: &str, vote: Vote) -> Result<Thread, ApiError> {
        vote.validate()?;
        let thread = resolve_thread(&self.repo, slug_or_id).await?;
        self.repo.get_user(&vote.nickname).await.or_missing(Entity::User, "nickname", &vote.nickname)?;
        if vote.voice != 1 && vote.voice != -1 {
            return Err(ApiError::BadRequest(format!("voice must be 1 or -1, got {}", vote.voice)));
        }
        let updated = self.repo.upsert_vote(thread.id, &vote).await.or_missing(Entity::Thread, "id", thread.id)?;
        debug!(thread = updated.id, nickname = %vote.nickname, votes = updated.votes, "vote recorded");
        Ok(updated)
    }
}
