use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, Entity, OrMissing};
use crate::models::{Forum, NewForum, Thread, User};
use crate::pagination::Page;
use crate::repo::{Repo, RepoError};

#[derive(Clone)]
pub struct ForumUsecase {
    repo: Arc<dyn Repo>,
}

impl ForumUsecase {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, new: NewForum) -> Result<Forum, ApiError> {
        new.validate()?;
        let owner = self.repo.get_user(&new.user).await.or_missing(Entity::User, "nickname", &new.user)?;
        let slug = new.slug.clone();
        let new = NewForum { title: new.title, user: owner.nickname.clone(), slug: new.slug };
        match self.repo.create_forum(new).await {
            Ok(forum) => {
                info!(slug = %forum.slug, owner = %forum.user, "forum created");
                Ok(forum)
            }
            Err(RepoError::Conflict) => {
                let existing = self.repo.get_forum(&slug).await?;
                Err(ApiError::already_exists(&existing))
            }
            Err(e) => Err(e).or_missing(Entity::User, "nickname", &owner.nickname),
        }
    }

    pub async fn details(&self, slug: &str) -> Result<Forum, ApiError> {
        self.repo.get_forum(slug).await.or_missing(Entity::Forum, "slug", slug)
    }

    pub async fn threads(&self, slug: &str, page: &Page<DateTime<Utc>>) -> Result<Vec<Thread>, ApiError> {
        let forum = self.details(slug).await?;
        Ok(self.repo.list_forum_threads(&forum.slug, page).await?)
    }

    pub async fn users(&self, slug: &str, page: &Page<String>) -> Result<Vec<User>, ApiError> {
        let forum = self.details(slug).await?;
        Ok(self.repo.list_forum_users(&forum.slug, page).await?)
    }
}
