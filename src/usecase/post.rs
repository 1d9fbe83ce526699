use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::error::{ApiError, Entity, OrMissing};
use crate::models::{Id, NewPost, Post, PostDetails, Related, ThreadRef, UpdatePost};
use crate::pagination::{Page, PostSort};
use crate::repo::{Repo, RepoError};

use super::resolve_thread;

#[derive(Clone)]
pub struct PostUsecase {
    repo: Arc<dyn Repo>,
}

impl PostUsecase {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Checks run in order (draft fields, thread, authors, parents) and stop
    /// at the first failure, before anything is written.
    pub async fn create_batch(&self, slug_or_id: &str, drafts: Vec<NewPost>) -> Result<Vec<Post>, ApiError> {
        drafts.iter().try_for_each(Validate::validate)?;
        let thread = resolve_thread(&self.repo, slug_or_id).await?;
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let authors: Vec<String> = drafts.iter().map(|d| d.author.clone()).collect();
        if let Some(nickname) = self.repo.missing_users(&authors).await?.into_iter().next() {
            return Err(ApiError::does_not_exist(Entity::User, "nickname", nickname));
        }
        if let Some(parent) = self.repo.missing_parents(&drafts).await?.into_iter().next() {
            return Err(ApiError::does_not_exist(Entity::ParentPost, "id", parent));
        }

        let count = drafts.len();
        match self.repo.insert_posts(&thread, drafts).await {
            Ok(posts) => {
                info!(thread = thread.id, count, "posts created");
                Ok(posts)
            }
            Err(e @ RepoError::ParentNotFound { .. }) => {
                warn!(thread = thread.id, "batch rejected by parent check");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, slug_or_id: &str, sort: PostSort, page: &Page<Id>) -> Result<Vec<Post>, ApiError> {
        let thread = resolve_thread(&self.repo, slug_or_id).await?;
        Ok(self.repo.list_thread_posts(thread.id, sort, page).await?)
    }

    pub async fn details(&self, id: Id, related: Related) -> Result<PostDetails, ApiError> {
        let post = self.get(id).await?;
        let author = if related.user {
            Some(self.repo.get_user(&post.author).await.or_missing(Entity::User, "nickname", &post.author)?)
        } else {
            None
        };
        let thread = if related.thread {
            let thread = ThreadRef::Id(post.thread);
            Some(self.repo.get_thread(&thread).await.or_missing(Entity::Thread, "id", post.thread)?)
        } else {
            None
        };
        let forum = if related.forum {
            Some(self.repo.get_forum(&post.forum).await.or_missing(Entity::Forum, "slug", &post.forum)?)
        } else {
            None
        };
        Ok(PostDetails { post, author, thread, forum })
    }

    /// An empty message, or one equal to the stored text, leaves the post untouched.
    pub async fn update(&self, id: Id, upd: UpdatePost) -> Result<Post, ApiError> {
        let post = self.get(id).await?;
        if upd.message.is_empty() || upd.message == post.message {
            return Ok(post);
        }
        self.repo.update_post_message(id, &upd.message).await.or_missing(Entity::Post, "id", id)
    }

    async fn get(&self, id: Id) -> Result<Post, ApiError> {
        self.repo.get_post(id).await.or_missing(Entity::Post, "id", id)
    }
}
