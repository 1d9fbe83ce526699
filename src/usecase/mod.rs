//! Business rules between the HTTP handlers and the repositories: existence
//! checks, conflict reporting and the translation of [`RepoError`] into
//! [`ApiError`](crate::error::ApiError).
//!
//! [`RepoError`]: crate::repo::RepoError

use std::sync::Arc;

use crate::error::{ApiError, Entity, OrMissing};
use crate::models::{Thread, ThreadRef};
use crate::repo::Repo;

pub mod forum;
pub mod post;
pub mod service;
pub mod thread;
pub mod user;

pub use forum::ForumUsecase;
pub use post::PostUsecase;
pub use service::ServiceUsecase;
pub use thread::ThreadUsecase;
pub use user::UserUsecase;

/// Resolves a `{slug_or_id}` path segment, integer parse first.
pub(crate) async fn resolve_thread(repo: &Arc<dyn Repo>, raw: &str) -> Result<Thread, ApiError> {
    let thread = ThreadRef::parse(raw);
    let (key, value) = thread.describe();
    repo.get_thread(&thread).await.or_missing(Entity::Thread, key, value)
}
