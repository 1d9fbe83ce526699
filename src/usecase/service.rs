use std::sync::Arc;

use tracing::warn;

use crate::error::ApiError;
use crate::models::Status;
use crate::repo::Repo;

#[derive(Clone)]
pub struct ServiceUsecase {
    repo: Arc<dyn Repo>,
}

impl ServiceUsecase {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// Drops every user, forum, thread, post and vote.
    pub async fn clear(&self) -> Result<(), ApiError> {
        self.repo.clear().await?;
        warn!("all data cleared");
        Ok(())
    }

    pub async fn status(&self) -> Result<Status, ApiError> {
        Ok(self.repo.status().await?)
    }
}
