use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::error::{ApiError, Entity, OrMissing};
use crate::models::{NewUser, UpdateUser, User};
use crate::repo::{Repo, RepoError};
use crate::validation;

#[derive(Clone)]
pub struct UserUsecase {
    repo: Arc<dyn Repo>,
}

impl UserUsecase {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo }
    }

    /// On a nickname or email collision the error carries every colliding user.
    pub async fn create(&self, nickname: &str, new: NewUser) -> Result<User, ApiError> {
        validation::nickname(nickname)?;
        new.validate()?;
        let user = User { nickname: nickname.to_string(), fullname: new.fullname, email: new.email, about: new.about };
        match self.repo.create_user(user.clone()).await {
            Ok(created) => {
                info!(nickname = %created.nickname, "user created");
                Ok(created)
            }
            Err(RepoError::Conflict) => {
                let existing = self.repo.list_users_by_nickname_or_email(&user.nickname, &user.email).await?;
                debug!(nickname = %user.nickname, conflicts = existing.len(), "user already exists");
                Err(ApiError::already_exists(&existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn profile(&self, nickname: &str) -> Result<User, ApiError> {
        self.repo.get_user(nickname).await.or_missing(Entity::User, "nickname", nickname)
    }

    pub async fn update(&self, nickname: &str, upd: UpdateUser) -> Result<User, ApiError> {
        upd.validate()?;
        let mut user = self.profile(nickname).await?;
        if !upd.fullname.is_empty() {
            user.fullname = upd.fullname;
        }
        if !upd.email.is_empty() {
            user.email = upd.email;
        }
        if !upd.about.is_empty() {
            user.about = upd.about;
        }
        match self.repo.update_user(user.clone()).await {
            Ok(updated) => Ok(updated),
            Err(RepoError::Conflict) => Err(ApiError::EmailAlreadyExists(user.email)),
            Err(e) => Err(e).or_missing(Entity::User, "nickname", nickname),
        }
    }
}
