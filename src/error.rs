use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::Value;

use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
}

/// Kind of entity a failed lookup was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Forum,
    Thread,
    Post,
    ParentPost,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Forum => "forum",
            Entity::Thread => "thread",
            Entity::Post => "post",
            Entity::ParentPost => "parent post",
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Wrong request data: {0}")]
    BadRequest(String),
    /// Detail is logged, never sent to the client.
    #[error("Something went wrong")]
    Internal(String),
    /// Body is the conflicting entity (or entities) echoed back.
    #[error("already exists")]
    AlreadyExists(Value),
    #[error("User with email {0} already exists")]
    EmailAlreadyExists(String),
    #[error("Can't find {entity} with {key} {value}")]
    DoesNotExist {
        entity: Entity,
        key: &'static str,
        value: String,
    },
}

impl ApiError {
    pub fn already_exists<T: Serialize>(conflicting: &T) -> Self {
        match serde_json::to_value(conflicting) {
            Ok(body) => ApiError::AlreadyExists(body),
            Err(e) => ApiError::Internal(format!("serialize conflicting entity: {e}")),
        }
    }

    pub fn does_not_exist(entity: Entity, key: &'static str, value: impl ToString) -> Self {
        ApiError::DoesNotExist { entity, key, value: value.to_string() }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::Internal("unexpected missing row".into()),
            RepoError::Conflict => ApiError::Internal("unexpected unique violation".into()),
            RepoError::ParentNotFound { thread } => {
                ApiError::does_not_exist(Entity::ParentPost, "thread id", thread)
            }
            RepoError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

/// Turns a single-row lookup's `NotFound` into the matching `DoesNotExist`.
pub trait OrMissing<T> {
    fn or_missing(self, entity: Entity, key: &'static str, value: impl ToString) -> Result<T, ApiError>;
}

impl<T> OrMissing<T> for Result<T, RepoError> {
    fn or_missing(self, entity: Entity, key: &'static str, value: impl ToString) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            RepoError::NotFound => ApiError::does_not_exist(entity, key, value),
            other => other.into(),
        })
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AlreadyExists(_) | ApiError::EmailAlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::DoesNotExist { entity: Entity::ParentPost, .. } => StatusCode::CONFLICT,
            ApiError::DoesNotExist { .. } => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::AlreadyExists(body) => HttpResponse::build(status).json(body),
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                HttpResponse::build(status).json(ApiErrorBody { message: self.to_string() })
            }
            _ => HttpResponse::build(status).json(ApiErrorBody { message: self.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parent_is_a_conflict() {
        let e = ApiError::does_not_exist(Entity::ParentPost, "id", 9);
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        assert_eq!(e.to_string(), "Can't find parent post with id 9");
    }

    #[test]
    fn missing_row_maps_through_or_missing() {
        let r: Result<(), RepoError> = Err(RepoError::NotFound);
        let e = r.or_missing(Entity::User, "nickname", "bob").unwrap_err();
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(e.to_string(), "Can't find user with nickname bob");
    }

    #[test]
    fn repo_failures_stay_internal() {
        let r: Result<(), RepoError> = Err(RepoError::Internal("connection reset".into()));
        let e = r.or_missing(Entity::Thread, "id", 1).unwrap_err();
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_string(), "Something went wrong");
    }

    #[test]
    fn insert_time_parent_failure_carries_thread() {
        let e: ApiError = RepoError::ParentNotFound { thread: 10 }.into();
        assert_eq!(e.to_string(), "Can't find parent post with thread id 10");
    }
}
