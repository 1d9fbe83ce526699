use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub type Id = i64;

/// Timestamp used for every store-assigned `created` value.
///
/// Postgres keeps microseconds and clients compare milliseconds, so values are
/// truncated once here and both stores return exactly what they persisted.
pub fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub nickname: String,
    pub fullname: String,
    pub email: String,
    #[serde(default)]
    pub about: String,
}

/// Body of `POST /api/user/{nickname}/create`; the nickname comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters long"))]
    pub fullname: String,
    #[validate(
        email(message = "is not a valid address"),
        length(max = 64, message = "must be at most 64 characters long")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 256, message = "must be at most 256 characters long"))]
    pub about: String,
}

/// Partial profile update. Empty fields keep their stored value, so the
/// name and address rules only apply to fields that are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "crate::validation::present_profile_fields"))]
pub struct UpdateUser {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 256, message = "must be at most 256 characters long"))]
    pub about: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Forum {
    pub title: String,
    #[sqlx(rename = "author")]
    pub user: String,
    pub slug: String,
    pub posts: i64,
    pub threads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewForum {
    #[validate(length(min = 1, message = "is required"))]
    pub title: String,
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters long"))]
    pub user: String,
    #[validate(length(min = 3, max = 64, message = "must be 3 to 64 characters long"))]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Thread {
    pub id: Id,
    pub title: String,
    pub author: String,
    pub forum: String,
    pub message: String,
    pub votes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub created: DateTime<Utc>,
}

/// Body of `POST /api/forum/{slug}/create`. The forum comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[validate(schema(function = "crate::validation::present_thread_slug"))]
pub struct NewThread {
    #[validate(length(min = 1, message = "is required"))]
    pub title: String,
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters long"))]
    pub author: String,
    #[validate(length(min = 1, message = "is required"))]
    pub message: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateThread {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub parent: Id,
    pub author: String,
    pub message: String,
    #[serde(rename = "isEdited")]
    #[sqlx(rename = "isedited")]
    pub is_edited: bool,
    pub forum: String,
    pub thread: Id,
    pub created: DateTime<Utc>,
}

/// One element of the `POST /api/thread/{slug_or_id}/create` array.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewPost {
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters long"))]
    pub author: String,
    #[validate(length(min = 1, message = "is required"))]
    pub message: String,
    #[serde(default)]
    pub parent: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePost {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct Vote {
    #[validate(length(min = 3, max = 32, message = "must be 3 to 32 characters long"))]
    pub nickname: String,
    pub voice: i32,
}

/// Response of `GET /api/post/{id}/details`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostDetails {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Status {
    pub user: i64,
    pub forum: i64,
    pub thread: i64,
    pub post: i64,
}

/// A thread path segment: numeric id when it parses as one, slug otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRef {
    Id(Id),
    Slug(String),
}

impl ThreadRef {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Id>() {
            Ok(id) => ThreadRef::Id(id),
            Err(_) => ThreadRef::Slug(raw.to_string()),
        }
    }

    /// Lookup key and value as they appear in "Can't find thread with ..." messages.
    pub fn describe(&self) -> (&'static str, String) {
        match self {
            ThreadRef::Id(id) => ("id", id.to_string()),
            ThreadRef::Slug(slug) => ("slug", slug.clone()),
        }
    }
}

/// Which related entities `GET /api/post/{id}/details` should embed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Related {
    pub user: bool,
    pub forum: bool,
    pub thread: bool,
}

impl Related {
    /// Parses the comma separated `related` query value; unknown items are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut related = Related::default();
        for item in raw.split(',').map(str::trim) {
            match item {
                "user" => related.user = true,
                "forum" => related.forum = true,
                "thread" => related.thread = true,
                _ => {}
            }
        }
        related
    }
}
