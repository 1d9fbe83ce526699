use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::models::*;
use crate::pagination::PageQuery;
use crate::repo::Repo;
use crate::usecase::{ForumUsecase, PostUsecase, ServiceUsecase, ThreadUsecase, UserUsecase};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req: &HttpRequest| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .service(
        web::scope("/api")
            .service(web::resource("/user/{nickname}/create").route(web::post().to(create_user)))
            .service(
                web::resource("/user/{nickname}/profile")
                    .route(web::get().to(get_user))
                    .route(web::post().to(update_user)),
            )
            .service(web::resource("/forum/create").route(web::post().to(create_forum)))
            .service(web::resource("/forum/{slug}/details").route(web::get().to(forum_details)))
            .service(web::resource("/forum/{slug}/create").route(web::post().to(create_thread)))
            .service(web::resource("/forum/{slug}/threads").route(web::get().to(forum_threads)))
            .service(web::resource("/forum/{slug}/users").route(web::get().to(forum_users)))
            .service(
                web::resource("/thread/{slug_or_id}/details")
                    .route(web::get().to(thread_details))
                    .route(web::post().to(update_thread)),
            )
            .service(web::resource("/thread/{slug_or_id}/vote").route(web::post().to(vote)))
            .service(web::resource("/thread/{slug_or_id}/create").route(web::post().to(create_posts)))
            .service(web::resource("/thread/{slug_or_id}/posts").route(web::get().to(thread_posts)))
            .service(
                web::resource("/post/{id}/details")
                    .route(web::get().to(post_details))
                    .route(web::post().to(update_post)),
            )
            .service(web::resource("/service/clear").route(web::post().to(clear)))
            .service(web::resource("/service/status").route(web::get().to(status))),
    );
}

pub struct AppState {
    pub users: UserUsecase,
    pub forums: ForumUsecase,
    pub threads: ThreadUsecase,
    pub posts: PostUsecase,
    pub service: ServiceUsecase,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self {
            users: UserUsecase::new(repo.clone()),
            forums: ForumUsecase::new(repo.clone()),
            threads: ThreadUsecase::new(repo.clone()),
            posts: PostUsecase::new(repo.clone()),
            service: ServiceUsecase::new(repo),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelatedQuery {
    /// Comma separated subset of user, forum, thread
    pub related: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/user/{nickname}/create",
    tag = "users",
    params(("nickname" = String, Path, description = "Nickname of the new user")),
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 409, description = "Nickname or email taken; body lists the colliding users", body = [User])
    )
)]
pub async fn create_user(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let user = data.users.create(&path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

#[utoipa::path(
    get,
    path = "/api/user/{nickname}/profile",
    tag = "users",
    params(("nickname" = String, Path, description = "User nickname")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let user = data.users.profile(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/user/{nickname}/profile",
    tag = "users",
    params(("nickname" = String, Path, description = "User nickname")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email belongs to another user")
    )
)]
pub async fn update_user(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateUser>,
) -> Result<HttpResponse, ApiError> {
    let user = data.users.update(&path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/forum/create",
    tag = "forums",
    request_body = NewForum,
    responses(
        (status = 201, description = "Forum created", body = Forum),
        (status = 404, description = "Owner not found"),
        (status = 409, description = "Slug taken; body is the existing forum", body = Forum)
    )
)]
pub async fn create_forum(data: web::Data<AppState>, payload: web::Json<NewForum>) -> Result<HttpResponse, ApiError> {
    let forum = data.forums.create(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(forum))
}

#[utoipa::path(
    get,
    path = "/api/forum/{slug}/details",
    tag = "forums",
    params(("slug" = String, Path, description = "Forum slug")),
    responses(
        (status = 200, description = "Forum", body = Forum),
        (status = 404, description = "Forum not found")
    )
)]
pub async fn forum_details(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let forum = data.forums.details(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(forum))
}

#[utoipa::path(
    post,
    path = "/api/forum/{slug}/create",
    tag = "threads",
    params(("slug" = String, Path, description = "Forum slug")),
    request_body = NewThread,
    responses(
        (status = 201, description = "Thread created", body = Thread),
        (status = 404, description = "Forum or author not found"),
        (status = 409, description = "Slug taken; body is the existing thread", body = Thread)
    )
)]
pub async fn create_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewThread>,
) -> Result<HttpResponse, ApiError> {
    let thread = data.threads.create(&path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(thread))
}

#[utoipa::path(
    get,
    path = "/api/forum/{slug}/threads",
    tag = "forums",
    params(("slug" = String, Path, description = "Forum slug"), PageQuery),
    responses(
        (status = 200, description = "Threads ordered by creation time", body = [Thread]),
        (status = 404, description = "Forum not found")
    )
)]
pub async fn forum_threads(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page::<DateTime<Utc>>()?;
    let threads = data.forums.threads(&path.into_inner(), &page).await?;
    Ok(HttpResponse::Ok().json(threads))
}

#[utoipa::path(
    get,
    path = "/api/forum/{slug}/users",
    tag = "forums",
    params(("slug" = String, Path, description = "Forum slug"), PageQuery),
    responses(
        (status = 200, description = "Users that posted in the forum, ordered by nickname", body = [User]),
        (status = 404, description = "Forum not found")
    )
)]
pub async fn forum_users(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page::<String>()?;
    let users = data.forums.users(&path.into_inner(), &page).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/thread/{slug_or_id}/details",
    tag = "threads",
    params(("slug_or_id" = String, Path, description = "Thread id or slug")),
    responses(
        (status = 200, description = "Thread", body = Thread),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn thread_details(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let thread = data.threads.details(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    post,
    path = "/api/thread/{slug_or_id}/details",
    tag = "threads",
    params(("slug_or_id" = String, Path, description = "Thread id or slug")),
    request_body = UpdateThread,
    responses(
        (status = 200, description = "Thread updated", body = Thread),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn update_thread(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateThread>,
) -> Result<HttpResponse, ApiError> {
    let thread = data.threads.update(&path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    post,
    path = "/api/thread/{slug_or_id}/vote",
    tag = "threads",
    params(("slug_or_id" = String, Path, description = "Thread id or slug")),
    request_body = Vote,
    responses(
        (status = 200, description = "Thread with the updated vote total", body = Thread),
        (status = 400, description = "Voice is not 1 or -1"),
        (status = 404, description = "Thread or user not found")
    )
)]
pub async fn vote(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<Vote>,
) -> Result<HttpResponse, ApiError> {
    let thread = data.threads.vote(&path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(thread))
}

#[utoipa::path(
    post,
    path = "/api/thread/{slug_or_id}/create",
    tag = "posts",
    params(("slug_or_id" = String, Path, description = "Thread id or slug")),
    request_body = [NewPost],
    responses(
        (status = 201, description = "Posts created in request order", body = [Post]),
        (status = 404, description = "Thread or author not found"),
        (status = 409, description = "Parent post not found in the thread")
    )
)]
pub async fn create_posts(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<Vec<NewPost>>,
) -> Result<HttpResponse, ApiError> {
    let posts = data.posts.create_batch(&path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(posts))
}

#[utoipa::path(
    get,
    path = "/api/thread/{slug_or_id}/posts",
    tag = "posts",
    params(("slug_or_id" = String, Path, description = "Thread id or slug"), PageQuery),
    responses(
        (status = 200, description = "Posts of the thread in the requested order", body = [Post]),
        (status = 400, description = "Unknown sort or malformed cursor"),
        (status = 404, description = "Thread not found")
    )
)]
pub async fn thread_posts(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let sort = query.sort()?;
    let page = query.page::<Id>()?;
    let posts = data.posts.list(&path.into_inner(), sort, &page).await?;
    Ok(HttpResponse::Ok().json(posts))
}

#[utoipa::path(
    get,
    path = "/api/post/{id}/details",
    tag = "posts",
    params(("id" = Id, Path, description = "Post id"), RelatedQuery),
    responses(
        (status = 200, description = "Post with the requested related entities", body = PostDetails),
        (status = 404, description = "Post not found")
    )
)]
pub async fn post_details(
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<RelatedQuery>,
) -> Result<HttpResponse, ApiError> {
    let related = Related::parse(query.related.as_deref().unwrap_or_default());
    let details = data.posts.details(path.into_inner(), related).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[utoipa::path(
    post,
    path = "/api/post/{id}/details",
    tag = "posts",
    params(("id" = Id, Path, description = "Post id")),
    request_body = UpdatePost,
    responses(
        (status = 200, description = "Post after the edit", body = Post),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdatePost>,
) -> Result<HttpResponse, ApiError> {
    let post = data.posts.update(path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

#[utoipa::path(
    post,
    path = "/api/service/clear",
    tag = "service",
    responses((status = 200, description = "Every table emptied", body = String))
)]
pub async fn clear(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    data.service.clear().await?;
    Ok(HttpResponse::Ok().json("Success"))
}

#[utoipa::path(
    get,
    path = "/api/service/status",
    tag = "service",
    responses((status = 200, description = "Row counts", body = Status))
)]
pub async fn status(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let status = data.service.status().await?;
    Ok(HttpResponse::Ok().json(status))
}
