use crate::models::{
    Forum, NewForum, NewPost, NewThread, NewUser, Post, PostDetails, Status, Thread, UpdatePost, UpdateThread,
    UpdateUser, User, Vote,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_user,
        crate::routes::get_user,
        crate::routes::update_user,
        crate::routes::create_forum,
        crate::routes::forum_details,
        crate::routes::create_thread,
        crate::routes::forum_threads,
        crate::routes::forum_users,
        crate::routes::thread_details,
        crate::routes::update_thread,
        crate::routes::vote,
        crate::routes::create_posts,
        crate::routes::thread_posts,
        crate::routes::post_details,
        crate::routes::update_post,
        crate::routes::clear,
        crate::routes::status,
    ),
    components(schemas(
        User, NewUser, UpdateUser, Forum, NewForum, Thread, NewThread, UpdateThread,
        Vote, Post, NewPost, UpdatePost, PostDetails, Status
    )),
    tags(
        (name = "users", description = "User profiles"),
        (name = "forums", description = "Forum operations"),
        (name = "threads", description = "Thread operations and voting"),
        (name = "posts", description = "Post batches, listings and edits"),
        (name = "service", description = "Maintenance"),
    )
)]
pub struct ApiDoc;
