use crate::{
    config::BoardSettings,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        notify::Notifier,
    },
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use guildboard_common::model::{
    Id,
    comment::{Comment, CommentBody, CommentMarker, CreateComment},
    post::PostMarker,
};
use guildboard_db::store::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(get_own_comments)
        .typed_get(get_post_comments)
        .typed_post(create_comment)
        .typed_get(get_comment)
        .typed_post(approve_comment)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommentForm {
    pub body: CommentBody,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comments", rejection(ServerError))]
struct OwnCommentsPath();

async fn get_own_comments(
    OwnCommentsPath(): OwnCommentsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Comment>>> {
    let comments = store.fetch_user_comments(user.user_id()).await?;

    Ok(Json(comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

/// Responses on a post are only shown to the post's author.
async fn get_post_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Comment>>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if post.author.id != user.user_id() {
        return Err(ServerError::NotPostAuthor {
            user: user.user_id(),
            post: id,
        });
    }

    let comments = store.fetch_post_comments(id).await?;

    Ok(Json(comments))
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(store): State<Arc<dyn Store>>,
    State(notifier): State<Arc<Notifier>>,
    user: AuthenticatedUser,
    Json(CommentForm { body }): Json<CommentForm>,
) -> Result<Created<Comment>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    let comment = CreateComment {
        author: user.user_id(),
        post: id,
        body,
    };
    let comment_id = match store.create_comment(&comment).await {
        Ok(comment_id) => comment_id,
        // The post was deleted in between.
        Err(DbError::MissingReference) => return Err(ServerError::PostByIdNotFound(id)),
        Err(err) => return Err(err.into()),
    };
    let comment = store
        .fetch_comment(comment_id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    info!(comment = %comment_id, post = %id, author = %comment.author.id, "Comment created");

    notifier.new_response(&post, &comment).await?;

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comments/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<CommentMarker>,
}

async fn get_comment(
    CommentPath { id }: CommentPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Comment>> {
    let comment = store
        .fetch_comment(id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))?;

    Ok(Json(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comments/{id}/approve", rejection(ServerError))]
struct ApproveCommentPath {
    id: Id<CommentMarker>,
}

async fn approve_comment(
    ApproveCommentPath { id }: ApproveCommentPath,
    State(store): State<Arc<dyn Store>>,
    State(notifier): State<Arc<Notifier>>,
    State(settings): State<Arc<BoardSettings>>,
    user: AuthenticatedUser,
) -> Result<Json<Comment>> {
    let comment = store
        .fetch_comment(id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))?;
    let post = store
        .fetch_post(comment.post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(comment.post_id))?;

    if settings.approval_requires_post_author && post.author.id != user.user_id() {
        return Err(ServerError::NotPostAuthor {
            user: user.user_id(),
            post: post.id,
        });
    }

    if !store.approve_comment(id).await? {
        return Err(ServerError::CommentByIdNotFound(id));
    }

    let comment = store
        .fetch_comment(id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))?;

    info!(comment = %id, approved_by = %user.user_id(), "Comment approved");

    notifier.response_accepted(&comment, &post).await?;

    Ok(Json(comment))
}
