use crate::{
    media::MediaStore,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
    },
};
use axum::{
    Router,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use guildboard_common::model::{
    Id,
    post::{Attachment, Category, CreatePost, Post, PostChanges, PostContent, PostMarker, PostTitle},
};
use guildboard_db::store::Store;
use headers::{ContentType, HeaderMapExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Form field carrying the uploaded file.
const ATTACHMENT_FIELD: &str = "attachment";

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// A new post, sent as JSON or as `multipart/form-data` with an optional file.
struct PostForm {
    changes: PostChanges,
    upload: Option<Upload>,
}

fn required_field(value: Option<String>, name: &str) -> Result<String> {
    value.ok_or_else(|| ServerError::InvalidPostForm(format!("missing field {name}")))
}

impl PostForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut title = None;
        let mut category = None;
        let mut description = None;
        let mut upload = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "title" => title = Some(field.text().await?),
                "category" => category = Some(field.text().await?),
                "description" => description = Some(field.text().await?),
                ATTACHMENT_FIELD => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        upload = Some(Upload { file_name, bytes });
                    }
                }
                _ => debug!(field = %name, "Ignoring unknown post form field"),
            }
        }

        let title = PostTitle::new(required_field(title, "title")?)
            .map_err(|err| ServerError::InvalidPostForm(err.to_string()))?;
        let category = required_field(category, "category")?
            .parse::<Category>()
            .map_err(|err| ServerError::InvalidPostForm(err.to_string()))?;
        let description = required_field(description, "description")?;

        Ok(Self {
            changes: PostChanges {
                title,
                category,
                description,
            },
            upload,
        })
    }
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .typed_get::<ContentType>()
            .is_some_and(|content_type| {
                content_type
                    .to_string()
                    .starts_with("multipart/form-data")
            });

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await?;
            Self::from_multipart(multipart).await
        } else {
            let Json(changes) = Json::<PostChanges>::from_request(req, state).await?;
            Ok(Self {
                changes,
                upload: None,
            })
        }
    }
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    PostForm { changes, upload }: PostForm,
) -> Result<Created<Post>> {
    let attachment = match upload {
        Some(Upload { file_name, bytes }) => {
            let attachment = Attachment::for_upload(&file_name);
            media.save(&attachment, &bytes).await?;
            Some(attachment)
        }
        None => None,
    };

    let post = CreatePost {
        author: user.user_id(),
        content: PostContent {
            title: changes.title,
            category: changes.category,
            description: changes.description,
            attachment,
        },
    };
    let id = match store.create_post(&post).await {
        Ok(id) => id,
        Err(err) => {
            if let Some(attachment) = &post.content.attachment {
                media.discard(attachment).await;
            }
            return Err(err.into());
        }
    };
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    info!(
        post = %id,
        author = %post.author.id,
        attachment = ?post.content.attachment.as_ref().map(Attachment::get),
        "Post created"
    );

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Post>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

/// Loads the post and checks that `user` wrote it.
async fn fetch_own_post(
    store: &dyn Store,
    id: Id<PostMarker>,
    user: &AuthenticatedUser,
) -> Result<Post> {
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

    Ok(post)
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(changes): Json<PostChanges>,
) -> Result<Json<Post>> {
    fetch_own_post(&*store, id, &user).await?;

    if !store.update_post(id, &changes).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }

    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    info!(post = %id, "Post updated");

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    let post = fetch_own_post(&*store, id, &user).await?;

    if !store.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }

    if let Some(attachment) = &post.content.attachment {
        media.discard(attachment).await;
    }

    info!(post = %id, "Post deleted");

    Ok(StatusCode::NO_CONTENT)
}
