use crate::{
    config::BoardSettings,
    mail::MailError,
    media::{MediaError, MediaStore},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use guildboard_common::model::{
    Id,
    auth::{HashError, SessionTokenDecodeError},
    comment::CommentMarker,
    post::PostMarker,
    user::UserMarker,
};
use guildboard_db::store::{DbError, Store};
use json::Json;
use notify::Notifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

mod auth;
mod json;
pub mod notify;
mod routes;
#[cfg(test)]
mod tests;

pub const INDEX_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/posts/login";

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<Notifier>,
    pub settings: Arc<BoardSettings>,
    pub media: Arc<MediaStore>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Post form is invalid: {0}")]
    InvalidPostForm(String),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Media file {0} was not found.")]
    MediaNotFound(String),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided session token could not be decoded: {0}")]
    InvalidSessionToken(#[from] SessionTokenDecodeError),
    #[error("Session is unknown or expired")]
    InvalidSession,
    #[error("Username or password is wrong")]
    InvalidCredentials,
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Row was committed but the notification failed: {0}")]
    Notification(#[from] MailError),
    #[error("Email verification failed")]
    VerificationFailed,
    #[error("User {user} is not the author of post {post}")]
    NotPostAuthor {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    #[error("User {user} may not access the profile of user {profile}")]
    NotProfileOwner {
        user: Id<UserMarker>,
        profile: Id<UserMarker>,
    },
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentByIdNotFound(Id<CommentMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("User with email {0} was not found.")]
    UserByEmailNotFound(String),
}

impl ServerError {
    /// Where the client is sent instead of getting an error body, if anywhere.
    #[must_use]
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidSessionToken(_)
            | ServerError::InvalidSession => Some(LOGIN_PATH),
            ServerError::VerificationFailed => Some(INDEX_PATH),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidSessionToken(_)
            | ServerError::InvalidSession
            | ServerError::VerificationFailed => StatusCode::SEE_OTHER,
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::UserByEmailNotFound(_)
            | ServerError::MediaNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::NotPostAuthor { .. } | ServerError::NotProfileOwner { .. } => {
                StatusCode::FORBIDDEN
            }
            ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_)
            | ServerError::InvalidPostForm(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(DbError::Duplicate(_)) => StatusCode::CONFLICT,
            ServerError::JsonResponse(_)
            | ServerError::Hash(_)
            | ServerError::Database(_)
            | ServerError::Notification(_)
            | ServerError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Some(location) = self.redirect() {
            info!(reason = %self, location, "Redirecting");
            return Redirect::to(location).into_response();
        }

        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
