//! The persistence seam of the board.
//!
//! [`crate::client::DbClient`] implements [`Store`] on PostgreSQL,
//! [`crate::memory::MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use guildboard_common::model::{
    Id, ModelValidationError,
    auth::{Session, SessionTokenHash},
    comment::{Comment, CommentMarker, CreateComment},
    post::{CreatePost, Post, PostChanges, PostMarker},
    user::{CreateUser, EmailAddress, ProfileChanges, User, UserCredentials, UserMarker, Username},
    verification::{EmailVerification, VerificationCode},
};
use thiserror::Error;
use time::OffsetDateTime;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Column a uniqueness conflict happened on.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum UniqueField {
    Username,
    Email,
    Other,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A row with the same {0:?} already exists")]
    Duplicate(UniqueField),
    #[error("A referenced row does not exist")]
    MissingReference,
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_email(&self, email: &EmailAddress) -> Result<Option<User>>;

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<UserCredentials>>;

    /// Returns `None` if there is no such user.
    async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        changes: &ProfileChanges,
    ) -> Result<Option<User>>;

    async fn create_email_verification(&self, verification: &EmailVerification) -> Result<()>;

    async fn fetch_email_verification(
        &self,
        user_id: Id<UserMarker>,
        code: &VerificationCode,
    ) -> Result<Option<EmailVerification>>;

    /// Marks the user's email as verified and drops all their pending verifications.
    async fn complete_email_verification(&self, user_id: Id<UserMarker>) -> Result<()>;

    /// Drops verifications that expired at or before `now`. Returns how many were dropped.
    async fn delete_expired_email_verifications(&self, now: OffsetDateTime) -> Result<u64>;

    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>>;

    async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<()>;

    /// Drops sessions that expired at or before `now`. Returns how many were dropped.
    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64>;

    /// All posts, newest first.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>>;

    /// Returns whether a post was updated.
    async fn update_post(&self, post_id: Id<PostMarker>, changes: &PostChanges) -> Result<bool>;

    /// Deletes the post along with its comments. Returns whether it existed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>>;

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>>;

    async fn fetch_user_comments(&self, user_id: Id<UserMarker>) -> Result<Vec<Comment>>;

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Sets the comment's status to approved. Returns whether it existed.
    async fn approve_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool>;
}
