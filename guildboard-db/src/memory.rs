//! In-process [`Store`], for tests and for running the board without PostgreSQL.

use crate::store::{DbError, Result, Store, UniqueField};
use async_trait::async_trait;
use guildboard_common::model::{
    Id,
    auth::{PasswordHash, Session, SessionTokenHash},
    comment::{Comment, CommentBody, CommentMarker, CommentStatus, CreateComment},
    post::{CreatePost, Post, PostChanges, PostContent, PostMarker},
    user::{CreateUser, EmailAddress, ProfileChanges, User, UserCredentials, UserMarker, Username},
    verification::{EmailVerification, VerificationCode},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::OffsetDateTime;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    last_user_id: u64,
    last_post_id: u64,
    last_comment_id: u64,
    users: BTreeMap<Id<UserMarker>, UserRow>,
    email_verifications: Vec<EmailVerification>,
    sessions: Vec<Session>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: BTreeMap<Id<CommentMarker>, CommentRow>,
}

#[derive(Clone, Debug)]
struct UserRow {
    user: User,
    password_hash: PasswordHash,
}

#[derive(Clone, Debug)]
struct PostRow {
    author: Id<UserMarker>,
    content: PostContent,
    created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
struct CommentRow {
    author: Id<UserMarker>,
    post: Id<PostMarker>,
    body: CommentBody,
    status: CommentStatus,
    created_at: OffsetDateTime,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Every write leaves the tables consistent, so a poisoned lock is still usable.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tables {
    fn user(&self, user_id: Id<UserMarker>) -> Result<User> {
        self.users
            .get(&user_id)
            .map(|row| row.user.clone())
            .ok_or(DbError::MissingReference)
    }

    fn post(&self, post_id: Id<PostMarker>, row: &PostRow) -> Result<Post> {
        Ok(Post {
            id: post_id,
            author: self.user(row.author)?,
            content: row.content.clone(),
            created_at: row.created_at,
        })
    }

    fn comment(&self, comment_id: Id<CommentMarker>, row: &CommentRow) -> Result<Comment> {
        Ok(Comment {
            id: comment_id,
            author: self.user(row.author)?,
            post_id: row.post,
            body: row.body.clone(),
            status: row.status,
            created_at: row.created_at,
        })
    }

    fn posts_where(&self, keep: impl Fn(&PostRow) -> bool) -> Result<Vec<Post>> {
        self.posts
            .iter()
            .rev()
            .filter(|(_, row)| keep(row))
            .map(|(&post_id, row)| self.post(post_id, row))
            .collect()
    }

    fn comments_where(&self, keep: impl Fn(&CommentRow) -> bool) -> Result<Vec<Comment>> {
        self.comments
            .iter()
            .rev()
            .filter(|(_, row)| keep(row))
            .map(|(&comment_id, row)| self.comment(comment_id, row))
            .collect()
    }

    fn check_username_free(
        &self,
        username: &Username,
        except: Option<Id<UserMarker>>,
    ) -> Result<()> {
        let taken = self
            .users
            .iter()
            .any(|(&user_id, row)| Some(user_id) != except && row.user.username == *username);

        if taken {
            Err(DbError::Duplicate(UniqueField::Username))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables();

        tables.check_username_free(&user.username, None)?;
        if tables.users.values().any(|row| row.user.email == user.email) {
            return Err(DbError::Duplicate(UniqueField::Email));
        }

        tables.last_user_id += 1;
        let created = User {
            id: tables.last_user_id.into(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_verified_email: false,
        };
        tables.users.insert(
            created.id,
            UserRow {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );

        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables().users.get(&user_id).map(|row| row.user.clone()))
    }

    async fn fetch_user_by_email(&self, email: &EmailAddress) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|row| row.user.email == *email)
            .map(|row| row.user.clone()))
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<UserCredentials>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|row| row.user.username == *username)
            .map(|row| UserCredentials {
                user: row.user.clone(),
                password_hash: row.password_hash.clone(),
            }))
    }

    async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        changes: &ProfileChanges,
    ) -> Result<Option<User>> {
        let mut tables = self.tables();

        if let Some(username) = &changes.username {
            tables.check_username_free(username, Some(user_id))?;
        }

        let Some(row) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(username) = &changes.username {
            row.user.username = username.clone();
        }
        if let Some(first_name) = &changes.first_name {
            row.user.first_name.clone_from(first_name);
        }
        if let Some(last_name) = &changes.last_name {
            row.user.last_name.clone_from(last_name);
        }

        Ok(Some(row.user.clone()))
    }

    async fn create_email_verification(&self, verification: &EmailVerification) -> Result<()> {
        let mut tables = self.tables();

        tables.user(verification.user)?;
        tables.email_verifications.push(verification.clone());

        Ok(())
    }

    async fn fetch_email_verification(
        &self,
        user_id: Id<UserMarker>,
        code: &VerificationCode,
    ) -> Result<Option<EmailVerification>> {
        Ok(self
            .tables()
            .email_verifications
            .iter()
            .find(|verification| verification.user == user_id && verification.code == *code)
            .cloned())
    }

    async fn complete_email_verification(&self, user_id: Id<UserMarker>) -> Result<()> {
        let mut tables = self.tables();

        if let Some(row) = tables.users.get_mut(&user_id) {
            row.user.is_verified_email = true;
        }
        tables
            .email_verifications
            .retain(|verification| verification.user != user_id);

        Ok(())
    }

    async fn delete_expired_email_verifications(&self, now: OffsetDateTime) -> Result<u64> {
        let mut tables = self.tables();

        let before = tables.email_verifications.len();
        tables
            .email_verifications
            .retain(|verification| !verification.is_expired_at(now));

        Ok((before - tables.email_verifications.len()) as u64)
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables();

        tables.user(session.user)?;
        tables.sessions.push(session.clone());

        Ok(())
    }

    async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        Ok(self
            .tables()
            .sessions
            .iter()
            .find(|session| session.token_hash == *token_hash)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<()> {
        self.tables()
            .sessions
            .retain(|session| session.token_hash != *token_hash);

        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64> {
        let mut tables = self.tables();

        let before = tables.sessions.len();
        tables.sessions.retain(|session| !session.is_expired_at(now));

        Ok((before - tables.sessions.len()) as u64)
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        self.tables().posts_where(|_| true)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables();

        tables
            .posts
            .get(&post_id)
            .map(|row| tables.post(post_id, row))
            .transpose()
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        self.tables().posts_where(|row| row.author == user_id)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let mut tables = self.tables();

        tables.user(post.author)?;
        tables.last_post_id += 1;
        let post_id = tables.last_post_id.into();
        tables.posts.insert(
            post_id,
            PostRow {
                author: post.author,
                content: post.content.clone(),
                created_at: OffsetDateTime::now_utc(),
            },
        );

        Ok(post_id)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, changes: &PostChanges) -> Result<bool> {
        let mut tables = self.tables();

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        row.content.title = changes.title.clone();
        row.content.category = changes.category;
        row.content.description.clone_from(&changes.description);

        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables();

        let existed = tables.posts.remove(&post_id).is_some();
        tables.comments.retain(|_, row| row.post != post_id);

        Ok(existed)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let mut tables = self.tables();

        tables.user(comment.author)?;
        if !tables.posts.contains_key(&comment.post) {
            return Err(DbError::MissingReference);
        }

        tables.last_comment_id += 1;
        let comment_id = tables.last_comment_id.into();
        tables.comments.insert(
            comment_id,
            CommentRow {
                author: comment.author,
                post: comment.post,
                body: comment.body.clone(),
                status: CommentStatus::Unapproved,
                created_at: OffsetDateTime::now_utc(),
            },
        );

        Ok(comment_id)
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let tables = self.tables();

        tables
            .comments
            .get(&comment_id)
            .map(|row| tables.comment(comment_id, row))
            .transpose()
    }

    async fn fetch_user_comments(&self, user_id: Id<UserMarker>) -> Result<Vec<Comment>> {
        self.tables().comments_where(|row| row.author == user_id)
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        self.tables().comments_where(|row| row.post == post_id)
    }

    async fn approve_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let mut tables = self.tables();

        let Some(row) = tables.comments.get_mut(&comment_id) else {
            return Ok(false);
        };
        row.status.approve();

        Ok(true)
    }
}
