use crate::{
    record::{
        CommentRecord, CredentialsRecord, EmailVerificationRecord, PostRecord, SessionRecord,
        UserRecord,
    },
    store::{DbError, Result, Store, UniqueField},
};
use async_trait::async_trait;
use guildboard_common::model::{
    Id,
    auth::{Session, SessionTokenHash},
    comment::{Comment, CommentMarker, CreateComment},
    post::{Attachment, CreatePost, Post, PostChanges, PostMarker},
    user::{CreateUser, EmailAddress, ProfileChanges, User, UserCredentials, UserMarker, Username},
    verification::{EmailVerification, VerificationCode},
};
use sqlx::{PgPool, query, query_as, query_scalar};
use time::OffsetDateTime;
use tracing::debug;

macro_rules! user_columns {
    () => {
        "
        users.user_id,
        users.username,
        users.email,
        users.first_name,
        users.last_name,
        users.is_verified_email
        "
    };
}

macro_rules! select_posts {
    () => {
        concat!(
            "
            SELECT
                posts.post_id,
                posts.title,
                posts.category,
                posts.description,
                posts.attachment,
                posts.created_at,
            ",
            user_columns!(),
            "
            FROM
                posts.posts
                JOIN users.users ON users.user_id = posts.author_id
            "
        )
    };
}

macro_rules! select_comments {
    () => {
        concat!(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.body,
                comments.status,
                comments.created_at,
            ",
            user_columns!(),
            "
            FROM
                posts.comments
                JOIN users.users ON users.user_id = comments.author_id
            "
        )
    };
}

/// PostgreSQL-backed [`Store`].
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }
}

/// Turns constraint violations on writes into their [`DbError`] counterparts.
fn write_error(err: sqlx::Error) -> DbError {
    let violation = err.as_database_error().and_then(|db_err| {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_username_unique") => UniqueField::Username,
                Some("users_email_unique") => UniqueField::Email,
                _ => UniqueField::Other,
            };
            Some(DbError::Duplicate(field))
        } else if db_err.is_foreign_key_violation() {
            Some(DbError::MissingReference)
        } else {
            None
        }
    });

    violation.unwrap_or_else(|| err.into())
}

fn to_db_id<Marker>(id: Id<Marker>) -> i64 {
    id.get().cast_signed()
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(concat!(
            "
            INSERT INTO users.users (username, email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING
            ",
            user_columns!()
        ))
        .bind(user.username.get())
        .bind(user.email.get())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.password_hash.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(record.try_into()?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(concat!(
            "SELECT",
            user_columns!(),
            "FROM users.users WHERE users.user_id = $1"
        ))
        .bind(to_db_id(user_id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_email(&self, email: &EmailAddress) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(concat!(
            "SELECT",
            user_columns!(),
            "FROM users.users WHERE users.email = $1"
        ))
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_credentials(&self, username: &Username) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, CredentialsRecord>(concat!(
            "SELECT",
            user_columns!(),
            ", users.password_hash FROM users.users WHERE users.username = $1"
        ))
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn update_profile(
        &self,
        user_id: Id<UserMarker>,
        changes: &ProfileChanges,
    ) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(concat!(
            "
            UPDATE users.users
            SET
                username = COALESCE($2, username),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name)
            WHERE users.user_id = $1
            RETURNING
            ",
            user_columns!()
        ))
        .bind(to_db_id(user_id))
        .bind(changes.username.as_ref().map(Username::get))
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_email_verification(&self, verification: &EmailVerification) -> Result<()> {
        query(
            "
            INSERT INTO users.email_verifications (user_id, email, code, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(to_db_id(verification.user))
        .bind(verification.email.get())
        .bind(verification.code.to_string())
        .bind(verification.created_at)
        .bind(verification.expires_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn fetch_email_verification(
        &self,
        user_id: Id<UserMarker>,
        code: &VerificationCode,
    ) -> Result<Option<EmailVerification>> {
        let record = query_as::<_, EmailVerificationRecord>(
            "
            SELECT user_id, email, code, created_at, expires_at
            FROM users.email_verifications
            WHERE user_id = $1 AND code = $2
            ",
        )
        .bind(to_db_id(user_id))
        .bind(code.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let verification = record.map(EmailVerification::try_from).transpose()?;
        Ok(verification)
    }

    async fn complete_email_verification(&self, user_id: Id<UserMarker>) -> Result<()> {
        let mut transaction = self.pool.begin().await?;

        query("UPDATE users.users SET is_verified_email = TRUE WHERE user_id = $1")
            .bind(to_db_id(user_id))
            .execute(&mut *transaction)
            .await?;
        query("DELETE FROM users.email_verifications WHERE user_id = $1")
            .bind(to_db_id(user_id))
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(())
    }

    async fn delete_expired_email_verifications(&self, now: OffsetDateTime) -> Result<u64> {
        let result = query("DELETE FROM users.email_verifications WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        query(
            "
            INSERT INTO users.sessions (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(to_db_id(session.user))
        .bind(session.created_at)
        .bind(session.expires_after.map(|duration| duration.whole_seconds()))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(())
    }

    async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = query_as::<_, SessionRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM users.sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<()> {
        query("DELETE FROM users.sessions WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64> {
        let result = query(
            "
            DELETE FROM users.sessions
            WHERE
                expires_after_seconds IS NOT NULL
                AND created_at + make_interval(secs => expires_after_seconds) <= $1
            ",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "ORDER BY posts.created_at DESC, posts.post_id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "WHERE posts.post_id = $1"
        ))
        .bind(to_db_id(post_id))
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(concat!(
            select_posts!(),
            "WHERE posts.author_id = $1 ORDER BY posts.created_at DESC, posts.post_id DESC"
        ))
        .bind(to_db_id(user_id))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let returned_id = query_scalar::<_, i64>(
            "
            INSERT INTO posts.posts (author_id, title, category, description, attachment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING post_id
            ",
        )
        .bind(to_db_id(post.author))
        .bind(post.content.title.get())
        .bind(post.content.category.as_str())
        .bind(&post.content.description)
        .bind(post.content.attachment.as_ref().map(Attachment::get))
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(returned_id.cast_unsigned().into())
    }

    async fn update_post(&self, post_id: Id<PostMarker>, changes: &PostChanges) -> Result<bool> {
        let result = query(
            "
            UPDATE posts.posts
            SET title = $2, category = $3, description = $4
            WHERE post_id = $1
            ",
        )
        .bind(to_db_id(post_id))
        .bind(changes.title.get())
        .bind(changes.category.as_str())
        .bind(&changes.description)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE post_id = $1")
            .bind(to_db_id(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Id<CommentMarker>> {
        let returned_id = query_scalar::<_, i64>(
            "
            INSERT INTO posts.comments (post_id, author_id, body)
            VALUES ($1, $2, $3)
            RETURNING comment_id
            ",
        )
        .bind(to_db_id(comment.post))
        .bind(to_db_id(comment.author))
        .bind(comment.body.get())
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(returned_id.cast_unsigned().into())
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record = query_as::<_, CommentRecord>(concat!(
            select_comments!(),
            "WHERE comments.comment_id = $1"
        ))
        .bind(to_db_id(comment_id))
        .fetch_optional(&self.pool)
        .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    async fn fetch_user_comments(&self, user_id: Id<UserMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(concat!(
            select_comments!(),
            "WHERE comments.author_id = $1 ORDER BY comments.comment_id DESC"
        ))
        .bind(to_db_id(user_id))
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(concat!(
            select_comments!(),
            "WHERE comments.post_id = $1 ORDER BY comments.comment_id DESC"
        ))
        .bind(to_db_id(post_id))
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn approve_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let result = query("UPDATE posts.comments SET status = TRUE WHERE comment_id = $1")
            .bind(to_db_id(comment_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
