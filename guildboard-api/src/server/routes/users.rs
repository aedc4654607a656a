use crate::{
    config::BoardSettings,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        json::{Created, Json},
        notify::Notifier,
    },
};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use guildboard_common::model::{
    Id,
    auth::{Password, Session, SessionToken},
    comment::Comment,
    post::Post,
    user::{CreateUser, EmailAddress, ProfileChanges, User, UserMarker, Username},
    verification::{EmailVerification, VerificationCode},
};
use guildboard_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(register)
        .typed_get(get_login)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(get_profile)
        .typed_put(update_profile)
        .typed_get(verify_email)
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: Username,
    pub email: EmailAddress,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: Password,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/register", rejection(ServerError))]
struct RegisterPath();

/// Creates an unverified user and mails them a verification link.
async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<Arc<dyn Store>>,
    State(notifier): State<Arc<Notifier>>,
    State(settings): State<Arc<BoardSettings>>,
    Json(form): Json<RegisterForm>,
) -> Result<Created<User>> {
    let new_user = CreateUser {
        username: form.username,
        email: form.email,
        first_name: form.first_name,
        last_name: form.last_name,
        password_hash: form.password.hash()?,
    };
    let user = store.create_user(&new_user).await?;

    info!(user = %user.id, username = %user.username, "User registered");

    let now = OffsetDateTime::now_utc();
    let purged = store.delete_expired_email_verifications(now).await?;
    debug!(purged, "Expired email verifications removed");

    let verification = EmailVerification::issue(
        user.id,
        user.email.clone(),
        settings.verification_ttl,
        now,
    );
    store.create_email_verification(&verification).await?;
    notifier.verification(&user, &verification).await?;

    Ok(Created(user))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct LoginPage {
    pub title: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/login", rejection(ServerError))]
struct LoginPath();

/// Where unauthenticated requests are redirected to.
async fn get_login(LoginPath(): LoginPath) -> Json<LoginPage> {
    Json(LoginPage {
        title: "Вход".to_owned(),
    })
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<BoardSettings>>,
    Json(form): Json<LoginForm>,
) -> Result<Json<LoginResponse>> {
    let username = Username::new(form.username).map_err(|_| ServerError::InvalidCredentials)?;
    let password = Password::new(form.password).map_err(|_| ServerError::InvalidCredentials)?;

    let Some(credentials) = store.fetch_credentials(&username).await? else {
        return Err(ServerError::InvalidCredentials);
    };

    if !password.matches(&credentials.password_hash) {
        warn!(user = %credentials.user.id, "Wrong password on login");
        return Err(ServerError::InvalidCredentials);
    }

    let now = OffsetDateTime::now_utc();
    let purged = store.delete_expired_sessions(now).await?;
    debug!(purged, "Expired sessions removed");

    let user = credentials.user;
    let token = SessionToken::generate_random(user.id);
    let session = Session {
        user: user.id,
        token_hash: token.hash()?,
        created_at: now,
        expires_after: Some(settings.session_ttl),
    };
    store.create_session(&session).await?;

    info!(user = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token: token.as_token_str(),
        user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    store.delete_session(user.token_hash()).await?;

    info!(user = %user.user_id(), "User logged out");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ProfilePage {
    pub title: String,
    pub user: User,
    pub posts: Vec<Post>,
    pub my_comments: Vec<Comment>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/profile/{id}", rejection(ServerError))]
struct ProfilePath {
    id: Id<UserMarker>,
}

fn check_profile_owner(id: Id<UserMarker>, user: &AuthenticatedUser) -> Result<()> {
    if id == user.user_id() {
        Ok(())
    } else {
        Err(ServerError::NotProfileOwner {
            user: user.user_id(),
            profile: id,
        })
    }
}

async fn get_profile(
    ProfilePath { id }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<ProfilePage>> {
    check_profile_owner(id, &user)?;

    let profile = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;
    let posts = store.fetch_user_posts(id).await?;
    let my_comments = store.fetch_user_comments(id).await?;

    Ok(Json(ProfilePage {
        title: "Личный кабинет".to_owned(),
        user: profile,
        posts,
        my_comments,
    }))
}

async fn update_profile(
    ProfilePath { id }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(changes): Json<ProfileChanges>,
) -> Result<Json<User>> {
    check_profile_owner(id, &user)?;

    let profile = store
        .update_profile(id, &changes)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    info!(user = %id, "Profile updated");

    Ok(Json(profile))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct VerifiedPage {
    pub title: String,
    pub user: User,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/verify/{email}/{code}", rejection(ServerError))]
struct VerifyEmailPath {
    email: String,
    code: String,
}

/// Consumes a verification link. Anything wrong with the code itself ends at the index.
async fn verify_email(
    VerifyEmailPath { email, code }: VerifyEmailPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<VerifiedPage>> {
    let address =
        EmailAddress::new(email.clone()).map_err(|_| ServerError::UserByEmailNotFound(email))?;
    let user = store
        .fetch_user_by_email(&address)
        .await?
        .ok_or_else(|| ServerError::UserByEmailNotFound(address.into_inner()))?;

    let code = code
        .parse::<VerificationCode>()
        .map_err(|_| ServerError::VerificationFailed)?;
    let verification = store
        .fetch_email_verification(user.id, &code)
        .await?
        .ok_or(ServerError::VerificationFailed)?;

    if verification.is_expired_at(OffsetDateTime::now_utc()) {
        info!(user = %user.id, expired_at = %verification.expires_at, "Verification code expired");
        return Err(ServerError::VerificationFailed);
    }

    store.complete_email_verification(user.id).await?;

    let user = store
        .fetch_user(user.id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(user.id))?;

    info!(user = %user.id, "Email verified");

    Ok(Json(VerifiedPage {
        title: "Адрес подтверждён".to_owned(),
        user,
    }))
}
