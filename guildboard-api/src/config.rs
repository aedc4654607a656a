use guildboard_common::util::{NonPositiveDurationError, PositiveDuration};
use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid expiry window: {0}")]
    Window(#[from] NonPositiveDurationError),
}

/// Everything the server reads from its environment.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database URL the board runs on the in-memory store.
    pub database_url: Option<String>,
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
    /// Without an SMTP host, mail is logged instead of sent.
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_verification_ttl_hours")]
    pub verification_ttl_hours: u32,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
    #[serde(default)]
    pub approval_requires_post_author: bool,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
}

fn default_public_url() -> String {
    "http://127.0.0.1:8000".to_owned()
}

fn default_mail_from() -> String {
    "noreply@guildboard.local".to_owned()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_verification_ttl_hours() -> u32 {
    48
}

fn default_session_ttl_hours() -> u32 {
    24 * 14
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

/// Board behavior that handlers consult at request time.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct BoardSettings {
    /// Base for links put into emails, without a trailing slash.
    pub public_url: String,
    pub verification_ttl: PositiveDuration,
    pub session_ttl: PositiveDuration,
    /// When set, only a post's author may approve responses to it.
    pub approval_requires_post_author: bool,
    /// Root directory of uploaded attachments.
    pub media_dir: PathBuf,
}

impl BoardSettings {
    pub fn from_env(env: &Env) -> Result<Self, ConfigError> {
        Ok(Self {
            public_url: env.public_url.trim_end_matches('/').to_owned(),
            verification_ttl: PositiveDuration::hours(env.verification_ttl_hours)?,
            session_ttl: PositiveDuration::hours(env.session_ttl_hours)?,
            approval_requires_post_author: env.approval_requires_post_author,
            media_dir: env.media_dir.clone(),
        })
    }
}

pub fn load_env() -> Result<Env, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(ConfigError::from)
}
