use crate::model::{
    Id,
    post::PostMarker,
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as _, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

/// A response to a post.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub author: User,
    pub post_id: Id<PostMarker>,
    pub body: CommentBody,
    pub status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub author: Id<UserMarker>,
    pub post: Id<PostMarker>,
    pub body: CommentBody,
}

/// Whether the post author has accepted a response. Serialized as the `approved` flag.
///
/// There is no transition out of [`CommentStatus::Approved`].
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize,
)]
#[serde(from = "bool", into = "bool")]
pub enum CommentStatus {
    #[default]
    Unapproved,
    Approved,
}

impl CommentStatus {
    #[must_use]
    pub fn from_approved(approved: bool) -> Self {
        if approved {
            CommentStatus::Approved
        } else {
            CommentStatus::Unapproved
        }
    }

    #[must_use]
    pub fn is_approved(self) -> bool {
        self == CommentStatus::Approved
    }

    pub fn approve(&mut self) {
        *self = CommentStatus::Approved;
    }
}

impl From<bool> for CommentStatus {
    fn from(approved: bool) -> Self {
        Self::from_approved(approved)
    }
}

impl From<CommentStatus> for bool {
    fn from(status: CommentStatus) -> Self {
        status.is_approved()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentBody(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A comment needs a non-blank body")]
pub struct EmptyCommentBodyError;

impl CommentBody {
    pub fn new(body: String) -> Result<Self, EmptyCommentBodyError> {
        if body.trim().is_empty() {
            Err(EmptyCommentBodyError)
        } else {
            Ok(Self(body))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CommentBody {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentBody::new(inner)
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(""), &"a non-blank comment"))
    }
}
