pub mod auth;
pub mod comment;
pub mod post;
pub mod user;
pub mod verification;

use crate::{
    model::{
        auth::{InvalidPasswordHashError, InvalidSessionTokenHashError},
        comment::EmptyCommentBodyError,
        post::{InvalidAttachmentError, InvalidPostTitleError, UnknownCategoryError},
        user::{InvalidEmailAddressError, InvalidUsernameError},
        verification::VerificationCodeDecodeError,
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    EmailAddress(#[from] InvalidEmailAddressError),
    #[error(transparent)]
    PostTitle(#[from] InvalidPostTitleError),
    #[error(transparent)]
    Category(#[from] UnknownCategoryError),
    #[error(transparent)]
    Attachment(#[from] InvalidAttachmentError),
    #[error(transparent)]
    CommentBody(#[from] EmptyCommentBodyError),
    #[error(transparent)]
    VerificationCode(#[from] VerificationCodeDecodeError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    SessionTokenHash(#[from] InvalidSessionTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] InvalidPasswordHashError),
}

/// Database-assigned row id, tagged with the kind of row it identifies.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(u64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn id_is_transparent_in_json() {
        let id = Id::<PostMarker>::new(42);

        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("42").unwrap(), id);
    }
}
