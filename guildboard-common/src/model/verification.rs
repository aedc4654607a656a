use crate::{
    model::{
        Id,
        user::{EmailAddress, UserMarker},
    },
    util::PositiveDuration,
};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const VERIFICATION_CODE_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum VerificationCodeDecodeError {
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The verification code has the wrong length")]
    InvalidLength,
}

/// Random code mailed to a user to prove they own an address.
///
/// Rendered as unpadded URL-safe base64 so it can sit in a path segment.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct VerificationCode([u8; VERIFICATION_CODE_LEN]);

impl VerificationCode {
    #[must_use]
    pub fn generate_random() -> Self {
        Self(rand::random())
    }
}

impl Display for VerificationCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&Base64Display::new(&self.0, &BASE64_URL_SAFE_NO_PAD), f)
    }
}

impl FromStr for VerificationCode {
    type Err = VerificationCodeDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(s)?
            .try_into()
            .map_err(|_| Self::Err::InvalidLength)?;

        Ok(Self(bytes))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct EmailVerification {
    pub user: Id<UserMarker>,
    pub email: EmailAddress,
    pub code: VerificationCode,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl EmailVerification {
    /// A fresh verification for `email`, valid for `valid_for` starting at `now`.
    #[must_use]
    pub fn issue(
        user: Id<UserMarker>,
        email: EmailAddress,
        valid_for: PositiveDuration,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            user,
            email,
            code: VerificationCode::generate_random(),
            created_at: now,
            expires_at: now + valid_for.get(),
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}
