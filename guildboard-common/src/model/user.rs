use crate::model::{Id, auth::PasswordHash};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_ADDRESS_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    pub is_verified_email: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub username: Username,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: PasswordHash,
}

/// A user together with the hash needed to check their password at login.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

/// Fields a user can change on their own profile. The email address is not one of them.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct ProfileChanges {
    pub username: Option<Username>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0}")]
pub struct InvalidUsernameError(String);

impl Username {
    /// Letters, digits and `@.+-_`, at most [`USERNAME_MAX_LEN`] characters.
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let length = username.chars().count();
        let allowed = username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));

        if (1..=USERNAME_MAX_LEN).contains(&length) && allowed {
            Ok(Self(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailAddressError(String);

impl EmailAddress {
    /// Accepts `local@domain` where neither side is empty.
    ///
    /// Whitespace and the URL delimiters `/?#%` are rejected so an address always fits in one
    /// path segment of a verification link.
    pub fn new(address: String) -> Result<Self, InvalidEmailAddressError> {
        let well_formed = match address.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };

        if well_formed
            && address.len() <= EMAIL_ADDRESS_MAX_LEN
            && !address
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
        {
            Ok(Self(address))
        } else {
            Err(InvalidEmailAddressError(address))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        EmailAddress::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"EmailAddress"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{EmailAddress, USERNAME_MAX_LEN, Username};

    #[test]
    fn usernames() {
        for legal in ["gandalf", "tank_main.2", "a+b@c-d", "Гном"] {
            assert!(Username::new(legal.to_owned()).is_ok(), "{legal}");
        }

        let too_long = "x".repeat(USERNAME_MAX_LEN + 1);
        for illegal in ["", "with space", "semi;colon", too_long.as_str()] {
            assert!(Username::new(illegal.to_owned()).is_err(), "{illegal}");
        }
    }

    #[test]
    fn email_addresses() {
        for legal in ["a@b.c", "healer+guild@mail.example.org"] {
            assert!(EmailAddress::new(legal.to_owned()).is_ok(), "{legal}");
        }

        for illegal in [
            "",
            "plain",
            "@host",
            "user@",
            "a@b@c",
            "a b@c.d",
            "a@.example",
            "a/b@c.d",
            "a@b.c?x",
            "a%40@b.c",
        ] {
            assert!(EmailAddress::new(illegal.to_owned()).is_err(), "{illegal}");
        }
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Username>("\"ok_name\"").is_ok());
        assert!(serde_json::from_str::<Username>("\"not ok\"").is_err());
        assert!(serde_json::from_str::<EmailAddress>("\"nope\"").is_err());
    }
}
