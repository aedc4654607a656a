use crate::model::{
    Id,
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as _, Unexpected},
};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 255;
/// Longest file name kept from an upload, not counting the random prefix.
pub const ATTACHMENT_NAME_MAX_LEN: usize = 100;
/// Directory below the media root that post uploads land in.
pub const ATTACHMENT_DIR: &str = "posts";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub content: PostContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub title: PostTitle,
    pub category: Category,
    pub description: String,
    /// Media path of the file uploaded with the post, if any.
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// Editable part of a post. Attachments are fixed at creation.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostChanges {
    pub title: PostTitle,
    pub category: Category,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Tanks,
    Healers,
    DamageDealers,
    Traders,
    Guildmasters,
    Questgivers,
    Blacksmiths,
    Leatherworkers,
    PotionMakers,
    SpellMasters,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown post category: {0}")]
pub struct UnknownCategoryError(String);

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Tanks,
        Category::Healers,
        Category::DamageDealers,
        Category::Traders,
        Category::Guildmasters,
        Category::Questgivers,
        Category::Blacksmiths,
        Category::Leatherworkers,
        Category::PotionMakers,
        Category::SpellMasters,
    ];

    /// Stable identifier used in storage and JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tanks => "tanks",
            Category::Healers => "healers",
            Category::DamageDealers => "damage_dealers",
            Category::Traders => "traders",
            Category::Guildmasters => "guildmasters",
            Category::Questgivers => "questgivers",
            Category::Blacksmiths => "blacksmiths",
            Category::Leatherworkers => "leatherworkers",
            Category::PotionMakers => "potion_makers",
            Category::SpellMasters => "spell_masters",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategoryError(s.to_owned()))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct PostTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post title is invalid: {0:?}")]
pub struct InvalidPostTitleError(String);

impl PostTitle {
    pub fn new(title: String) -> Result<Self, InvalidPostTitleError> {
        let length = title.trim().chars().count();
        if length > 0 && title.chars().count() <= POST_TITLE_MAX_LEN {
            Ok(Self(title))
        } else {
            Err(InvalidPostTitleError(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for PostTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostTitle::new(inner)
            .map_err(|err| D::Error::invalid_value(Unexpected::Str(&err.0), &"PostTitle"))
    }
}

/// Path of an uploaded file relative to the media root, like `posts/3f0c9a1e7b2d4c58-map.png`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Attachment(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The attachment path is invalid: {0:?}")]
pub struct InvalidAttachmentError(String);

impl Attachment {
    /// Accepts `posts/<name>` where the name is a single safe file name.
    pub fn new(path: String) -> Result<Self, InvalidAttachmentError> {
        let valid = path
            .strip_prefix(ATTACHMENT_DIR)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|name| {
                !name.is_empty()
                    && !name.starts_with('.')
                    && name.chars().all(is_file_name_char)
            });

        if valid {
            Ok(Self(path))
        } else {
            Err(InvalidAttachmentError(path))
        }
    }

    /// Fresh path for a file uploaded as `file_name`. The random prefix keeps equal names apart.
    #[must_use]
    pub fn for_upload(file_name: &str) -> Self {
        let prefix: u64 = rand::random();
        Self(format!(
            "{ATTACHMENT_DIR}/{prefix:016x}-{}",
            sanitize_file_name(file_name)
        ))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

fn is_file_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let name: String = base
        .trim_start_matches('.')
        .chars()
        .map(|c| if is_file_name_char(c) { c } else { '_' })
        .take(ATTACHMENT_NAME_MAX_LEN)
        .collect();

    if name.is_empty() {
        "file".to_owned()
    } else {
        name
    }
}

impl Display for Attachment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Attachment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Attachment::new(inner)
            .map_err(|err| D::Error::invalid_value(Unexpected::Str(&err.0), &"Attachment"))
    }
}
