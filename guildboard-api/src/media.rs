//! Uploaded files on local disk.

use guildboard_common::model::post::Attachment;
use std::{io::ErrorKind, path::PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("Media storage failed: {0}")]
pub struct MediaError(#[from] std::io::Error);

/// Keeps attachments below one root directory, addressed by their [`Attachment`] path.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_of(&self, attachment: &Attachment) -> PathBuf {
        self.root.join(attachment.get())
    }

    pub async fn save(&self, attachment: &Attachment, bytes: &[u8]) -> Result<(), MediaError> {
        let path = self.path_of(attachment);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;

        debug!(%attachment, len = bytes.len(), "Attachment stored");

        Ok(())
    }

    /// Contents of the attachment, or `None` if no such file is stored.
    pub async fn read(&self, attachment: &Attachment) -> Result<Option<Vec<u8>>, MediaError> {
        match fs::read(self.path_of(attachment)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the file. Failures are only logged since the owning row is already gone.
    pub async fn discard(&self, attachment: &Attachment) {
        match fs::remove_file(self.path_of(attachment)).await {
            Ok(()) => debug!(%attachment, "Attachment removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(%err, %attachment, "Could not remove attachment"),
        }
    }
}
