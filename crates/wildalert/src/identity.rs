//! Session identity and the persisted session record.
//!
//! The identity provider itself is external. A successful sign-in leaves a
//! [`SessionRecord`] on disk; its presence is what lets the watcher start,
//! and its email is what the feed URL and alerts are keyed on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Who is signed in, as far as the feed and alert components care.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Email address of the signed-in user.
    pub email: String,
    /// Whether the identity provider vouched for this identity.
    pub authenticated: bool,
}

impl SessionIdentity {
    /// Create an authenticated identity for `email`.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            authenticated: true,
        }
    }

    /// The email, if it is non-empty after trimming.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        let email = self.email.trim();
        (!email.is_empty()).then_some(email)
    }
}

/// The persisted result of a sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque token issued by the identity provider.
    pub token: String,
    /// Provider-assigned user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Email of the signed-in user.
    pub email: String,
    /// When the record was written.
    pub signed_in_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(token: impl Into<String>, email: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            user_id,
            email: email.into(),
            signed_in_at: Utc::now(),
        }
    }

    /// The identity this record represents.
    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            email: self.email.clone(),
            authenticated: !self.token.is_empty(),
        }
    }
}

/// File-backed store for the single session record.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by `path`. Nothing is read until asked.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record, if any.
    ///
    /// A record with an empty token counts as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<SessionRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord = serde_json::from_str(&contents)?;
        if record.token.is_empty() {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Load the stored record or fail with [`Error::NotSignedIn`].
    ///
    /// # Errors
    ///
    /// Returns `NotSignedIn` when no record exists, or a read error.
    pub fn require(&self) -> Result<SessionRecord> {
        self.load()?.ok_or(Error::NotSignedIn)
    }

    /// Persist `record`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), email = %record.email, "Session record saved");
        Ok(())
    }

    /// Remove the stored record. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session record removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
