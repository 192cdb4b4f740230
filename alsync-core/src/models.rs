use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Message used for every automatic commit.
pub const COMMIT_MESSAGE: &str = "Ableton project file changed";

/// Domain used to synthesize an author email when none is configured.
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";

/// Remote every push targets unless configured otherwise.
pub const DEFAULT_REMOTE: &str = "origin";

/// Mirrors every local branch onto the same-named remote branch.
pub const PUSH_REFSPEC: &str = "refs/heads/*:refs/heads/*";

/// Version-control metadata directory. Changes inside it are never acted on.
pub const METADATA_DIR: &str = ".git";

/// Extension of Ableton Live set files.
pub const DEFAULT_PROJECT_EXTENSION: &str = "als";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
    Other,
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Write => "write",
            OperationKind::Remove => "remove",
            OperationKind::Rename => "rename",
            OperationKind::Chmod => "chmod",
            OperationKind::Other => "other",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single filesystem notification. Consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: OperationKind,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: OperationKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    /// Builds the author identity for a git username. Without a configured
    /// email, one is synthesized as `<username>@example.com`.
    pub fn from_username(username: &str, email: Option<&str>) -> Self {
        let email = match email {
            Some(email) if !email.trim().is_empty() => email.trim().to_string(),
            _ => format!("{}@{}", username, DEFAULT_EMAIL_DOMAIN),
        };

        Self {
            name: username.to_string(),
            email,
        }
    }
}

/// Outcome of one successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub revision: String,
}

impl CommitRecord {
    pub fn short_revision(&self) -> &str {
        let end = self.revision.len().min(7);
        &self.revision[..end]
    }
}

/// Username and secret used to authenticate against the remote.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredential {
    pub username: String,
    pub secret: String,
}

impl RemoteCredential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for RemoteCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
