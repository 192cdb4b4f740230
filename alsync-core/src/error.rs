use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not a git repository: {0}")]
    RepositoryNotFound(PathBuf),

    #[error("Repository has no working directory: {0}")]
    BareRepository(PathBuf),

    #[error("Failed to clone {url}: {source}")]
    CloneFailed {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Nothing to commit, working tree unchanged")]
    NothingToCommit,

    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    #[error("No local branches to push")]
    NoBranches,

    #[error("Push of {reference} rejected: {reason}")]
    PushRejected { reference: String, reason: String },

    #[error("Authentication rejected for user {0}")]
    AuthenticationFailed(String),

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid refspec: {0}")]
    InvalidRefspec(String),
}
