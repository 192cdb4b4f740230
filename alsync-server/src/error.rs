use thiserror::Error;

/// Failure of a single stage-and-commit. Never fatal to the session.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("failed to stage working tree: {0}")]
    Stage(#[source] alsync_core::Error),

    #[error("failed to create commit: {0}")]
    Commit(#[source] alsync_core::Error),

    #[error("commit task aborted: {0}")]
    Aborted(String),
}

/// Failure of a single push attempt. The next tick retries.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("push to {remote} failed: {source}")]
    Push {
        remote: String,
        #[source]
        source: alsync_core::Error,
    },

    #[error("session is stopping, push not started")]
    SessionStopped,

    #[error("push task aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid settings: {0}")]
    Precondition(#[source] alsync_core::Error),

    #[error("failed to prepare repository: {0}")]
    Repository(#[source] alsync_core::Error),

    #[error("failed to watch {path}: {message}")]
    Subscribe { path: String, message: String },

    #[error("repository setup aborted: {0}")]
    Aborted(String),
}
