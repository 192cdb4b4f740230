//! # alsync-core
//!
//! Core library for alsync - automatic version history for Ableton Live projects.
//!
//! This crate provides the data model, the change filter that decides which
//! filesystem events are worth a commit, settings persistence and the git
//! primitives (open, clone, stage, commit, push) the watch session drives.

pub mod error;
pub mod filter;
pub mod git;
pub mod models;
pub mod settings;

pub use error::{Error, Result};
pub use filter::ChangeFilter;
pub use git::{GitRepository, ProjectRepository};
pub use models::{
    ChangeEvent, CommitAuthor, CommitRecord, OperationKind, RemoteCredential, COMMIT_MESSAGE,
    DEFAULT_PROJECT_EXTENSION, DEFAULT_REMOTE, PUSH_REFSPEC,
};
pub use settings::Settings;
