//! # alsync-server
//!
//! Watch session for alsync: watches an Ableton project directory, commits
//! every saved project file, pushes on a schedule and exposes a small local
//! control API for the CLI.

pub mod activity;
pub mod api;
pub mod coordinator;
pub mod error;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use activity::{ActivityEntry, ActivityKind, ActivityLog, ActivitySink};
pub use error::{CommitError, PushError, SessionError};
pub use server::AlsyncServer;
pub use session::{SessionHandle, SessionInfo, SessionOptions, SessionState, WatchSession};
pub use watcher::{FileNotifier, NotifyWatcher};
