//! Watch session lifecycle.
//!
//! A session owns one repository for its whole life. It subscribes to the
//! project directory, feeds accepted changes to the [`CommitCoordinator`]
//! one at a time, and starts the [`PushScheduler`] after the first commit
//! lands. Everything stops on a single cancellation signal:
//!
//! ```text
//! Idle -> Watching -> Stopping -> Stopped
//! ```

use crate::activity::{ActivityKind, ActivitySink};
use crate::coordinator::{share, CommitCoordinator};
use crate::error::{PushError, SessionError};
use crate::scheduler::{PushScheduler, Pusher};
use crate::watcher::{FileNotifier, Subscription, WatchMessage};
use alsync_core::{
    ChangeEvent, ChangeFilter, CommitAuthor, GitRepository, ProjectRepository, RemoteCredential,
    Settings, DEFAULT_PROJECT_EXTENSION, DEFAULT_REMOTE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Watching,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Watching => "watching",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session knobs that are not part of the repository itself.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub extension: String,
    pub remote: String,
    pub push_interval: Duration,
    pub author: CommitAuthor,
}

impl SessionOptions {
    pub fn new(author: CommitAuthor) -> Self {
        Self {
            extension: DEFAULT_PROJECT_EXTENSION.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            push_interval: Duration::from_secs(3600),
            author,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            extension: settings.project_extension.clone(),
            remote: settings.remote_name.clone(),
            push_interval: settings.push_interval(),
            author: settings.author(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub project_path: PathBuf,
    pub started: DateTime<Utc>,
}

pub struct WatchSession {
    filter: ChangeFilter,
    coordinator: CommitCoordinator,
    scheduler: PushScheduler,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionState>>,
    sink: Arc<dyn ActivitySink>,
}

impl WatchSession {
    /// Validates `settings`, opens the project repository (cloning it first
    /// if the project path does not exist) and starts watching.
    pub async fn launch<N: FileNotifier + ?Sized>(
        settings: &Settings,
        secret: &str,
        notifier: &N,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<SessionHandle, SessionError> {
        if let Err(e) = settings.validate(secret) {
            sink.record(ActivityKind::Fatal, format!("Cannot start session: {}", e));
            return Err(SessionError::Precondition(e));
        }

        let credential = settings.credential(secret);
        let path = settings.project_path.clone();
        let url = settings.remote_url.clone();
        let clone_credential = credential.clone();

        let opened = tokio::task::spawn_blocking(move || {
            GitRepository::open_or_clone(&path, &url, &clone_credential)
        })
        .await;

        let repo = match opened {
            Ok(Ok(repo)) => repo,
            Ok(Err(e)) => {
                sink.record(
                    ActivityKind::Fatal,
                    format!("Failed to prepare repository at {:?}: {}", settings.project_path, e),
                );
                return Err(SessionError::Repository(e));
            }
            Err(e) => {
                sink.record(ActivityKind::Fatal, format!("Repository setup aborted: {}", e));
                return Err(SessionError::Aborted(e.to_string()));
            }
        };

        Self::start(
            repo,
            credential,
            SessionOptions::from_settings(settings),
            notifier,
            sink,
        )
    }

    /// Subscribes to the repository's working directory and spawns the event
    /// loop. Must be called from within a Tokio runtime.
    pub fn start<R, N>(
        repo: R,
        credential: RemoteCredential,
        options: SessionOptions,
        notifier: &N,
        sink: Arc<dyn ActivitySink>,
    ) -> Result<SessionHandle, SessionError>
    where
        R: ProjectRepository + 'static,
        N: FileNotifier + ?Sized,
    {
        let root = repo.workdir().to_path_buf();
        let (state, _) = watch::channel(SessionState::Idle);
        let state = Arc::new(state);

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let subscription = match notifier.subscribe(&root, tx) {
            Ok(subscription) => subscription,
            Err(e) => {
                sink.record(
                    ActivityKind::Fatal,
                    format!("Failed to watch {:?}: {}", root, e),
                );
                return Err(SessionError::Subscribe {
                    path: root.display().to_string(),
                    message: e.to_string(),
                });
            }
        };

        let repo = share(repo);
        let cancel = CancellationToken::new();
        let pusher = Pusher::new(Arc::clone(&repo), credential, cancel.clone(), Arc::clone(&sink))
            .with_remote(options.remote.clone());
        let scheduler = PushScheduler::new(pusher.clone(), options.push_interval, cancel.child_token());
        let scheduler_running = scheduler.running_flag();

        let info = SessionInfo {
            id: Uuid::new_v4(),
            project_path: root.clone(),
            started: Utc::now(),
        };

        let session = WatchSession {
            filter: ChangeFilter::new(root.clone(), options.extension),
            coordinator: CommitCoordinator::new(repo, options.author, Arc::clone(&sink)),
            scheduler,
            cancel: cancel.clone(),
            state: Arc::clone(&state),
            sink: Arc::clone(&sink),
        };

        state.send_replace(SessionState::Watching);
        sink.record(
            ActivityKind::SessionStarted,
            format!("Watching {:?} (session {})", root, info.id),
        );

        tokio::spawn(session.run(events, subscription));

        Ok(SessionHandle {
            info,
            cancel,
            state,
            pusher,
            scheduler_running,
        })
    }

    async fn run(mut self, mut events: mpsc::Receiver<WatchMessage>, subscription: Subscription) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                message = events.recv() => match message {
                    Some(WatchMessage::Change(event)) => self.dispatch(event).await,
                    Some(WatchMessage::Error(e)) => {
                        self.sink.record(ActivityKind::WatchError, format!("File watcher error: {}", e));
                    }
                    None => {
                        self.sink.record(
                            ActivityKind::WatchError,
                            "File watcher closed its event stream".to_string(),
                        );
                        break;
                    }
                },
            }
        }

        self.cancel.cancel();
        self.state.send_replace(SessionState::Stopping);
        self.scheduler.shutdown().await;

        drop(events);
        drop(subscription);

        self.sink.record(
            ActivityKind::SessionStopped,
            format!("Stopped after {} commit(s)", self.coordinator.commits()),
        );
        self.state.send_replace(SessionState::Stopped);
    }

    async fn dispatch(&mut self, event: ChangeEvent) {
        if !self.filter.accept(&event) {
            debug!("Ignoring {} on {:?}", event.kind, event.path);
            return;
        }

        self.sink.record(
            ActivityKind::ChangeDetected,
            format!("Project file changed: {}", event.path.display()),
        );

        // Failures are already recorded; the next accepted change is the retry.
        if self.coordinator.on_change(&event).await.is_ok() && self.scheduler.ensure_started() {
            info!(
                "Push scheduler started, pushing every {:?}",
                self.scheduler.period()
            );
        }
    }
}

/// Caller's view of a running session.
pub struct SessionHandle {
    info: SessionInfo,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionState>>,
    pusher: Pusher,
    scheduler_running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_push_scheduler_running(&self) -> bool {
        self.scheduler_running.load(Ordering::SeqCst)
    }

    /// Signals every loop to stop. Safe to call any number of times. Returns
    /// without waiting; use [`SessionHandle::wait`] for that.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.state.send_if_modified(|state| {
            if *state == SessionState::Watching {
                *state = SessionState::Stopping;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once the session has fully stopped and released its
    /// subscription.
    pub async fn wait(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = state.wait_for(|s| *s == SessionState::Stopped).await;
    }

    /// One-shot push outside the scheduler's cadence.
    pub async fn push_now(&self) -> Result<(), PushError> {
        self.pusher.push_now().await
    }
}
