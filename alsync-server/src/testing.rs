//! Test doubles shared by the coordinator, scheduler and session tests.

use crate::watcher::{FileNotifier, Subscription, WatchMessage};
use alsync_core::{ChangeEvent, CommitAuthor, OperationKind, ProjectRepository, RemoteCredential};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOp {
    Stage,
    Commit {
        revision: String,
        author: CommitAuthor,
        message: String,
    },
    Push {
        remote: String,
        refspec: String,
        username: String,
    },
}

#[derive(Default)]
struct RecorderState {
    ops: Vec<RepoOp>,
    push_failures: VecDeque<String>,
    commit_failures: usize,
    revisions: u64,
    in_flight: bool,
    overlaps: usize,
}

/// In-memory repository that records every operation and detects overlap
/// between them.
#[derive(Clone)]
pub struct RecordingRepository {
    workdir: PathBuf,
    delay: Duration,
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingRepository {
    pub fn new() -> Self {
        Self {
            workdir: PathBuf::from("/music/Song Project"),
            delay: Duration::ZERO,
            state: Arc::new(Mutex::new(RecorderState::default())),
        }
    }

    /// Every operation holds the repository for `delay` of real time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_next_push(&self, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .push_failures
            .push_back(reason.to_string());
    }

    pub fn fail_next_commit(&self) {
        self.state.lock().unwrap().commit_failures += 1;
    }

    pub fn ops(&self) -> Vec<RepoOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                RepoOp::Commit { revision, .. } => Some(revision),
                _ => None,
            })
            .collect()
    }

    pub fn pushes(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, RepoOp::Push { .. }))
            .count()
    }

    /// Whether an operation currently holds the repository.
    pub fn in_flight(&self) -> bool {
        self.state.lock().unwrap().in_flight
    }

    pub fn overlaps(&self) -> usize {
        self.state.lock().unwrap().overlaps
    }

    fn enter(&self) {
        let mut state = self.state.lock().unwrap();
        if state.in_flight {
            state.overlaps += 1;
        }
        state.in_flight = true;
        drop(state);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }

    fn leave(&self, op: RepoOp) {
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;
        state.ops.push(op);
    }
}

impl ProjectRepository for RecordingRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn stage_all(&mut self) -> alsync_core::Result<()> {
        self.enter();
        self.leave(RepoOp::Stage);
        Ok(())
    }

    fn commit(
        &mut self,
        author: &CommitAuthor,
        message: &str,
        _when: DateTime<Utc>,
    ) -> alsync_core::Result<String> {
        self.enter();
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;

        if state.commit_failures > 0 {
            state.commit_failures -= 1;
            return Err(alsync_core::Error::NothingToCommit);
        }

        state.revisions += 1;
        let revision = format!("rev-{}", state.revisions);
        state.ops.push(RepoOp::Commit {
            revision: revision.clone(),
            author: author.clone(),
            message: message.to_string(),
        });
        Ok(revision)
    }

    fn push(
        &mut self,
        remote: &str,
        refspec: &str,
        credential: &RemoteCredential,
    ) -> alsync_core::Result<()> {
        self.enter();
        self.leave(RepoOp::Push {
            remote: remote.to_string(),
            refspec: refspec.to_string(),
            username: credential.username.clone(),
        });

        match self.state.lock().unwrap().push_failures.pop_front() {
            Some(reason) => Err(alsync_core::Error::PushRejected {
                reference: "refs/heads/main".to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Notifier whose events are injected by the test.
#[derive(Default)]
pub struct ManualNotifier {
    sender: Mutex<Option<mpsc::Sender<WatchMessage>>>,
    live: Arc<AtomicUsize>,
    fail: bool,
}

impl ManualNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub async fn send(&self, message: WatchMessage) -> bool {
        let sender = self.sender.lock().unwrap().clone();
        match sender {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    pub async fn write(&self, path: &str) -> bool {
        self.send(WatchMessage::Change(ChangeEvent::new(path, OperationKind::Write)))
            .await
    }
}

impl FileNotifier for ManualNotifier {
    fn subscribe(
        &self,
        _root: &Path,
        events: mpsc::Sender<WatchMessage>,
    ) -> notify::Result<Subscription> {
        if self.fail {
            return Err(notify::Error::generic("inotify limit reached"));
        }

        *self.sender.lock().unwrap() = Some(events);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Subscription::new(LiveGuard(Arc::clone(&self.live))))
    }
}

/// Polls `condition` until it holds or a generous deadline passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn credential() -> RemoteCredential {
    RemoteCredential::new("alice", "token")
}
