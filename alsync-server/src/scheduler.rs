use crate::activity::{ActivityKind, ActivitySink};
use crate::coordinator::SharedRepository;
use crate::error::PushError;
use alsync_core::{RemoteCredential, DEFAULT_REMOTE, PUSH_REFSPEC};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// One push of every local branch to the configured remote. Used both by
/// the scheduler's ticks and by manual "push now" requests.
#[derive(Clone)]
pub struct Pusher {
    repo: SharedRepository,
    remote: String,
    refspec: String,
    credential: Arc<RemoteCredential>,
    cancel: CancellationToken,
    sink: Arc<dyn ActivitySink>,
}

impl Pusher {
    pub fn new(
        repo: SharedRepository,
        credential: RemoteCredential,
        cancel: CancellationToken,
        sink: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            repo,
            remote: DEFAULT_REMOTE.to_string(),
            refspec: PUSH_REFSPEC.to_string(),
            credential: Arc::new(credential),
            cancel,
            sink,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Pushes once. Waits for any in-flight commit to release the
    /// repository first. Refuses to push once the session is cancelled, even
    /// if the cancellation arrived while waiting for the repository.
    pub async fn push_now(&self) -> Result<(), PushError> {
        if self.cancel.is_cancelled() {
            return Err(PushError::SessionStopped);
        }

        self.sink.record(
            ActivityKind::PushAttempted,
            format!("Pushing all branches to {}", self.remote),
        );

        let repo = Arc::clone(&self.repo);
        let remote = self.remote.clone();
        let refspec = self.refspec.clone();
        let credential = Arc::clone(&self.credential);
        let cancel = self.cancel.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut repo = repo.blocking_lock();
            // The session may have stopped while a commit held the lock.
            if cancel.is_cancelled() {
                return Err(PushError::SessionStopped);
            }
            repo.push(&remote, &refspec, &credential)
                .map_err(|source| PushError::Push { remote, source })
        })
        .await
        .unwrap_or_else(|e| Err(PushError::Aborted(e.to_string())));

        match &result {
            Ok(()) => self.sink.record(
                ActivityKind::PushSucceeded,
                format!("Pushed changes to {}", self.remote),
            ),
            Err(e) => self
                .sink
                .record(ActivityKind::PushFailed, format!("Failed to push changes: {}", e)),
        }

        result
    }
}

/// Pushes on a fixed interval once started. Failed pushes are retried on the
/// next tick, forever, until the cancellation token fires.
pub struct PushScheduler {
    pusher: Pusher,
    period: Duration,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PushScheduler {
    pub fn new(pusher: Pusher, period: Duration, cancel: CancellationToken) -> Self {
        Self {
            pusher,
            period,
            cancel,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Flag observers can read to tell whether the tick loop is alive.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the tick loop unless it was already started. Returns whether
    /// this call started it.
    pub fn ensure_started(&mut self) -> bool {
        if self.task.is_some() || self.cancel.is_cancelled() {
            return false;
        }

        self.running.store(true, Ordering::SeqCst);
        self.task = Some(tokio::spawn(run(
            self.pusher.clone(),
            self.period,
            self.cancel.clone(),
            Arc::clone(&self.running),
        )));
        true
    }

    /// Cancels the loop and waits for it to exit. A push already underway is
    /// allowed to finish.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Push scheduler task failed: {}", e);
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn run(pusher: Pusher, period: Duration, cancel: CancellationToken, running: Arc<AtomicBool>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Failures are already in the activity log; the next tick retries.
                let _ = pusher.push_now().await;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!("Push scheduler for {} stopped", pusher.remote());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;
    use crate::coordinator::share;
    use crate::testing::{credential, eventually, RecordingRepository, RepoOp};

    const PERIOD: Duration = Duration::from_secs(3600);

    fn pusher(repo: &RecordingRepository, log: &Arc<ActivityLog>, cancel: &CancellationToken) -> Pusher {
        Pusher::new(share(repo.clone()), credential(), cancel.clone(), log.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_push_before_start() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let scheduler = PushScheduler::new(pusher(&repo, &log, &cancel), PERIOD, cancel.child_token());

        tokio::time::sleep(PERIOD * 3).await;

        assert!(!scheduler.is_running());
        assert_eq!(repo.pushes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_push_with_mirrored_refspec() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let mut scheduler =
            PushScheduler::new(pusher(&repo, &log, &cancel), PERIOD, cancel.child_token());

        assert!(scheduler.ensure_started());
        tokio::time::sleep(PERIOD / 2).await;
        assert_eq!(repo.pushes(), 0);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(
            repo.ops(),
            vec![RepoOp::Push {
                remote: "origin".to_string(),
                refspec: "refs/heads/*:refs/heads/*".to_string(),
                username: "alice".to_string(),
            }]
        );

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_push_does_not_stop_ticks() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let mut scheduler =
            PushScheduler::new(pusher(&repo, &log, &cancel), PERIOD, cancel.child_token());
        repo.fail_next_push("non-fast-forward");

        scheduler.ensure_started();
        tokio::time::sleep(PERIOD + Duration::from_secs(1)).await;
        tokio::time::sleep(PERIOD).await;

        assert_eq!(repo.pushes(), 2);
        assert!(scheduler.is_running());
        assert_eq!(
            log.kinds(),
            vec![
                ActivityKind::PushAttempted,
                ActivityKind::PushFailed,
                ActivityKind::PushAttempted,
                ActivityKind::PushSucceeded,
            ]
        );

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_started_is_idempotent() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let mut scheduler =
            PushScheduler::new(pusher(&repo, &log, &cancel), PERIOD, cancel.child_token());

        assert!(scheduler.ensure_started());
        assert!(!scheduler.ensure_started());
        assert!(!scheduler.ensure_started());

        tokio::time::sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(repo.pushes(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_ticks() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let mut scheduler =
            PushScheduler::new(pusher(&repo, &log, &cancel), PERIOD, cancel.child_token());

        scheduler.ensure_started();
        tokio::time::sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(repo.pushes(), 1);

        cancel.cancel();
        scheduler.shutdown().await;
        tokio::time::sleep(PERIOD * 3).await;

        assert_eq!(repo.pushes(), 1);
        assert!(!scheduler.is_running());
        assert!(!scheduler.ensure_started());
    }

    #[tokio::test]
    async fn test_manual_push_refused_after_cancel() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let pusher = pusher(&repo, &log, &cancel).with_remote("backup");

        pusher.push_now().await.unwrap();
        cancel.cancel();
        let result = pusher.push_now().await;

        assert!(matches!(result, Err(PushError::SessionStopped)));
        assert_eq!(repo.pushes(), 1);
        assert!(matches!(&repo.ops()[0], RepoOp::Push { remote, .. } if remote == "backup"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_push_and_commit_are_mutually_exclusive() {
        use crate::coordinator::CommitCoordinator;
        use alsync_core::{ChangeEvent, CommitAuthor, OperationKind};

        let repo = RecordingRepository::new().with_delay(Duration::from_millis(25));
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let shared = share(repo.clone());

        let pusher = Pusher::new(Arc::clone(&shared), credential(), cancel.clone(), log.clone());
        let mut coordinator = CommitCoordinator::new(
            shared,
            CommitAuthor::from_username("alice", None),
            log.clone(),
        );

        let event = ChangeEvent::new("Song.als", OperationKind::Write);
        let (committed, pushed) = tokio::join!(coordinator.on_change(&event), pusher.push_now());

        assert!(committed.is_ok());
        assert!(pushed.is_ok());
        assert_eq!(repo.overlaps(), 0);
        assert_eq!(repo.pushes(), 1);
        assert_eq!(repo.commits().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manual_push_refused_when_cancelled_while_waiting_for_lock() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let shared = share(repo.clone());
        let pusher = Pusher::new(Arc::clone(&shared), credential(), cancel.clone(), log.clone());

        let guard = shared.lock().await;
        let pending = tokio::spawn(async move { pusher.push_now().await });
        assert!(eventually(|| log.count(ActivityKind::PushAttempted) == 1).await);

        cancel.cancel();
        drop(guard);

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(PushError::SessionStopped)));
        assert_eq!(repo.pushes(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_lets_in_flight_push_finish() {
        let period = Duration::from_millis(50);
        let repo = RecordingRepository::new().with_delay(Duration::from_millis(200));
        let log = Arc::new(ActivityLog::new());
        let cancel = CancellationToken::new();
        let mut scheduler =
            PushScheduler::new(pusher(&repo, &log, &cancel), period, cancel.child_token());

        scheduler.ensure_started();
        assert!(eventually(|| repo.in_flight()).await);

        cancel.cancel();
        scheduler.shutdown().await;

        assert!(!repo.in_flight());
        assert_eq!(repo.pushes(), 1);
        assert_eq!(log.kinds().last(), Some(&ActivityKind::PushSucceeded));
        assert!(!scheduler.is_running());

        tokio::time::sleep(period * 4).await;
        assert_eq!(repo.pushes(), 1);
    }
}
