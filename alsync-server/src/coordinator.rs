use crate::activity::{ActivityKind, ActivitySink};
use crate::error::CommitError;
use alsync_core::{ChangeEvent, CommitAuthor, CommitRecord, ProjectRepository, COMMIT_MESSAGE};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The repository handle shared by the commit path and the push path. Every
/// mutation holds this lock for its whole duration.
pub type SharedRepository = Arc<Mutex<Box<dyn ProjectRepository>>>;

pub fn share<R: ProjectRepository + 'static>(repository: R) -> SharedRepository {
    Arc::new(Mutex::new(Box::new(repository)))
}

/// Turns accepted change events into commits, one at a time.
pub struct CommitCoordinator {
    repo: SharedRepository,
    author: CommitAuthor,
    sink: Arc<dyn ActivitySink>,
    commits: u64,
}

impl CommitCoordinator {
    pub fn new(repo: SharedRepository, author: CommitAuthor, sink: Arc<dyn ActivitySink>) -> Self {
        Self {
            repo,
            author,
            sink,
            commits: 0,
        }
    }

    /// Commits created so far by this coordinator.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Stages the whole working tree and commits it. The caller awaits each
    /// call before issuing the next, which keeps commits in acceptance order.
    pub async fn on_change(&mut self, event: &ChangeEvent) -> Result<CommitRecord, CommitError> {
        let repo = Arc::clone(&self.repo);
        let author = self.author.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut repo = repo.blocking_lock();
            repo.stage_all().map_err(CommitError::Stage)?;

            let timestamp = Utc::now();
            let revision = repo
                .commit(&author, COMMIT_MESSAGE, timestamp)
                .map_err(CommitError::Commit)?;

            Ok::<_, CommitError>(CommitRecord {
                author_name: author.name,
                author_email: author.email,
                message: COMMIT_MESSAGE.to_string(),
                timestamp,
                revision,
            })
        })
        .await
        .unwrap_or_else(|e| Err(CommitError::Aborted(e.to_string())));

        match &result {
            Ok(record) => {
                self.commits += 1;
                self.sink.record(
                    ActivityKind::CommitCreated,
                    format!(
                        "Created commit {} by {} <{}> for {}",
                        record.short_revision(),
                        record.author_name,
                        record.author_email,
                        event.path.display()
                    ),
                );
            }
            Err(e) => self.sink.record(
                ActivityKind::CommitFailed,
                format!("Commit for {} failed: {}", event.path.display(), e),
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;
    use crate::testing::{RecordingRepository, RepoOp};
    use alsync_core::OperationKind;
    use std::time::Duration;

    fn coordinator(repo: &RecordingRepository, log: &Arc<ActivityLog>) -> CommitCoordinator {
        CommitCoordinator::new(
            share(repo.clone()),
            CommitAuthor::from_username("alice", None),
            log.clone(),
        )
    }

    #[tokio::test]
    async fn test_single_event_single_commit() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let mut coordinator = coordinator(&repo, &log);

        let event = ChangeEvent::new("Song.als", OperationKind::Write);
        let record = coordinator.on_change(&event).await.unwrap();

        assert_eq!(record.author_name, "alice");
        assert_eq!(record.author_email, "alice@example.com");
        assert_eq!(record.message, COMMIT_MESSAGE);
        assert_eq!(record.revision, "rev-1");
        assert_eq!(coordinator.commits(), 1);

        assert_eq!(
            repo.ops(),
            vec![
                RepoOp::Stage,
                RepoOp::Commit {
                    revision: "rev-1".to_string(),
                    author: CommitAuthor::from_username("alice", None),
                    message: COMMIT_MESSAGE.to_string(),
                },
            ]
        );
        assert_eq!(log.kinds(), vec![ActivityKind::CommitCreated]);
    }

    #[tokio::test]
    async fn test_sequential_events_commit_in_order() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let mut coordinator = coordinator(&repo, &log);

        for _ in 0..3 {
            let event = ChangeEvent::new("Song.als", OperationKind::Write);
            coordinator.on_change(&event).await.unwrap();
        }

        assert_eq!(repo.commits(), vec!["rev-1", "rev-2", "rev-3"]);
        let stages_before_commits: Vec<bool> = repo
            .ops()
            .chunks(2)
            .map(|pair| pair[0] == RepoOp::Stage && matches!(pair[1], RepoOp::Commit { .. }))
            .collect();
        assert_eq!(stages_before_commits, vec![true, true, true]);
    }

    #[tokio::test]
    async fn test_failure_is_logged_and_coordinator_continues() {
        let repo = RecordingRepository::new();
        let log = Arc::new(ActivityLog::new());
        let mut coordinator = coordinator(&repo, &log);
        repo.fail_next_commit();

        let event = ChangeEvent::new("Song.als", OperationKind::Write);
        let error = coordinator.on_change(&event).await.unwrap_err();
        assert!(matches!(
            error,
            CommitError::Commit(alsync_core::Error::NothingToCommit)
        ));
        assert_eq!(coordinator.commits(), 0);

        let record = coordinator.on_change(&event).await.unwrap();
        assert_eq!(record.revision, "rev-1");
        assert_eq!(
            log.kinds(),
            vec![ActivityKind::CommitFailed, ActivityKind::CommitCreated]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_commit_never_overlaps_other_holder() {
        let repo = RecordingRepository::new().with_delay(Duration::from_millis(30));
        let log = Arc::new(ActivityLog::new());
        let shared = share(repo.clone());
        let mut coordinator = CommitCoordinator::new(
            Arc::clone(&shared),
            CommitAuthor::from_username("alice", None),
            log.clone(),
        );

        let other = Arc::clone(&shared);
        let competing = tokio::task::spawn_blocking(move || {
            let mut repo = other.blocking_lock();
            repo.stage_all().unwrap();
        });

        let event = ChangeEvent::new("Song.als", OperationKind::Write);
        coordinator.on_change(&event).await.unwrap();
        competing.await.unwrap();

        assert_eq!(repo.overlaps(), 0);
        assert_eq!(repo.commits(), vec!["rev-1"]);
    }
}
