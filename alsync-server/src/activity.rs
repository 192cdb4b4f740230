//! Activity log shared by every part of a watch session.
//!
//! Components never log to a global writer; they receive an
//! [`ActivitySink`] and report what they did. [`ActivityLog`] mirrors each
//! entry to `tracing` and keeps the most recent ones for the control API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{error, info, warn};

pub const DEFAULT_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    SessionStarted,
    ChangeDetected,
    CommitCreated,
    CommitFailed,
    PushAttempted,
    PushSucceeded,
    PushFailed,
    WatchError,
    Fatal,
    SessionStopped,
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::SessionStarted => "session_started",
            ActivityKind::ChangeDetected => "change_detected",
            ActivityKind::CommitCreated => "commit_created",
            ActivityKind::CommitFailed => "commit_failed",
            ActivityKind::PushAttempted => "push_attempted",
            ActivityKind::PushSucceeded => "push_succeeded",
            ActivityKind::PushFailed => "push_failed",
            ActivityKind::WatchError => "watch_error",
            ActivityKind::Fatal => "fatal",
            ActivityKind::SessionStopped => "session_stopped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub message: String,
}

pub trait ActivitySink: Send + Sync {
    fn record(&self, kind: ActivityKind, message: String);
}

#[derive(Default)]
struct LogState {
    entries: VecDeque<ActivityEntry>,
    counts: HashMap<ActivityKind, u64>,
}

/// Bounded in-memory activity log. Counters keep running totals even after
/// old entries have been evicted.
pub struct ActivityLog {
    capacity: usize,
    state: Mutex<LogState>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LogState::default()),
        }
    }

    /// Most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let state = self.lock();
        let skip = state.entries.len().saturating_sub(limit);
        state.entries.iter().skip(skip).cloned().collect()
    }

    #[cfg(test)]
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn kinds(&self) -> Vec<ActivityKind> {
        self.lock().entries.iter().map(|entry| entry.kind).collect()
    }

    pub fn count(&self, kind: ActivityKind) -> u64 {
        self.lock().counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn last(&self, kind: ActivityKind) -> Option<ActivityEntry> {
        self.lock()
            .entries
            .iter()
            .rev()
            .find(|entry| entry.kind == kind)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        // A panic while holding the lock cannot leave the log inconsistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivitySink for ActivityLog {
    fn record(&self, kind: ActivityKind, message: String) {
        match kind {
            ActivityKind::Fatal => error!(kind = kind.as_str(), "{}", message),
            ActivityKind::CommitFailed | ActivityKind::PushFailed | ActivityKind::WatchError => {
                warn!(kind = kind.as_str(), "{}", message)
            }
            _ => info!(kind = kind.as_str(), "{}", message),
        }

        let mut state = self.lock();
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(ActivityEntry {
            timestamp: Utc::now(),
            kind,
            message,
        });
        *state.counts.entry(kind).or_insert(0) += 1;
    }
}
