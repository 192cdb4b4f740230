use alsync_core::{ChangeEvent, OperationKind};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::any::Any;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// What a notifier delivers to the session's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    Change(ChangeEvent),
    Error(String),
}

/// Keeps a filesystem subscription alive. Dropping it unsubscribes.
pub struct Subscription {
    _guard: Box<dyn Any + Send>,
}

impl Subscription {
    pub fn new<T: Send + 'static>(guard: T) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

pub trait FileNotifier: Send + Sync {
    /// Starts delivering change notifications for everything under `root`.
    fn subscribe(
        &self,
        root: &Path,
        events: mpsc::Sender<WatchMessage>,
    ) -> notify::Result<Subscription>;
}

/// OS-native recursive watcher, optionally debounced.
#[derive(Debug, Clone, Default)]
pub struct NotifyWatcher {
    debounce: Option<Duration>,
}

impl NotifyWatcher {
    pub fn new(debounce: Option<Duration>) -> Self {
        Self { debounce }
    }
}

impl FileNotifier for NotifyWatcher {
    fn subscribe(
        &self,
        root: &Path,
        events: mpsc::Sender<WatchMessage>,
    ) -> notify::Result<Subscription> {
        let subscription = match self.debounce {
            Some(window) => {
                let mut debouncer =
                    new_debouncer(window, None, move |result: DebounceEventResult| {
                        let messages = match result {
                            Ok(batch) => coalesce(batch.into_iter().map(|e| e.event)),
                            Err(errors) => errors
                                .into_iter()
                                .map(|e| WatchMessage::Error(e.to_string()))
                                .collect(),
                        };
                        deliver(&events, messages);
                    })?;

                debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
                Subscription::new(debouncer)
            }
            None => {
                let mut watcher =
                    notify::recommended_watcher(move |result: notify::Result<Event>| {
                        let messages = match result {
                            Ok(event) => coalesce(std::iter::once(event)),
                            Err(e) => vec![WatchMessage::Error(e.to_string())],
                        };
                        deliver(&events, messages);
                    })?;

                watcher.watch(root, RecursiveMode::Recursive)?;
                Subscription::new(watcher)
            }
        };

        info!("File watcher started for {:?}", root);
        Ok(subscription)
    }
}

fn deliver(events: &mpsc::Sender<WatchMessage>, messages: Vec<WatchMessage>) {
    for message in messages {
        // Runs on the notifier's own thread, outside the async runtime.
        if events.blocking_send(message).is_err() {
            debug!("Event channel closed, dropping notifications");
            return;
        }
    }
}

pub fn operation_kind(kind: &EventKind) -> OperationKind {
    match kind {
        EventKind::Create(_) => OperationKind::Create,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            OperationKind::Write
        }
        EventKind::Modify(ModifyKind::Name(_)) => OperationKind::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => OperationKind::Chmod,
        EventKind::Remove(_) => OperationKind::Remove,
        _ => OperationKind::Other,
    }
}

/// Flattens a batch of raw events into one message per path and kind,
/// keeping the order in which each pair first appeared.
fn coalesce(batch: impl IntoIterator<Item = Event>) -> Vec<WatchMessage> {
    let mut messages: Vec<WatchMessage> = Vec::new();

    for event in batch {
        let kind = operation_kind(&event.kind);
        for path in event.paths {
            let seen = messages.iter().any(|message| {
                matches!(message, WatchMessage::Change(c) if c.kind == kind && c.path == path)
            });
            if !seen {
                messages.push(WatchMessage::Change(ChangeEvent::new(path, kind)));
            }
        }
    }

    messages
}
