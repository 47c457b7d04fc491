//! Turns raw native events into classified [`WatchEvent`]s.
//!
//! Each session runs one consumer task ([`EventClassifier::run`]) over its raw
//! event queue:
//!
//! ```text
//! RawEvent ──► close flag? ──► debounce gate ──► in-flight permit ──► spawn
//!                                                                       │
//!               settle delay ◄──────────────────────────────────────────┘
//!                    │ fs::metadata
//!                    ▼
//!        Removed | DirAdded | FileChanged ──► handler hook ──► on_any
//! ```
//!
//! Settle tasks run concurrently, bounded by the session's permits, so hooks
//! for different paths may be called in any order. The consumer itself never
//! waits on a hook.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use dw_core::{ReactiveAdd, WatchConfig};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::events::{ChangeKind, RawEvent, WatchEvent};
use crate::handler::{SharedHandler, WatchDecision};
use crate::session::WatchSession;

/// Reads the filesystem to decide what happened at `path`.
///
/// A path that cannot be stat'ed (missing, or unreadable) counts as removed.
/// Symlinks are followed, so a link to a directory is reported as one.
pub async fn classify(path: &Utf8Path) -> ChangeKind {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => ChangeKind::DirAdded,
        Ok(_) => ChangeKind::FileChanged,
        Err(_) => ChangeKind::Removed,
    }
}

/// The consumer side of one session.
#[derive(Clone)]
pub(crate) struct EventClassifier {
    session: Arc<WatchSession>,
    handler: SharedHandler,
    settle: Duration,
    reactive_add: ReactiveAdd,
}

impl EventClassifier {
    pub(crate) fn new(
        session: Arc<WatchSession>,
        handler: SharedHandler,
        config: &WatchConfig,
    ) -> Self {
        Self {
            session,
            handler,
            settle: config.settle(),
            reactive_add: config.reactive_add,
        }
    }

    /// Consumes `events` until the session is closed or the queue ends, then
    /// releases the session's native handle.
    pub(crate) async fn run(self, mut events: mpsc::UnboundedReceiver<RawEvent>) {
        let closed = self.session.close_token();

        loop {
            let raw = tokio::select! {
                biased;
                () = closed.cancelled() => break,
                raw = events.recv() => match raw {
                    Some(raw) => raw,
                    None => break,
                },
            };

            if !self.session.debounce().admit(&raw.path, raw.received_at) {
                trace!(path = %raw.path, op = %raw.op, "Dropping duplicate event");
                continue;
            }

            let permits = Arc::clone(self.session.in_flight());
            let permit = tokio::select! {
                biased;
                () = closed.cancelled() => break,
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let classifier = self.clone();
            tokio::spawn(async move {
                classifier.settle_and_dispatch(raw).await;
                drop(permit);
            });
        }

        // Whatever is still queued is discarded with the receiver.
        drop(events);
        self.session.release_handle();
        debug!(root = %self.session.root(), "Event consumer stopped");
    }

    /// Runs to completion once spawned, even if the session closes meanwhile.
    async fn settle_and_dispatch(&self, raw: RawEvent) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        let kind = classify(&raw.path).await;
        let event = WatchEvent::new(raw.path, raw.op, kind);
        self.dispatch(&event).await;
    }

    async fn dispatch(&self, event: &WatchEvent) {
        let handler = Arc::clone(&*self.handler.read());
        trace!(event = %event, "Dispatching");

        match event.kind {
            ChangeKind::Removed => {
                if handler.on_remove(event) == WatchDecision::StopWatching {
                    self.drop_subscription(event.path.clone()).await;
                }
            }
            ChangeKind::DirAdded => {
                if handler.on_dir_add(event) == WatchDecision::KeepWatching {
                    self.watch_new_dir(event.path.clone()).await;
                }
            }
            ChangeKind::FileChanged => handler.on_file_change(event),
        }

        handler.on_any(event);
    }

    async fn watch_new_dir(&self, dir: Utf8PathBuf) {
        let session = Arc::clone(&self.session);
        let reactive_add = self.reactive_add;

        // notify's backends round-trip subscriptions through their own thread.
        let added = tokio::task::spawn_blocking(move || match reactive_add {
            ReactiveAdd::Shallow => usize::from(session.subscribe(&dir)),
            ReactiveAdd::Recursive => session.subscribe_tree(&dir),
        })
        .await;

        match added {
            Ok(added) => trace!(root = %self.session.root(), added, "Subscribed new directory"),
            Err(error) => warn!(error = %error, "Directory subscription task failed"),
        }
    }

    async fn drop_subscription(&self, path: Utf8PathBuf) {
        let session = Arc::clone(&self.session);
        let removed = tokio::task::spawn_blocking(move || session.unsubscribe(&path)).await;

        if let Err(error) = removed {
            warn!(error = %error, "Directory unsubscribe task failed");
        }
    }
}

impl std::fmt::Debug for EventClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClassifier")
            .field("root", &self.session.root())
            .field("settle", &self.settle)
            .field("reactive_add", &self.reactive_add)
            .finish_non_exhaustive()
    }
}
