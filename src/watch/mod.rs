//! Live change feed over the Messages store
//!
//! The OS notification callback only forwards a unit signal. A single task owns
//! the cursor, the pending-poll flag and the debounce deadline; every burst of
//! signals inside one debounce window collapses into exactly one poll. Polls run
//! on the blocking pool so signal handling never waits on SQLite.

use futures::Stream;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::model::{Message, MessageFilter};
use crate::store::MessageStore;

/// Sidecar files written by SQLite in WAL mode
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Quiet period between the first signal of a burst and the poll
    pub debounce: Duration,
    /// Maximum rows fetched per poll
    pub batch_limit: usize,
    /// Deliver tapback rows as messages carrying a `ReactionMarker`
    pub include_reactions: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            batch_limit: 100,
            include_reactions: false,
        }
    }
}

/// What to follow and where to start
#[derive(Debug, Clone, Default)]
pub struct WatchRequest {
    pub chat_id: Option<i64>,
    /// Exclusive starting cursor. `None` (or 0) starts at the current newest row.
    pub since_row_id: Option<i64>,
    pub filter: MessageFilter,
    pub options: WatchOptions,
}

/// Creates change streams over one store
#[derive(Clone)]
pub struct ChangeTracker {
    store: Arc<MessageStore>,
}

impl ChangeTracker {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self { store }
    }

    /// Subscribe to the store file and its sidecars and start streaming.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream(&self, request: WatchRequest) -> Result<WatchStream> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let watcher = subscribe(self.store.path(), signal_tx)?;
        Ok(self.spawn(request, signal_rx, Some(watcher)))
    }

    /// Stream driven by an explicit signal source instead of filesystem events
    pub(crate) fn stream_with_signals(
        &self,
        request: WatchRequest,
        signals: mpsc::UnboundedReceiver<()>,
    ) -> WatchStream {
        self.spawn(request, signals, None)
    }

    fn spawn(
        &self,
        request: WatchRequest,
        signals: mpsc::UnboundedReceiver<()>,
        watcher: Option<RecommendedWatcher>,
    ) -> WatchStream {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(request.options.batch_limit.max(1));
        let poller = Poller {
            store: Arc::clone(&self.store),
            chat_id: request.chat_id,
            filter: request.filter,
            include_reactions: request.options.include_reactions,
            batch_limit: request.options.batch_limit.max(1),
            cursor: request.since_row_id.filter(|&row_id| row_id > 0),
        };
        let task = tokio::spawn(run(
            poller,
            signals,
            tx,
            cancel.clone(),
            request.options.debounce,
            watcher,
        ));
        WatchStream { rx, cancel, task }
    }
}

// ============================================
// SUBSCRIPTION
// ============================================

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn signals_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watch the primary file (required) and each sidecar (best effort).
fn subscribe(path: &Path, signals: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if signals_change(&event.kind) => {
            // receiver gone means the stream is shutting down
            let _ = signals.send(());
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "file watch error"),
    })?;

    watcher.watch(path, RecursiveMode::NonRecursive)?;
    for suffix in SIDECAR_SUFFIXES {
        let sidecar = sidecar_path(path, suffix);
        if let Err(err) = watcher.watch(&sidecar, RecursiveMode::NonRecursive) {
            warn!(path = %sidecar.display(), error = %err, "not watching sidecar file");
        }
    }
    debug!(path = %path.display(), "watching message store");
    Ok(watcher)
}

// ============================================
// POLLING
// ============================================

struct Poller {
    store: Arc<MessageStore>,
    chat_id: Option<i64>,
    filter: MessageFilter,
    include_reactions: bool,
    batch_limit: usize,
    /// `None` until resolved against the store
    cursor: Option<i64>,
}

impl Poller {
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&MessageStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|_| StoreError::WorkerGone)?
    }

    async fn cursor(&mut self) -> Result<i64> {
        if let Some(cursor) = self.cursor {
            return Ok(cursor);
        }
        let latest = self.blocking(|store| store.max_row_id()).await?;
        debug!(cursor = latest, "starting from newest row");
        self.cursor = Some(latest);
        Ok(latest)
    }

    /// Rows strictly after the cursor, advancing it past every row returned.
    /// The flag reports a full batch, meaning more rows are probably waiting.
    async fn poll(&mut self) -> Result<(Vec<Message>, bool)> {
        let after = self.cursor().await?;
        let chat_id = self.chat_id;
        let filter = self.filter.clone();
        let include_reactions = self.include_reactions;
        let limit = self.batch_limit;
        let rows = self
            .blocking(move |store| {
                store.messages_after(after, chat_id, &filter, include_reactions, limit)
            })
            .await?;
        let saturated = rows.len() >= limit;

        // a message joined to several chats comes back once per chat
        let mut cursor = after;
        let mut fresh = Vec::with_capacity(rows.len());
        for message in rows {
            if message.row_id > cursor {
                cursor = message.row_id;
                fresh.push(message);
            }
        }
        self.cursor = Some(cursor);
        debug!(after, cursor, delivered = fresh.len(), "polled message store");
        Ok((fresh, saturated))
    }
}

async fn run(
    mut poller: Poller,
    mut signals: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<Result<Message>>,
    cancel: CancellationToken,
    debounce: Duration,
    watcher: Option<RecommendedWatcher>,
) {
    // Held for the task's lifetime; dropping it releases the OS handles.
    let _watcher = watcher;
    let mut signals_open = true;
    // first poll runs immediately
    let mut deadline = Some(Instant::now());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            signal = signals.recv(), if signals_open => match signal {
                Some(()) => {
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                None => {
                    signals_open = false;
                    if deadline.is_none() {
                        break;
                    }
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let (batch, saturated) = match poller.poll().await {
                    Ok(polled) => polled,
                    Err(err) => {
                        warn!(error = %err, "change stream failed");
                        let _ = tx.send(Err(err)).await;
                        break;
                    }
                };
                for message in batch {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = tx.send(Ok(message)) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
                if saturated {
                    deadline = Some(Instant::now());
                } else if !signals_open {
                    break;
                }
            }
        }
    }
    debug!("change stream stopped");
}

// ============================================
// STREAM
// ============================================

/// Ordered, cancellable feed of new messages.
///
/// Dropping the stream stops the background task and releases every watch handle.
/// A store failure is delivered once as an `Err`, after which the stream ends.
pub struct WatchStream {
    rx: mpsc::Receiver<Result<Message>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait until the background task has released its resources.
    pub async fn close(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Stream for WatchStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
