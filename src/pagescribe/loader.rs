//! Bulk thumbnail loading.
//!
//! After a document opens, the front-end wants every page's thumbnail without
//! blocking its own thread. [`spawn_thumbnail_loader`] walks the pages in
//! order on a background thread and hands results back over a channel; the
//! front-end drains the channel from its own thread and is the only one that
//! touches UI state.
//!
//! Loading is cancelled cooperatively. The token is checked before each page,
//! so cancelling skips the pages not yet started but never interrupts a
//! thumbnail that is already rendering.

use crate::session::Session;
use crate::tools::Toolkit;
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cancellation token for cooperative cancellation.
///
/// Clones share the same state: cancelling one cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailEvent {
    Ready { page: usize, path: PathBuf },
    /// The front-end is expected to show a placeholder for this page.
    Failed { page: usize, message: String },
}

impl ThumbnailEvent {
    pub fn page(&self) -> usize {
        match self {
            ThumbnailEvent::Ready { page, .. } | ThumbnailEvent::Failed { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Renders every page's thumbnail in ascending order, sending one event per
/// page. Stops early when `token` is cancelled, the session is closed, or
/// the receiving side hangs up.
pub fn load_thumbnails<T: Toolkit>(
    session: &Session<T>,
    token: &CancellationToken,
    events: &Sender<ThumbnailEvent>,
) -> LoadSummary {
    let mut summary = LoadSummary::default();

    for page in 0..session.page_count() {
        if token.is_cancelled() || session.is_closed() {
            summary.cancelled = true;
            break;
        }

        let event = match session.thumbnail(page) {
            Ok(path) => {
                summary.loaded += 1;
                ThumbnailEvent::Ready { page, path }
            }
            Err(e) => {
                summary.failed += 1;
                warn!("failed to load thumbnail for page {}: {}", page, e);
                ThumbnailEvent::Failed {
                    page,
                    message: e.to_string(),
                }
            }
        };

        if events.send(event).is_err() {
            summary.cancelled = true;
            break;
        }
    }

    debug!(
        "thumbnail loading finished: {} loaded, {} failed, cancelled={}",
        summary.loaded, summary.failed, summary.cancelled
    );
    summary
}

/// A running background loader.
pub struct ThumbnailLoader {
    token: CancellationToken,
    events: Receiver<ThumbnailEvent>,
    handle: Option<JoinHandle<LoadSummary>>,
}

/// Starts loading all thumbnails of `session` on a background thread.
pub fn spawn_thumbnail_loader<T: Toolkit + 'static>(
    session: Arc<Session<T>>,
    token: CancellationToken,
) -> ThumbnailLoader {
    let (tx, rx) = mpsc::channel();
    let worker_token = token.clone();
    let handle = thread::spawn(move || load_thumbnails(&session, &worker_token, &tx));

    ThumbnailLoader {
        token,
        events: rx,
        handle: Some(handle),
    }
}

impl ThumbnailLoader {
    /// Events produced so far, without blocking.
    pub fn drain(&self) -> Vec<ThumbnailEvent> {
        self.events.try_iter().collect()
    }

    /// Blocks until the next event; `None` once the loader has finished and
    /// every event was consumed.
    pub fn next_event(&self) -> Option<ThumbnailEvent> {
        self.events.recv().ok()
    }

    /// Waits for the loader to finish all pages.
    pub fn join(mut self) -> LoadSummary {
        self.wait()
    }

    /// Cancels loading and waits for the in-flight page to finish.
    pub fn cancel_and_join(mut self) -> LoadSummary {
        self.token.cancel();
        self.wait()
    }

    fn wait(&mut self) -> LoadSummary {
        match self.handle.take().map(|h| h.join()) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                warn!("thumbnail loader thread panicked");
                LoadSummary {
                    cancelled: true,
                    ..LoadSummary::default()
                }
            }
            None => LoadSummary::default(),
        }
    }
}

impl Drop for ThumbnailLoader {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
