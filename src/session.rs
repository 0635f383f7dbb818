//! Selection sessions
//!
//! After a query returns results, the user's next messages are interpreted
//! as a pick from the numbered list. Each user has at most one open
//! selection process-wide; a new query replaces it, an explicit "0"
//! cancels it, and an expiry timer clears it after a bounded wait.
//!
//! Teardown must be race-free against the timer: every session carries a
//! generation token, and a fired timer only clears state if its token is
//! still the current one. Timers are additionally aborted on teardown so a
//! replaced session's timer never fires at all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::record::ConventionRecord;

/// How long a text-mode selection stays open.
const TEXT_SELECTION_TTL: Duration = Duration::from_secs(15);

/// How long an image-mode selection stays open. Rendering an image takes
/// longer to read, so the window is wider.
const IMAGE_SELECTION_TTL: Duration = Duration::from_secs(30);

/// How the eventual detail view should be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Text,
    Image,
}

impl DisplayMode {
    fn ttl(self) -> Duration {
        match self {
            DisplayMode::Text => TEXT_SELECTION_TTL,
            DisplayMode::Image => IMAGE_SELECTION_TTL,
        }
    }
}

/// Emitted when a selection expires without a pick, so the bot can send
/// the timeout notice.
#[derive(Debug, Clone)]
pub struct SelectionExpiry {
    pub user_id: i64,
    pub chat_id: i64,
}

/// Outcome of offering an inbound message to the selection manager.
#[derive(Debug)]
pub enum Resolution {
    /// User sent "0": session closed, acknowledge the cancellation.
    Cancelled,
    /// Valid 1-based pick: session closed, show the detail view.
    Selected {
        record: ConventionRecord,
        mode: DisplayMode,
    },
    /// Not a valid pick: session stays open, timer untouched, but the
    /// message is still consumed.
    Invalid { count: usize },
}

struct OpenSelection {
    records: Vec<ConventionRecord>,
    mode: DisplayMode,
    chat_id: i64,
    generation: u64,
    timer: JoinHandle<()>,
}

/// Per-user selection state. One slot per user id, regardless of which
/// chat the query came from.
pub struct SelectionManager {
    sessions: RwLock<HashMap<i64, OpenSelection>>,
    generation: AtomicU64,
    expiry_tx: mpsc::Sender<SelectionExpiry>,
}

impl SelectionManager {
    /// Create the manager plus the receiver the bot drains for timeout
    /// notices.
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<SelectionExpiry>) {
        let (tx, rx) = mpsc::channel(buffer);
        let manager = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            expiry_tx: tx,
        });
        (manager, rx)
    }

    /// Open a selection for a user, replacing any existing one. The old
    /// session's timer is aborted before the new session is installed, so
    /// it can never clear the newer state.
    pub async fn open(
        self: &Arc<Self>,
        user_id: i64,
        chat_id: i64,
        records: Vec<ConventionRecord>,
        mode: DisplayMode,
    ) {
        let ttl = mode.ttl();
        self.open_with_ttl(user_id, chat_id, records, mode, ttl).await;
    }

    /// Open with an explicit expiry window. Exposed for tests.
    pub async fn open_with_ttl(
        self: &Arc<Self>,
        user_id: i64,
        chat_id: i64,
        records: Vec<ConventionRecord>,
        mode: DisplayMode,
        ttl: Duration,
    ) {
        let mut sessions = self.sessions.write().await;

        if let Some(old) = sessions.remove(&user_id) {
            old.timer.abort();
            debug!("Replaced open selection for user {}", user_id);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let manager = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(chat_id) = manager.expire(user_id, generation).await {
                let _ = manager
                    .expiry_tx
                    .send(SelectionExpiry { user_id, chat_id })
                    .await;
            }
        });

        sessions.insert(
            user_id,
            OpenSelection {
                records,
                mode,
                chat_id,
                generation,
                timer,
            },
        );
    }

    /// Offer an inbound message to the user's open selection, if any.
    /// `None` means no session exists and normal dispatch should proceed.
    ///
    /// A raw "0" cancels even though 0 is outside the valid range; the
    /// check is an exact string match, so "0 " with trailing whitespace is
    /// an invalid pick instead.
    pub async fn resolve(&self, user_id: i64, text: &str) -> Option<Resolution> {
        let mut sessions = self.sessions.write().await;
        let count = sessions.get(&user_id)?.records.len();

        if text == "0" {
            if let Some(open) = sessions.remove(&user_id) {
                open.timer.abort();
            }
            debug!("Selection cancelled by user {}", user_id);
            return Some(Resolution::Cancelled);
        }

        match text.trim().parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => {
                let open = sessions.remove(&user_id)?;
                open.timer.abort();
                let mode = open.mode;
                let record = open.records.into_iter().nth(n - 1)?;
                Some(Resolution::Selected { record, mode })
            }
            _ => Some(Resolution::Invalid { count }),
        }
    }

    /// Timer callback. Clears the session only when the stored generation
    /// still matches the timer's token; a timer racing a teardown that
    /// already happened is a no-op. Returns the chat to notify.
    async fn expire(&self, user_id: i64, generation: u64) -> Option<i64> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&user_id) {
            Some(open) if open.generation == generation => {
                let open = sessions.remove(&user_id).expect("entry checked above");
                debug!("Selection expired for user {}", user_id);
                Some(open.chat_id)
            }
            _ => None,
        }
    }

    /// Quietly tear down a user's open selection, if any. Query commands
    /// call this up front so a failed query does not leave a stale
    /// selection behind.
    pub async fn cancel(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(&user_id) {
            Some(open) => {
                open.timer.abort();
                debug!("Selection discarded for user {}", user_id);
                true
            }
            None => false,
        }
    }

    /// Whether a user currently has an open selection.
    pub async fn is_awaiting(&self, user_id: i64) -> bool {
        self.sessions.read().await.contains_key(&user_id)
    }
}
