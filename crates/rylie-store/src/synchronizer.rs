//! Merge point for the three message sources of a thread.
//!
//! History pages, send responses and live pushes all go through the same
//! id-keyed merge, so the resulting log is identical whichever path wins a
//! race. After every change the ordered snapshot is republished on a `watch`
//! channel for the UI layer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rylie_shared::{Message, MessageId, ThreadId};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::{MergeOutcome, Origin};
use crate::thread_log::ThreadLog;

/// Immutable view of a thread log, shared with subscribers.
pub type Snapshot = Arc<[Message]>;

/// Owner of one thread's log. Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    // Never held across an await point.
    log: Mutex<ThreadLog>,
    snapshots: watch::Sender<Snapshot>,
}

impl Synchronizer {
    pub fn new(thread_id: ThreadId) -> Self {
        let (snapshots, _) = watch::channel(Snapshot::from(Vec::new()));
        Self {
            inner: Arc::new(Inner {
                log: Mutex::new(ThreadLog::new(thread_id)),
                snapshots,
            }),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.log().thread_id().clone()
    }

    /// Seed the log from a history page, or merge an older page on
    /// "load more". Returns the number of messages that were new.
    pub fn load_history(&self, messages: Vec<Message>) -> usize {
        let mut log = self.log();
        let received = messages.len();
        let inserted = log.merge_all(messages, Origin::History);

        info!(
            thread = %log.thread_id(),
            received,
            inserted,
            total = log.len(),
            "Merged history page"
        );

        if inserted > 0 {
            self.publish(&log);
        }
        inserted
    }

    /// Merge the canonical result of a successful send.
    pub fn record_sent(&self, message: Message) -> MergeOutcome {
        self.merge(message, Origin::SendResponse)
    }

    /// Merge a message delivered by the live channel.
    pub fn ingest_push(&self, message: Message) -> MergeOutcome {
        self.merge(message, Origin::LivePush)
    }

    /// Current ordered, deduplicated messages.
    pub fn snapshot(&self) -> Vec<Message> {
        self.log().messages()
    }

    /// Subscribe to snapshot updates. The receiver starts with the current
    /// snapshot marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Id of the oldest cached message, the cursor for older pages.
    pub fn oldest_id(&self) -> Option<MessageId> {
        self.log().oldest().map(|m| m.id.clone())
    }

    pub fn origin_of(&self, id: &MessageId) -> Option<Origin> {
        self.log().origin_of(id)
    }

    pub fn len(&self) -> usize {
        self.log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    fn merge(&self, message: Message, origin: Origin) -> MergeOutcome {
        let mut log = self.log();
        let msg_id = message.id.clone();
        let outcome = log.merge(message, origin);

        if let MergeOutcome::Inserted { index } = outcome {
            debug!(
                thread = %log.thread_id(),
                msg_id = %msg_id,
                origin = origin.as_str(),
                index,
                "Merged message"
            );
            self.publish(&log);
        }
        outcome
    }

    // Publishing under the log lock keeps snapshots in mutation order.
    fn publish(&self, log: &ThreadLog) {
        self.inner
            .snapshots
            .send_replace(Snapshot::from(log.messages()));
    }

    fn log(&self) -> MutexGuard<'_, ThreadLog> {
        self.inner.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let log = self.log();
        f.debug_struct("Synchronizer")
            .field("thread_id", log.thread_id())
            .field("len", &log.len())
            .finish()
    }
}
