//! Ordered, duplicate-free message log for a single thread.
//!
//! Messages are kept sorted by `(created_at, id)`, with the first delivering
//! path recorded per id. The log only ever grows: a message whose id is
//! already known is discarded without touching the stored copy. Local
//! placeholder ids are never stored.

use std::collections::HashMap;

use rylie_shared::{Message, MessageId, ThreadId};
use tracing::{debug, warn};

use crate::models::{MergeOutcome, Origin};

/// Cached messages of one thread.
#[derive(Debug, Clone)]
pub struct ThreadLog {
    thread_id: ThreadId,
    entries: Vec<Message>,
    origins: HashMap<MessageId, Origin>,
}

impl ThreadLog {
    /// Create an empty log for `thread_id`.
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            entries: Vec::new(),
            origins: HashMap::new(),
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Merge a single message.
    ///
    /// # Arguments
    ///
    /// * `message` - The server form of the message
    /// * `origin` - The data path that delivered it
    pub fn merge(&mut self, message: Message, origin: Origin) -> MergeOutcome {
        if message.thread_id != self.thread_id {
            warn!(
                thread = %self.thread_id,
                foreign = %message.thread_id,
                msg_id = %message.id,
                origin = origin.as_str(),
                "Rejected message from another thread"
            );
            return MergeOutcome::ForeignThread;
        }

        if message.id.is_placeholder() {
            warn!(
                thread = %self.thread_id,
                msg_id = %message.id,
                origin = origin.as_str(),
                "Rejected message with a placeholder id"
            );
            return MergeOutcome::Placeholder;
        }

        if let Some(kept) = self.origins.get(&message.id) {
            debug!(
                thread = %self.thread_id,
                msg_id = %message.id,
                origin = origin.as_str(),
                kept = kept.as_str(),
                "Discarded duplicate message"
            );
            return MergeOutcome::Duplicate;
        }

        // Appending is the common case; partition_point handles both.
        let index = {
            let key = message.order_key();
            self.entries.partition_point(|entry| entry.order_key() < key)
        };

        self.origins.insert(message.id.clone(), origin);
        self.entries.insert(index, message);
        MergeOutcome::Inserted { index }
    }

    /// Merge a batch (typically a history page). Returns how many messages
    /// were new.
    pub fn merge_all<I>(&mut self, messages: I, origin: Origin) -> usize
    where
        I: IntoIterator<Item = Message>,
    {
        let mut inserted = 0;
        for message in messages {
            if self.merge(message, origin).is_inserted() {
                inserted += 1;
            }
        }
        inserted
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.origins.contains_key(id)
    }

    /// Path that delivered `id` first, if known.
    pub fn origin_of(&self, id: &MessageId) -> Option<Origin> {
        self.origins.get(id).copied()
    }

    /// Oldest cached message, used as the cursor for loading older pages.
    pub fn oldest(&self) -> Option<&Message> {
        self.entries.first()
    }

    pub fn newest(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered copy of the cached messages.
    pub fn messages(&self) -> Vec<Message> {
        self.entries.clone()
    }
}
