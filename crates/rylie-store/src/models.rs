//! Bookkeeping types kept alongside each cached message.

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Which data path delivered a message first. Internal only; never part of a
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    History,
    SendResponse,
    LivePush,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::History => "history",
            Origin::SendResponse => "send-response",
            Origin::LivePush => "live-push",
        }
    }
}

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// Result of merging one message into a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Inserted at `index` of the ordered log.
    Inserted { index: usize },
    /// A message with the same id was already present; nothing changed.
    Duplicate,
    /// The message belongs to another thread and was rejected.
    ForeignThread,
    /// The id is a local placeholder, which only the server form may replace.
    Placeholder,
}

impl MergeOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, MergeOutcome::Inserted { .. })
    }
}
