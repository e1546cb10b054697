use rylie_shared::ThreadId;

/// Lifecycle of one thread's live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection. A retry may be pending.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    Connected,
    /// The credential was missing or rejected. Terminal until reopened.
    Unauthenticated,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transition broadcast by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub thread_id: ThreadId,
    pub state: ConnectionState,
    /// Consecutive failed attempts so far; reset on every successful handshake.
    pub attempt: u32,
}
