/// Application name
pub const APP_NAME: &str = "Rylie";

/// Prefix of locally minted optimistic message ids
pub const PLACEHOLDER_ID_PREFIX: &str = "local-";

/// Default REST API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path of the history endpoint, relative to the API base. `{thread}` is replaced.
pub const HISTORY_PATH: &str = "/api/chat/threads/{thread}/messages";

/// Path of the send endpoint, relative to the API base
pub const SEND_PATH: &str = "/api/chat/messages";

/// Path of the live channel, relative to the WebSocket base. `{thread}` is replaced.
pub const LIVE_PATH: &str = "/ws/chat/{thread}";

/// Query parameter carrying the bearer token on the live channel
pub const LIVE_TOKEN_PARAM: &str = "token";

/// Default number of messages per history page
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

/// Default REST request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default live channel handshake timeout in seconds
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Default (base) reconnect delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound for exponential reconnect delays in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Proportional jitter applied on top of exponential reconnect delays
pub const DEFAULT_RETRY_JITTER: f64 = 0.2;

/// Capacity of the per-thread push queue between transport and synchronizer
pub const PUSH_QUEUE_CAPACITY: usize = 256;
