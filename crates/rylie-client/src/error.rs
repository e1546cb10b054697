use thiserror::Error;

use rylie_net::SupervisorError;
use rylie_shared::ProtocolError;

/// Failure of a REST call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 from the backend. Permanent until a new credential is supplied.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors surfaced to the code driving a thread view.
///
/// A failed send (`Send`) means the message was not stored. Connectivity is
/// never reported here; it only shows up as `ThreadView::is_connected`.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No credential available")]
    Unauthenticated,

    #[error("Thread id must not be empty")]
    EmptyThreadId,

    #[error("Could not load history: {0}")]
    History(#[source] ApiError),

    #[error("Message was not stored: {0}")]
    Send(#[source] ApiError),

    #[error("Live channel: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl ClientError {
    /// Whether a new credential is needed before retrying.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthenticated
                | ClientError::History(ApiError::Unauthorized)
                | ClientError::Send(ApiError::Unauthorized)
                | ClientError::Supervisor(SupervisorError::Unauthenticated)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
