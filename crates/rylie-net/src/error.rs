use thiserror::Error;

/// Failure of a single live channel handshake.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The server refused the credential (401/403). Retrying cannot help.
    #[error("Live channel rejected the credential")]
    Unauthorized,

    #[error("Live channel connect failed: {0}")]
    Transport(String),
}

/// Error on an established live channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Live channel error: {0}")]
pub struct TransportError(pub String);

/// Misuse of the supervisor itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("Thread id must not be empty")]
    EmptyThreadId,

    #[error("No credential available; live channel not opened")]
    Unauthenticated,

    #[error("Live channel for thread {0} is already open")]
    AlreadyOpen(String),
}
