use thiserror::Error;

/// Rejections raised while validating data that crosses the wire.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("Server message carries local placeholder id {0}")]
    PlaceholderId(String),

    #[error("Message belongs to thread {actual}, expected {expected}")]
    ThreadMismatch { expected: String, actual: String },
}
