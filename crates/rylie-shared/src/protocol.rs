//! Wire payloads exchanged with the chat backend.
//!
//! Everything arriving from the network is decoded into closed, typed
//! structures and validated here, so malformed data is rejected before it can
//! reach a thread log.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{Message, MessageId, ThreadId};

/// Query string of the history endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: u32,
    /// Only return messages strictly older than this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<MessageId>,
}

/// One page of thread history, ordered oldest to newest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
}

impl HistoryPage {
    /// Check every message and make sure the page only covers `thread_id`.
    pub fn validate(&self, thread_id: &ThreadId) -> Result<(), ProtocolError> {
        for message in &self.messages {
            validate_message(message)?;
            ensure_thread(message, thread_id)?;
        }
        Ok(())
    }
}

/// Body of the send endpoint. A missing `thread_id` asks the server to
/// create a new thread.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response of the send endpoint: the stored form of the message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponse {
    pub message: Message,
}

impl SendResponse {
    pub fn validate(&self, thread_id: Option<&ThreadId>) -> Result<(), ProtocolError> {
        validate_message(&self.message)?;
        if let Some(expected) = thread_id {
            ensure_thread(&self.message, expected)?;
        }
        Ok(())
    }
}

/// Structural checks serde cannot express.
pub fn validate_message(message: &Message) -> Result<(), ProtocolError> {
    if message.id.as_str().trim().is_empty() {
        return Err(ProtocolError::EmptyField("id"));
    }
    if message.id.is_placeholder() {
        return Err(ProtocolError::PlaceholderId(message.id.to_string()));
    }
    if message.thread_id.is_empty() {
        return Err(ProtocolError::EmptyField("threadId"));
    }
    Ok(())
}

fn ensure_thread(message: &Message, expected: &ThreadId) -> Result<(), ProtocolError> {
    if &message.thread_id != expected {
        return Err(ProtocolError::ThreadMismatch {
            expected: expected.to_string(),
            actual: message.thread_id.to_string(),
        });
    }
    Ok(())
}

/// Decode one live channel text frame addressed to `thread_id`.
pub fn decode_push_frame(text: &str, thread_id: &ThreadId) -> Result<Message, ProtocolError> {
    let message: Message = serde_json::from_str(text)?;
    validate_message(&message)?;
    ensure_thread(&message, thread_id)?;
    Ok(message)
}
