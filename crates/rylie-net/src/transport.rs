//! Live channel transport.
//!
//! [`LiveConnector`] is the seam between the supervisor and the wire: it
//! performs one handshake and yields the channel's inbound text frames. The
//! production implementation speaks WebSocket through `tokio-tungstenite`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::debug;

use rylie_shared::constants::{LIVE_PATH, LIVE_TOKEN_PARAM};
use rylie_shared::{Credential, ThreadId};

use crate::error::{ConnectError, TransportError};

/// One inbound data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text payload, still to be decoded.
    Frame(String),
    /// A frame that cannot carry a message at all. The channel stays up.
    Invalid(String),
}

/// Inbound frames of an open channel. Dropping it closes the channel; the
/// stream ending means the server closed it. `Err` items mean the socket
/// itself failed.
pub type LiveStream = BoxStream<'static, Result<Inbound, TransportError>>;

#[async_trait]
pub trait LiveConnector: Send + Sync + 'static {
    /// Perform the handshake for `thread_id`.
    async fn connect(
        &self,
        thread_id: &ThreadId,
        credential: &Credential,
    ) -> Result<LiveStream, ConnectError>;
}

/// WebSocket live channel at `{base}/ws/chat/{thread}?token=…`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base_url: String,
}

impl WebSocketConnector {
    /// `base_url` is the `ws://` or `wss://` origin of the chat backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Full channel URL. The credential travels as a query parameter.
    pub fn live_url(&self, thread_id: &ThreadId, credential: &Credential) -> String {
        let path = LIVE_PATH.replace("{thread}", &urlencoding::encode(thread_id.as_str()));
        format!(
            "{}{}?{}={}",
            self.base_url.trim_end_matches('/'),
            path,
            LIVE_TOKEN_PARAM,
            urlencoding::encode(credential.expose()),
        )
    }
}

#[async_trait]
impl LiveConnector for WebSocketConnector {
    async fn connect(
        &self,
        thread_id: &ThreadId,
        credential: &Credential,
    ) -> Result<LiveStream, ConnectError> {
        let url = self.live_url(thread_id, credential);
        let (socket, response) = connect_async(url.as_str()).await.map_err(classify)?;

        debug!(
            thread = %thread_id,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        let frames = socket.filter_map(|frame| {
            futures::future::ready(match frame {
                Ok(WsMessage::Text(text)) => Some(Ok(Inbound::Frame(text.as_str().to_owned()))),
                Ok(WsMessage::Binary(data)) => Some(Ok(match String::from_utf8(data.to_vec()) {
                    Ok(text) => Inbound::Frame(text),
                    Err(e) => Inbound::Invalid(format!("non UTF-8 binary frame: {e}")),
                })),
                // Control frames are answered by tungstenite itself.
                Ok(_) => None,
                Err(e) => Some(Err(TransportError(e.to_string()))),
            })
        });

        Ok(frames.boxed())
    }
}

fn classify(err: tungstenite::Error) -> ConnectError {
    match err {
        tungstenite::Error::Http(ref response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            ConnectError::Unauthorized
        }
        other => ConnectError::Transport(other.to_string()),
    }
}
