//! REST adapters: history fetch and message send.
//!
//! Both calls are plain request/response. Responses are validated with the
//! same rules as live frames before anything reaches a synchronizer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use rylie_shared::constants::{HISTORY_PATH, SEND_PATH};
use rylie_shared::protocol::{HistoryPage, HistoryQuery, SendRequest, SendResponse};
use rylie_shared::{Credential, Message, ProtocolError, ThreadId};

use crate::error::ApiError;

#[async_trait]
pub trait HistoryFetcher: Send + Sync + 'static {
    /// One page of `thread_id`'s history, oldest to newest.
    async fn fetch_history(
        &self,
        thread_id: &ThreadId,
        query: &HistoryQuery,
        credential: &Credential,
    ) -> Result<HistoryPage, ApiError>;
}

#[async_trait]
pub trait SendOperation: Send + Sync + 'static {
    /// Store a user message and return its canonical form.
    async fn send_message(
        &self,
        request: &SendRequest,
        credential: &Credential,
    ) -> Result<Message, ApiError>;
}

/// Both REST operations behind one object.
pub trait ChatApi: HistoryFetcher + SendOperation {}

impl<T: HistoryFetcher + SendOperation> ChatApi for T {}

/// `reqwest` implementation of the chat REST endpoints.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn history_url(&self, thread_id: &ThreadId) -> String {
        let path = HISTORY_PATH.replace("{thread}", &urlencoding::encode(thread_id.as_str()));
        format!("{}{}", self.base_url, path)
    }

    fn send_url(&self) -> String {
        format!("{}{}", self.base_url, SEND_PATH)
    }
}

#[async_trait]
impl HistoryFetcher for RestClient {
    async fn fetch_history(
        &self,
        thread_id: &ThreadId,
        query: &HistoryQuery,
        credential: &Credential,
    ) -> Result<HistoryPage, ApiError> {
        let response = self
            .http
            .get(self.history_url(thread_id))
            .bearer_auth(credential.expose())
            .query(query)
            .send()
            .await?;

        let page: HistoryPage = decode(response).await?;
        page.validate(thread_id)?;

        debug!(
            thread = %thread_id,
            count = page.messages.len(),
            has_more = page.has_more,
            "Fetched history page"
        );
        Ok(page)
    }
}

#[async_trait]
impl SendOperation for RestClient {
    async fn send_message(
        &self,
        request: &SendRequest,
        credential: &Credential,
    ) -> Result<Message, ApiError> {
        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(credential.expose())
            .json(request)
            .send()
            .await?;

        let body: SendResponse = decode(response).await?;
        body.validate(request.thread_id.as_ref())?;

        debug!(
            thread = %body.message.thread_id,
            msg_id = %body.message.id,
            "Message stored"
        );
        Ok(body.message)
    }
}

/// Map the status code, then parse the body as `T`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        warn!(url = %response.url(), "Backend rejected the credential");
        return Err(ApiError::Unauthorized);
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Protocol(ProtocolError::Json(e)))
}
