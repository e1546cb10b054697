//! Thread views: the surface presentation code talks to.
//!
//! A [`ChatClient`] owns the REST adapters, the credential provider and the
//! one connection supervisor shared by every thread. Opening a thread fetches
//! its newest history page, seeds a synchronizer, opens the live channel and
//! starts the push pump. The returned [`ThreadView`] exposes the two UI
//! outputs (snapshot and connectivity) plus send and pagination.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rylie_net::{
    ConnectionEvent, ConnectionState, ConnectionSupervisor, LiveConnector, WebSocketConnector,
};
use rylie_shared::constants::PUSH_QUEUE_CAPACITY;
use rylie_shared::protocol::{HistoryQuery, SendRequest};
use rylie_shared::{Credential, Message, ThreadId};
use rylie_store::{Snapshot, Synchronizer};

use crate::api::{ChatApi, RestClient};
use crate::bridge::{pump_loop, Resync};
use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ClientError, Result};

pub struct ChatClient {
    config: ClientConfig,
    api: Arc<dyn ChatApi>,
    credentials: Arc<dyn CredentialProvider>,
    supervisor: Arc<Mutex<ConnectionSupervisor>>,
}

impl ChatClient {
    /// Client talking to the configured backend over HTTP and WebSocket.
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        let api = RestClient::new(config.api_url.clone(), config.request_timeout)
            .map_err(|e| ClientError::Setup(e.to_string()))?;
        let connector = WebSocketConnector::new(config.ws_url.clone());

        info!(api = %config.api_url, ws = %config.ws_url, "Chat client configured");
        Ok(Self::with_parts(
            config,
            Arc::new(api),
            Arc::new(connector),
            credentials,
        ))
    }

    /// Client over arbitrary REST and live channel implementations.
    pub fn with_parts(
        config: ClientConfig,
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn LiveConnector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let supervisor = ConnectionSupervisor::new(connector, config.supervisor_config());
        Self {
            config,
            api,
            credentials,
            supervisor: Arc::new(Mutex::new(supervisor)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open an existing thread.
    ///
    /// Fails if the history fetch fails; no channel is opened in that case.
    pub async fn open_thread(&self, thread_id: ThreadId) -> Result<ThreadView> {
        if thread_id.is_empty() {
            return Err(ClientError::EmptyThreadId);
        }
        let credential = self.credential()?;

        let query = HistoryQuery {
            limit: self.config.history_page_size,
            before: None,
        };
        let page = self
            .api
            .fetch_history(&thread_id, &query, &credential)
            .await
            .map_err(ClientError::History)?;

        let sync = Synchronizer::new(thread_id);
        sync.load_history(page.messages);

        self.attach(sync, page.has_more, credential).await
    }

    /// Send the first message of a new thread and open that thread.
    pub async fn start_thread(
        &self,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<(ThreadView, Message)> {
        let credential = self.credential()?;

        let request = SendRequest {
            thread_id: None,
            content: content.into(),
            metadata,
        };
        let message = self
            .api
            .send_message(&request, &credential)
            .await
            .map_err(ClientError::Send)?;

        info!(thread = %message.thread_id, "Started new thread");

        let sync = Synchronizer::new(message.thread_id.clone());
        sync.record_sent(message.clone());

        let view = self.attach(sync, false, credential).await?;
        Ok((view, message))
    }

    /// State transitions of every thread's live channel.
    pub async fn subscribe_connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.supervisor.lock().await.subscribe_events()
    }

    /// Close every live channel. Open views keep their snapshots.
    pub async fn shutdown(&self) {
        self.supervisor.lock().await.close_all().await;
        info!("Chat client shut down");
    }

    fn credential(&self) -> Result<Credential> {
        self.credentials
            .credential()
            .ok_or(ClientError::Unauthenticated)
    }

    async fn attach(
        &self,
        sync: Synchronizer,
        has_more: bool,
        credential: Credential,
    ) -> Result<ThreadView> {
        let thread_id = sync.thread_id();
        let (push_tx, push_rx) = mpsc::channel(PUSH_QUEUE_CAPACITY);

        let (events, state) = {
            let mut supervisor = self.supervisor.lock().await;
            let events = supervisor.subscribe_events();
            let state = supervisor.open(thread_id.clone(), Some(credential), push_tx)?;
            (events, state)
        };

        let resync = self.config.resync_on_connect.then(|| Resync {
            api: self.api.clone(),
            credentials: self.credentials.clone(),
            page_size: self.config.history_page_size,
        });
        let pump = tokio::spawn(pump_loop(sync.clone(), push_rx, events, resync));

        info!(thread = %thread_id, messages = sync.len(), "Thread view opened");

        Ok(ThreadView {
            thread_id,
            sync,
            state,
            has_more,
            page_size: self.config.history_page_size,
            api: self.api.clone(),
            credentials: self.credentials.clone(),
            supervisor: self.supervisor.clone(),
            pump: Some(pump),
        })
    }
}

/// One open thread.
pub struct ThreadView {
    thread_id: ThreadId,
    sync: Synchronizer,
    state: watch::Receiver<ConnectionState>,
    has_more: bool,
    page_size: u32,
    api: Arc<dyn ChatApi>,
    credentials: Arc<dyn CredentialProvider>,
    supervisor: Arc<Mutex<ConnectionSupervisor>>,
    pump: Option<JoinHandle<()>>,
}

impl ThreadView {
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.sync.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.sync.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Whether the server reported older messages than the cached ones.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Fetch the page before the oldest cached message and merge it.
    /// Returns the number of messages that were new.
    pub async fn load_more(&mut self) -> Result<usize> {
        if !self.has_more {
            return Ok(0);
        }
        let credential = self
            .credentials
            .credential()
            .ok_or(ClientError::Unauthenticated)?;

        let query = HistoryQuery {
            limit: self.page_size,
            before: self.sync.oldest_id(),
        };
        let page = self
            .api
            .fetch_history(&self.thread_id, &query, &credential)
            .await
            .map_err(ClientError::History)?;

        self.has_more = page.has_more;
        Ok(self.sync.load_history(page.messages))
    }

    /// Store a message in this thread. On success the canonical message is
    /// merged and returned; on failure nothing enters the log.
    pub async fn send(
        &self,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message> {
        let credential = self
            .credentials
            .credential()
            .ok_or(ClientError::Unauthenticated)?;

        let request = SendRequest {
            thread_id: Some(self.thread_id.clone()),
            content: content.into(),
            metadata,
        };

        let message = match self.api.send_message(&request, &credential).await {
            Ok(message) => message,
            Err(e) => {
                warn!(thread = %self.thread_id, error = %e, "Send failed");
                return Err(ClientError::Send(e));
            }
        };

        let outcome = self.sync.record_sent(message.clone());
        debug!(thread = %self.thread_id, msg_id = %message.id, ?outcome, "Send recorded");
        Ok(message)
    }

    /// Close the live channel and stop the pump. The last snapshot stays
    /// readable through earlier subscriptions.
    pub async fn close(mut self) {
        self.supervisor.lock().await.close(&self.thread_id).await;

        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                warn!(thread = %self.thread_id, error = %e, "Push pump ended abnormally");
            }
        }
        info!(thread = %self.thread_id, "Thread view closed");
    }
}

impl Drop for ThreadView {
    // The channel task notices the dropped pump and stops on its own.
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for ThreadView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadView")
            .field("thread_id", &self.thread_id)
            .field("state", &*self.state.borrow())
            .field("has_more", &self.has_more)
            .field("messages", &self.sync.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rylie_net::testing::ScriptedConnector;
    use rylie_net::{RetryPolicy, SupervisorError};
    use rylie_shared::protocol::HistoryPage;
    use rylie_shared::{MessageId, Sender};
    use rylie_store::Origin;

    use crate::api::{HistoryFetcher, SendOperation};
    use crate::credentials::SharedCredentials;
    use crate::error::ApiError;

    fn msg(thread: &str, id: &str, created_at_ms: i64, sender: Sender) -> Message {
        Message {
            id: MessageId::from(id),
            thread_id: ThreadId::from(thread),
            sender,
            content: format!("content of {id}"),
            created_at: Utc.timestamp_millis_opt(created_at_ms).unwrap(),
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[derive(Default)]
    struct FakeApi {
        pages: StdMutex<VecDeque<std::result::Result<HistoryPage, ApiError>>>,
        queries: StdMutex<Vec<HistoryQuery>>,
        replies: StdMutex<VecDeque<std::result::Result<Message, ApiError>>>,
        sent: StdMutex<Vec<SendRequest>>,
    }

    impl FakeApi {
        fn page(&self, messages: Vec<Message>, has_more: bool) {
            self.pages
                .lock()
                .unwrap()
                .push_back(Ok(HistoryPage { messages, has_more }));
        }

        fn reply(&self, reply: std::result::Result<Message, ApiError>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn queries(&self) -> Vec<HistoryQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistoryFetcher for FakeApi {
        async fn fetch_history(
            &self,
            _thread_id: &ThreadId,
            query: &HistoryQuery,
            _credential: &Credential,
        ) -> std::result::Result<HistoryPage, ApiError> {
            self.queries.lock().unwrap().push(query.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(HistoryPage {
                    messages: Vec::new(),
                    has_more: false,
                }))
        }
    }

    #[async_trait]
    impl SendOperation for FakeApi {
        async fn send_message(
            &self,
            request: &SendRequest,
            _credential: &Credential,
        ) -> std::result::Result<Message, ApiError> {
            self.sent.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().pop_front().unwrap_or(Err(ApiError::Status {
                status: 500,
                body: "no scripted reply".into(),
            }))
        }
    }

    fn client_with(
        api: &Arc<FakeApi>,
        connector: &Arc<ScriptedConnector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> ChatClient {
        let config = ClientConfig {
            retry: RetryPolicy::fixed(Duration::from_secs(1)),
            ..ClientConfig::default()
        };
        ChatClient::with_parts(config, api.clone(), connector.clone(), credentials)
    }

    fn signed_in() -> Arc<dyn CredentialProvider> {
        Arc::new(SharedCredentials::new(Credential::new("token")))
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_seeds_history_then_merges_pushes() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        api.page(
            vec![
                msg("t1", "a", 1_000, Sender::User),
                msg("t1", "b", 2_000, Sender::Assistant),
            ],
            true,
        );
        let feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();

        assert_eq!(ids(&view.snapshot()), vec!["a", "b"]);
        assert!(view.has_more());
        assert_eq!(api.queries()[0].limit, 50);
        assert_eq!(api.queries()[0].before, None);

        eventually(|| view.is_connected()).await;

        feed.push_message(&msg("t1", "c", 3_000, Sender::Assistant));
        feed.push_message(&msg("t1", "b", 2_000, Sender::Assistant));
        eventually(|| view.snapshot().len() == 3).await;

        assert_eq!(ids(&view.snapshot()), vec!["a", "b", "c"]);
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_echo_is_merged_once() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        api.page(vec![msg("t1", "a", 1_000, Sender::User)], false);
        let feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| view.is_connected()).await;

        let stored = msg("t1", "m2", 5_000, Sender::User);
        api.reply(Ok(stored.clone()));

        let returned = view.send("hello", None).await.unwrap();
        assert_eq!(returned, stored);

        feed.push_message(&stored);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = view.snapshot();
        assert_eq!(ids(&snapshot), vec!["a", "m2"]);

        let sent = api.sent.lock().unwrap().clone();
        assert_eq!(sent[0].thread_id, Some(thread.clone()));
        assert_eq!(sent[0].content, "hello");
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_leaves_log_and_connection_alone() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        api.page(vec![msg("t1", "a", 1_000, Sender::User)], false);
        let _feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| view.is_connected()).await;

        api.reply(Err(ApiError::Status {
            status: 503,
            body: "busy".into(),
        }));
        let err = view.send("hello", None).await.unwrap_err();

        assert!(matches!(err, ClientError::Send(ApiError::Status { status: 503, .. })));
        assert_eq!(ids(&view.snapshot()), vec!["a"]);
        assert!(view.is_connected());
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_opens_nothing() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let client = client_with(&api, &connector, Arc::new(SharedCredentials::signed_out()));

        let err = client.open_thread(ThreadId::from("t1")).await.unwrap_err();

        assert!(err.is_unauthenticated());
        assert!(api.queries().is_empty());
        assert_eq!(connector.attempts(&ThreadId::from("t1")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_thread_id_is_rejected() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let client = client_with(&api, &connector, signed_in());

        let err = client.open_thread(ThreadId::from("  ")).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyThreadId));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_failure_opens_no_channel() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        api.pages
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Unauthorized));

        let client = client_with(&api, &connector, signed_in());
        let err = client.open_thread(ThreadId::from("t1")).await.unwrap_err();

        assert!(matches!(err, ClientError::History(ApiError::Unauthorized)));
        assert!(err.is_unauthenticated());
        assert_eq!(connector.attempts(&ThreadId::from("t1")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_thread_adopts_server_thread() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let created = ThreadId::from("new-thread");

        let first = msg("new-thread", "m1", 1_000, Sender::User);
        api.reply(Ok(first.clone()));
        let feed = connector.accept(&created);

        let client = client_with(&api, &connector, signed_in());
        let (view, message) = client
            .start_thread("Audit my site", Some(serde_json::json!({ "source": "cli" })))
            .await
            .unwrap();

        assert_eq!(message, first);
        assert_eq!(view.thread_id(), &created);
        assert_eq!(ids(&view.snapshot()), vec!["m1"]);
        assert!(!view.has_more());
        assert_eq!(api.sent.lock().unwrap()[0].thread_id, None);

        eventually(|| view.is_connected()).await;
        feed.push_message(&msg("new-thread", "m2", 2_000, Sender::Assistant));
        eventually(|| view.snapshot().len() == 2).await;

        assert_eq!(view.sync.origin_of(&MessageId::from("m1")), Some(Origin::SendResponse));
        assert_eq!(view.sync.origin_of(&MessageId::from("m2")), Some(Origin::LivePush));
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_prepends_older_page() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        api.page(
            vec![
                msg("t1", "c", 3_000, Sender::User),
                msg("t1", "d", 4_000, Sender::Assistant),
            ],
            true,
        );
        // Newest page again, fetched when the channel connects.
        api.page(
            vec![
                msg("t1", "c", 3_000, Sender::User),
                msg("t1", "d", 4_000, Sender::Assistant),
            ],
            true,
        );
        let _feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let mut view = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| view.is_connected() && api.queries().len() == 2).await;

        api.page(
            vec![
                msg("t1", "a", 1_000, Sender::User),
                msg("t1", "b", 2_000, Sender::Assistant),
                msg("t1", "c", 3_000, Sender::User),
            ],
            false,
        );
        assert_eq!(view.load_more().await.unwrap(), 2);
        assert_eq!(ids(&view.snapshot()), vec!["a", "b", "c", "d"]);
        assert!(!view.has_more());
        assert_eq!(api.queries()[2].before, Some(MessageId::from("c")));

        // Nothing older left: no request is made.
        assert_eq!(view.load_more().await.unwrap(), 0);
        assert_eq!(api.queries().len(), 3);
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resyncs_missed_messages() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        api.page(vec![msg("t1", "a", 1_000, Sender::User)], false);
        let first = connector.accept(&thread);
        let _second = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| view.is_connected() && api.queries().len() == 2).await;

        // Produced while the channel is down.
        api.page(
            vec![
                msg("t1", "a", 1_000, Sender::User),
                msg("t1", "b", 2_000, Sender::Assistant),
            ],
            false,
        );
        first.fail("connection reset");

        eventually(|| view.snapshot().len() == 2).await;
        assert!(view.is_connected());
        assert_eq!(ids(&view.snapshot()), vec!["a", "b"]);
        assert_eq!(api.queries().len(), 3);
        assert_eq!(view.sync.origin_of(&MessageId::from("b")), Some(Origin::History));
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_connect_recovers_messages_posted_during_open() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        api.page(vec![msg("t1", "a", 1_000, Sender::User)], false);
        // "b" lands on the server after the open fetch and before the
        // channel is up, so no push ever carries it.
        api.page(
            vec![
                msg("t1", "a", 1_000, Sender::User),
                msg("t1", "b", 2_000, Sender::Assistant),
            ],
            false,
        );
        let _feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        assert_eq!(ids(&view.snapshot()), vec!["a"]);

        eventually(|| view.snapshot().len() == 2).await;

        assert!(view.is_connected());
        assert_eq!(ids(&view.snapshot()), vec!["a", "b"]);
        assert_eq!(api.queries().len(), 2);
        assert_eq!(api.queries()[1].before, None);
        assert_eq!(connector.attempts(&thread), 1);
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_can_be_disabled() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");

        let first = connector.accept(&thread);
        let _second = connector.accept(&thread);

        let config = ClientConfig {
            retry: RetryPolicy::fixed(Duration::from_secs(1)),
            resync_on_connect: false,
            ..ClientConfig::default()
        };
        let client =
            ChatClient::with_parts(config, api.clone(), connector.clone(), signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| view.is_connected()).await;

        first.fail("connection reset");
        eventually(|| connector.attempts(&thread) == 2 && view.is_connected()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(api.queries().len(), 1);
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_view_of_open_thread_is_refused() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");
        let _feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();

        let err = client.open_thread(thread.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Supervisor(SupervisorError::AlreadyOpen(_))
        ));

        view.close().await;
        let _feed = connector.accept(&thread);
        let reopened = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| reopened.is_connected()).await;
        assert_eq!(connector.max_open_connections(), 1);
        reopened.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_releases_connection() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");
        let _feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        let mut states = view.watch_connection();
        eventually(|| view.is_connected()).await;
        assert_eq!(connector.open_connections(), 1);

        view.close().await;

        assert_eq!(connector.open_connections(), 0);
        assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_view_releases_connection() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let thread = ThreadId::from("t1");
        let _feed = connector.accept(&thread);

        let client = client_with(&api, &connector, signed_in());
        let view = client.open_thread(thread.clone()).await.unwrap();
        eventually(|| view.is_connected()).await;

        drop(view);
        eventually(|| connector.open_connections() == 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_threads_do_not_leak_into_each_other() {
        let api = Arc::new(FakeApi::default());
        let connector = ScriptedConnector::new();
        let t1 = ThreadId::from("t1");
        let t2 = ThreadId::from("t2");
        let feed1 = connector.accept(&t1);
        let feed2 = connector.accept(&t2);

        let client = client_with(&api, &connector, signed_in());
        let view1 = client.open_thread(t1.clone()).await.unwrap();
        let view2 = client.open_thread(t2.clone()).await.unwrap();
        eventually(|| view1.is_connected() && view2.is_connected()).await;

        feed1.push_message(&msg("t1", "x", 1_000, Sender::Assistant));
        // Addressed to t1 but arriving on t2's channel.
        feed2.push_message(&msg("t1", "y", 2_000, Sender::Assistant));
        feed2.push_message(&msg("t2", "z", 3_000, Sender::Assistant));

        eventually(|| view1.snapshot().len() == 1 && view2.snapshot().len() == 1).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(ids(&view1.snapshot()), vec!["x"]);
        assert_eq!(ids(&view2.snapshot()), vec!["z"]);

        client.shutdown().await;
        assert_eq!(connector.open_connections(), 0);
    }
}
