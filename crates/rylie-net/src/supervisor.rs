//! Per-thread live channel supervision.
//!
//! Each open thread gets one dedicated tokio task that owns the whole
//! lifecycle of its channel: handshake (bounded by a timeout), frame pumping,
//! loss detection and reconnect timers. The supervisor keeps the task's
//! cancellation token and join handle keyed by thread id; `close` is the only
//! way to stop a channel and does not return before the task (and with it the
//! socket and any pending timer) is gone.
//!
//! Decoded messages leave through the `mpsc` sink handed to `open`, so frames
//! of one thread can never reach another thread's consumer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rylie_shared::constants::DEFAULT_HANDSHAKE_TIMEOUT_SECS;
use rylie_shared::protocol::decode_push_frame;
use rylie_shared::{Credential, Message, ThreadId};

use crate::error::{ConnectError, SupervisorError};
use crate::retry::RetryPolicy;
use crate::state::{ConnectionEvent, ConnectionState};
use crate::transport::{Inbound, LiveConnector, LiveStream};

const EVENT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Upper bound for a single handshake.
    pub handshake_timeout: Duration,
    /// Spacing between reconnect attempts.
    pub retry: RetryPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

struct ChannelHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<ConnectionState>,
}

/// Owns every live channel of the client, at most one per thread.
pub struct ConnectionSupervisor {
    connector: Arc<dyn LiveConnector>,
    config: SupervisorConfig,
    channels: HashMap<ThreadId, ChannelHandle>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn LiveConnector>, config: SupervisorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connector,
            config,
            channels: HashMap::new(),
            events,
        }
    }

    /// Open the live channel of `thread_id`.
    ///
    /// Decoded messages are delivered to `sink`; the channel stops on its own
    /// once the receiving side of `sink` is dropped.
    ///
    /// # Errors
    ///
    /// * `EmptyThreadId` - `thread_id` is blank
    /// * `Unauthenticated` - no credential; nothing is attempted or retried
    /// * `AlreadyOpen` - a channel for this thread is still running
    pub fn open(
        &mut self,
        thread_id: ThreadId,
        credential: Option<Credential>,
        sink: mpsc::Sender<Message>,
    ) -> Result<watch::Receiver<ConnectionState>, SupervisorError> {
        if thread_id.is_empty() {
            return Err(SupervisorError::EmptyThreadId);
        }

        let credential = match credential {
            Some(c) if !c.is_empty() => c,
            _ => {
                warn!(thread = %thread_id, "No credential, live channel not opened");
                let _ = self.events.send(ConnectionEvent {
                    thread_id,
                    state: ConnectionState::Unauthenticated,
                    attempt: 0,
                });
                return Err(SupervisorError::Unauthenticated);
            }
        };

        if let Some(existing) = self.channels.get(&thread_id) {
            if !existing.task.is_finished() {
                return Err(SupervisorError::AlreadyOpen(thread_id.to_string()));
            }
            // The previous task ended by itself (rejected credential or
            // dropped sink); its slot can be reused.
            debug!(thread = %thread_id, "Replacing finished live channel task");
            self.channels.remove(&thread_id);
        }

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        let task = ChannelTask {
            thread_id: thread_id.clone(),
            credential,
            connector: self.connector.clone(),
            config: self.config.clone(),
            sink,
            state: state_tx,
            events: self.events.clone(),
            cancel: cancel.clone(),
        };

        info!(thread = %thread_id, "Opening live channel");
        let handle = tokio::spawn(task.run());

        self.channels.insert(
            thread_id,
            ChannelHandle {
                cancel,
                task: handle,
                state: state_rx.clone(),
            },
        );

        Ok(state_rx)
    }

    /// Close the channel of `thread_id` and cancel any pending retry.
    ///
    /// Returns once the channel task has exited. Returns `false` if nothing
    /// was open. Idempotent.
    pub async fn close(&mut self, thread_id: &ThreadId) -> bool {
        let Some(handle) = self.channels.remove(thread_id) else {
            return false;
        };

        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!(thread = %thread_id, error = %e, "Live channel task ended abnormally");
        }

        info!(thread = %thread_id, "Live channel closed");
        true
    }

    /// Close every open channel.
    pub async fn close_all(&mut self) {
        let threads: Vec<ThreadId> = self.channels.keys().cloned().collect();
        for thread_id in threads {
            self.close(&thread_id).await;
        }
    }

    /// Current state of a thread's channel, if one was opened.
    pub fn state(&self, thread_id: &ThreadId) -> Option<ConnectionState> {
        self.channels
            .get(thread_id)
            .map(|handle| *handle.state.borrow())
    }

    pub fn is_connected(&self, thread_id: &ThreadId) -> bool {
        self.state(thread_id)
            .map(|state| state.is_connected())
            .unwrap_or(false)
    }

    /// Whether a channel task is running for `thread_id`.
    pub fn is_open(&self, thread_id: &ThreadId) -> bool {
        self.channels
            .get(thread_id)
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }

    pub fn open_threads(&self) -> Vec<ThreadId> {
        self.channels.keys().cloned().collect()
    }

    /// Subscribe to state transitions of every channel.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        for handle in self.channels.values() {
            handle.cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Channel task
// ---------------------------------------------------------------------------

enum PumpEnd {
    /// The connection dropped; a retry follows.
    Lost(String),
    Cancelled,
    /// Nobody consumes pushes any more.
    SinkClosed,
}

struct ChannelTask {
    thread_id: ThreadId,
    credential: Credential,
    connector: Arc<dyn LiveConnector>,
    config: SupervisorConfig,
    sink: mpsc::Sender<Message>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
}

impl ChannelTask {
    async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting, attempt);

            let handshake = tokio::time::timeout(
                self.config.handshake_timeout,
                self.connector.connect(&self.thread_id, &self.credential),
            );

            // Dropping the handshake future on cancel abandons the attempt.
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.sink.closed() => break,
                result = handshake => result,
            };

            match result {
                Ok(Ok(stream)) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected, attempt);

                    match self.pump(stream).await {
                        PumpEnd::Cancelled => break,
                        PumpEnd::SinkClosed => {
                            debug!(thread = %self.thread_id, "Push consumer gone, stopping live channel");
                            break;
                        }
                        PumpEnd::Lost(reason) => {
                            warn!(thread = %self.thread_id, reason = %reason, "Live channel lost");
                        }
                    }
                }
                Ok(Err(ConnectError::Unauthorized)) => {
                    warn!(
                        thread = %self.thread_id,
                        "Live channel rejected the credential, not retrying"
                    );
                    self.set_state(ConnectionState::Unauthenticated, attempt);
                    return;
                }
                Ok(Err(e)) => {
                    warn!(thread = %self.thread_id, attempt, error = %e, "Live channel connect failed");
                }
                Err(_) => {
                    warn!(
                        thread = %self.thread_id,
                        attempt,
                        timeout_ms = self.config.handshake_timeout.as_millis() as u64,
                        "Live channel handshake timed out"
                    );
                }
            }

            attempt = attempt.saturating_add(1);
            let delay = self.config.retry.delay_for(attempt);
            self.set_state(ConnectionState::Disconnected, attempt);

            info!(
                thread = %self.thread_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling live channel reconnect"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.sink.closed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected, attempt);
        debug!(thread = %self.thread_id, "Live channel task terminated");
    }

    /// Forward frames until the channel drops, the task is cancelled or the
    /// consumer goes away. The stream is dropped (socket closed) on return.
    async fn pump(&self, mut stream: LiveStream) -> PumpEnd {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpEnd::Cancelled,
                _ = self.sink.closed() => return PumpEnd::SinkClosed,
                frame = stream.next() => frame,
            };

            let text = match frame {
                Some(Ok(Inbound::Frame(text))) => text,
                Some(Ok(Inbound::Invalid(reason))) => {
                    warn!(thread = %self.thread_id, reason = %reason, "Dropped unreadable live frame");
                    continue;
                }
                Some(Err(e)) => return PumpEnd::Lost(e.to_string()),
                None => return PumpEnd::Lost("closed by server".to_string()),
            };

            let message = match decode_push_frame(&text, &self.thread_id) {
                Ok(message) => message,
                Err(e) => {
                    warn!(
                        thread = %self.thread_id,
                        error = %e,
                        len = text.len(),
                        "Dropped invalid live frame"
                    );
                    continue;
                }
            };

            debug!(thread = %self.thread_id, msg_id = %message.id, "Live push received");

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpEnd::Cancelled,
                sent = self.sink.send(message) => {
                    if sent.is_err() {
                        return PumpEnd::SinkClosed;
                    }
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState, attempt: u32) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            debug!(thread = %self.thread_id, state = %state, attempt, "Live channel state");
            let _ = self.events.send(ConnectionEvent {
                thread_id: self.thread_id.clone(),
                state,
                attempt,
            });
        }
    }
}
