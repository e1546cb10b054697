//! Scripted [`LiveConnector`] for tests.
//!
//! Each thread gets a queue of handshake outcomes. Accepted connections are
//! fed through a [`LiveFeed`], and the connector counts handshakes and
//! currently open streams so tests can check the one-connection-per-thread
//! guarantee. Once a thread's script is exhausted every handshake fails.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};

use rylie_shared::{Credential, Message, ThreadId};

use crate::error::{ConnectError, TransportError};
use crate::transport::{Inbound, LiveConnector, LiveStream};

enum Step {
    Fail,
    Reject,
    Stall,
    Accept(UnboundedReceiver<Result<Inbound, TransportError>>),
}

/// Server side of an accepted scripted connection.
pub struct LiveFeed {
    tx: UnboundedSender<Result<Inbound, TransportError>>,
}

impl LiveFeed {
    pub fn push_text(&self, text: &str) {
        let _ = self.tx.unbounded_send(Ok(Inbound::Frame(text.to_string())));
    }

    /// Deliver a frame the transport could not read (e.g. non UTF-8 binary).
    pub fn push_invalid(&self, reason: &str) {
        let _ = self.tx.unbounded_send(Ok(Inbound::Invalid(reason.to_string())));
    }

    pub fn push_message(&self, message: &Message) {
        if let Ok(text) = serde_json::to_string(message) {
            self.push_text(&text);
        }
    }

    /// Break the connection with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.tx.unbounded_send(Err(TransportError(reason.to_string())));
    }

    /// Close the connection cleanly.
    pub fn close(self) {}
}

#[derive(Default)]
struct Counters {
    open: AtomicUsize,
    max_open: AtomicUsize,
}

#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<ThreadId, VecDeque<Step>>>,
    attempts: Mutex<HashMap<ThreadId, usize>>,
    counters: Arc<Counters>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an accepted handshake and return its feed.
    pub fn accept(&self, thread_id: &ThreadId) -> LiveFeed {
        let (tx, rx) = unbounded();
        self.push(thread_id, Step::Accept(rx));
        LiveFeed { tx }
    }

    /// Queue `times` transient handshake failures.
    pub fn fail(&self, thread_id: &ThreadId, times: usize) {
        for _ in 0..times {
            self.push(thread_id, Step::Fail);
        }
    }

    /// Queue a handshake rejected as unauthorized.
    pub fn reject(&self, thread_id: &ThreadId) {
        self.push(thread_id, Step::Reject);
    }

    /// Queue a handshake that never completes.
    pub fn stall(&self, thread_id: &ThreadId) {
        self.push(thread_id, Step::Stall);
    }

    /// Handshakes started for `thread_id`.
    pub fn attempts(&self, thread_id: &ThreadId) -> usize {
        lock(&self.attempts).get(thread_id).copied().unwrap_or(0)
    }

    /// Streams currently alive, across all threads.
    pub fn open_connections(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously alive streams seen so far.
    pub fn max_open_connections(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    fn push(&self, thread_id: &ThreadId, step: Step) {
        lock(&self.scripts)
            .entry(thread_id.clone())
            .or_default()
            .push_back(step);
    }
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(
        &self,
        thread_id: &ThreadId,
        _credential: &Credential,
    ) -> Result<LiveStream, ConnectError> {
        *lock(&self.attempts).entry(thread_id.clone()).or_default() += 1;

        let step = lock(&self.scripts)
            .get_mut(thread_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Step::Fail);

        match step {
            Step::Fail => Err(ConnectError::Transport("scripted failure".into())),
            Step::Reject => Err(ConnectError::Unauthorized),
            Step::Stall => std::future::pending().await,
            Step::Accept(rx) => {
                let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
                self.counters.max_open.fetch_max(open, Ordering::SeqCst);
                Ok(ScriptedStream {
                    rx,
                    counters: self.counters.clone(),
                }
                .boxed())
            }
        }
    }
}

struct ScriptedStream {
    rx: UnboundedReceiver<Result<Inbound, TransportError>>,
    counters: Arc<Counters>,
}

impl Stream for ScriptedStream {
    type Item = Result<Inbound, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
