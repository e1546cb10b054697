//! Pump between a thread's live channel and its synchronizer.
//!
//! One pump task runs per open thread view. It forwards decoded pushes into
//! the synchronizer and, when enabled, re-fetches the newest history page
//! each time the channel connects. The first connect counts too: anything
//! posted between the open-time history fetch and the live channel coming up
//! is only recoverable that way.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use rylie_net::ConnectionEvent;
use rylie_shared::protocol::HistoryQuery;
use rylie_shared::Message;
use rylie_store::Synchronizer;

use crate::api::ChatApi;
use crate::credentials::CredentialProvider;

/// What the pump needs to re-fetch history when the channel connects.
pub(crate) struct Resync {
    pub api: Arc<dyn ChatApi>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub page_size: u32,
}

/// Run until the supervisor drops the sender side of `pushes`.
///
/// `events` must be subscribed before the channel is opened so the first
/// `Connected` transition is seen.
pub(crate) async fn pump_loop(
    sync: Synchronizer,
    mut pushes: mpsc::Receiver<Message>,
    mut events: broadcast::Receiver<ConnectionEvent>,
    resync: Option<Resync>,
) {
    let thread_id = sync.thread_id();
    let mut watch_events = resync.is_some();

    debug!(thread = %thread_id, "Push pump started");

    loop {
        tokio::select! {
            push = pushes.recv() => {
                let Some(message) = push else { break };
                sync.ingest_push(message);
            }
            event = events.recv(), if watch_events => {
                let connected = match event {
                    Ok(event) => event.thread_id == thread_id && event.state.is_connected(),
                    // A skipped Connected cannot be ruled out.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(thread = %thread_id, skipped, "Connection events lagged");
                        true
                    }
                    Err(RecvError::Closed) => {
                        watch_events = false;
                        false
                    }
                };

                if connected {
                    if let Some(resync) = &resync {
                        resync_latest(&sync, resync).await;
                    }
                }
            }
        }
    }

    debug!(thread = %thread_id, "Push pump stopped");
}

/// Merge the newest history page. Failures only log; the next connect tries
/// again.
async fn resync_latest(sync: &Synchronizer, resync: &Resync) {
    let thread_id = sync.thread_id();

    let Some(credential) = resync.credentials.credential() else {
        warn!(thread = %thread_id, "No credential, skipping resync");
        return;
    };

    let query = HistoryQuery {
        limit: resync.page_size,
        before: None,
    };

    match resync
        .api
        .fetch_history(&thread_id, &query, &credential)
        .await
    {
        Ok(page) => {
            let inserted = sync.load_history(page.messages);
            info!(thread = %thread_id, inserted, "Resynced newest history page");
        }
        Err(e) => {
            warn!(thread = %thread_id, error = %e, "Resync failed");
        }
    }
}
