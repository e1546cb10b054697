pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod session;

mod bridge;

use tracing_subscriber::{fmt, EnvFilter};

pub use api::{ChatApi, HistoryFetcher, RestClient, SendOperation};
pub use config::ClientConfig;
pub use credentials::{CredentialProvider, SharedCredentials};
pub use error::{ApiError, ClientError};
pub use rylie_net::{ConnectionEvent, ConnectionState, RetryPolicy};
pub use rylie_shared::{Credential, Message, MessageId, Sender, ThreadId};
pub use rylie_store::{MergeOutcome, Origin, Snapshot};
pub use session::{ChatClient, ThreadView};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("rylie_client=debug,rylie_net=debug,rylie_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}
