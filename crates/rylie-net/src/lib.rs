// Live channel layer: WebSocket transport and per-thread connection supervision.

pub mod error;
pub mod retry;
pub mod state;
pub mod supervisor;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{ConnectError, SupervisorError, TransportError};
pub use retry::RetryPolicy;
pub use state::{ConnectionEvent, ConnectionState};
pub use supervisor::{ConnectionSupervisor, SupervisorConfig};
pub use transport::{Inbound, LiveConnector, LiveStream, WebSocketConnector};
