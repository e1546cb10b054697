// Domain types and wire protocol shared by every Rylie chat crate.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use types::{Credential, Message, MessageId, Sender, ThreadId};
